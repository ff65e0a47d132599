//! Lowering of named entries to device entries.
//!
//! This is the single resolution pass: names become typed ids and values
//! become canonical bytes sized to the schema's bit widths. Anything the
//! schema contradicts is rejected here, before any I/O.

use super::entry::TableEntry;
use super::error::CompileError;
use crate::schema::{MatchKind, SchemaResolver};
use p4ctl_southbound::{ActionCall, DeviceEntry, FieldMatch, ParamValue};

pub fn lower(resolver: &SchemaResolver, entry: &TableEntry) -> Result<DeviceEntry, CompileError> {
    let table_id = resolver.table_id(&entry.table)?;
    let action_id = resolver.action_id(&entry.action)?;

    if let Some(table) = resolver.table(table_id) {
        if !table.actions.is_empty() && !table.actions.contains(&action_id) {
            return Err(CompileError::ActionNotInTable {
                table: entry.table.clone(),
                action: entry.action.clone(),
            });
        }
    }

    let mut matches = Vec::with_capacity(entry.matches.len());
    for m in &entry.matches {
        let field = resolver.field(table_id, &m.name)?;
        let invalid = |reason: String| CompileError::InvalidMatch {
            table: entry.table.clone(),
            field: m.name.clone(),
            reason,
        };

        let value = m.value.encode(field.bitwidth).map_err(|source| CompileError::InvalidValue {
            object: format!("{}.{}", entry.table, m.name),
            source,
        })?;

        let lowered = match (field.kind, m.prefix_len) {
            (MatchKind::Exact, None) => FieldMatch::exact(field.id, value),
            (MatchKind::Lpm, Some(len)) if u32::from(len) <= field.bitwidth => {
                FieldMatch::lpm(field.id, value, u32::from(len))
            }
            (MatchKind::Lpm, Some(len)) => {
                return Err(invalid(format!(
                    "prefix length {} exceeds bit width {}",
                    len, field.bitwidth
                )))
            }
            (MatchKind::Lpm, None) => FieldMatch::lpm(field.id, value, field.bitwidth),
            (MatchKind::Exact, Some(_)) => {
                return Err(invalid("exact field cannot take a prefix length".to_string()))
            }
            (kind, _) => return Err(invalid(format!("{} match is not supported", kind))),
        };
        matches.push(lowered);
    }

    let mut params = Vec::with_capacity(entry.params.len());
    for p in &entry.params {
        let schema = resolver.param(action_id, &p.name)?;
        let value = p.value.encode(schema.bitwidth).map_err(|source| CompileError::InvalidValue {
            object: format!("{}.{}", entry.action, p.name),
            source,
        })?;
        params.push(ParamValue {
            param_id: schema.id,
            value,
        });
    }

    if let Some(action) = resolver.action(action_id) {
        if let Some(missing) = action
            .params
            .iter()
            .find(|schema| !params.iter().any(|p| p.param_id == schema.id))
        {
            return Err(CompileError::MissingParam {
                action: entry.action.clone(),
                param: missing.name.clone(),
            });
        }
    }

    Ok(DeviceEntry {
        table_id,
        matches,
        action: ActionCall { action_id, params },
        priority: entry.priority,
        is_default_action: entry.is_default_action(),
    })
}
