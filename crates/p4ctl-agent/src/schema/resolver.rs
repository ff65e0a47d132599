//! Name to id resolution over a loaded P4Info document.

use super::p4info::{MatchKind, P4Info};
use super::{SchemaError, SchemaObjectKind};
use log::debug;
use p4ctl_southbound::{ActionId, CounterId, FieldId, ParamId, RawP4Id, TableId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub id: FieldId,
    pub name: String,
    pub bitwidth: u32,
    pub kind: MatchKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub id: TableId,
    pub name: String,
    pub fields: Vec<FieldSchema>,
    /// Actions the table accepts. Empty when the document lists none.
    pub actions: Vec<ActionId>,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSchema {
    pub id: ParamId,
    pub name: String,
    pub bitwidth: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSchema {
    pub id: ActionId,
    pub name: String,
    pub params: Vec<ParamSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSchema {
    pub id: CounterId,
    pub name: String,
    pub size: u64,
}

/// Read-only lookup tables built once from P4Info.
///
/// Objects resolve by fully-qualified name (`MyIngress.ipv4_lpm`) or by
/// alias (`ipv4_lpm`). Match fields and action parameters are scoped to
/// their table or action; a field also resolves by its last path segment
/// (`dstAddr` for `hdr.ipv4.dstAddr`) when that is unambiguous.
#[derive(Debug, Clone, Default)]
pub struct SchemaResolver {
    tables: BTreeMap<TableId, TableSchema>,
    table_names: HashMap<String, TableId>,
    actions: BTreeMap<ActionId, ActionSchema>,
    action_names: HashMap<String, ActionId>,
    counters: BTreeMap<CounterId, CounterSchema>,
    counter_names: HashMap<String, CounterId>,
}

fn object_id<T: p4ctl_southbound::P4ObjectKind>(
    kind: SchemaObjectKind,
    raw: RawP4Id,
    name: &str,
) -> Result<p4ctl_southbound::P4Id<T>, SchemaError> {
    p4ctl_southbound::P4Id::from_raw(raw).ok_or_else(|| SchemaError::InvalidId {
        kind,
        name: name.to_string(),
    })
}

/// Name and alias index for one kind of schema object.
///
/// Full names must be unique. An alias never shadows a full name, whichever
/// object comes first.
#[derive(Debug, Clone)]
struct NameIndex<I> {
    kind: SchemaObjectKind,
    full: HashSet<String>,
    names: HashMap<String, I>,
}

impl<I: Copy> NameIndex<I> {
    fn new(kind: SchemaObjectKind) -> Self {
        Self {
            kind,
            full: HashSet::new(),
            names: HashMap::new(),
        }
    }

    fn register(&mut self, id: I, name: &str, alias: &str) -> Result<(), SchemaError> {
        if !self.full.insert(name.to_string()) {
            return Err(SchemaError::DuplicateName {
                kind: self.kind,
                name: name.to_string(),
            });
        }
        self.names.insert(name.to_string(), id);
        if !alias.is_empty() && !self.full.contains(alias) {
            self.names.entry(alias.to_string()).or_insert(id);
        }
        Ok(())
    }

    fn into_names(self) -> HashMap<String, I> {
        self.names
    }
}

impl SchemaResolver {
    pub fn new(info: &P4Info) -> Result<Self, SchemaError> {
        let mut resolver = SchemaResolver::default();
        let mut action_names = NameIndex::new(SchemaObjectKind::Action);
        let mut table_names = NameIndex::new(SchemaObjectKind::Table);
        let mut counter_names = NameIndex::new(SchemaObjectKind::Counter);

        for action in &info.actions {
            let pre = &action.preamble;
            let id: ActionId = object_id(SchemaObjectKind::Action, pre.id, &pre.name)?;
            let mut params = Vec::with_capacity(action.params.len());
            for p in &action.params {
                params.push(ParamSchema {
                    id: object_id(SchemaObjectKind::ActionParam, p.id, &p.name)?,
                    name: p.name.clone(),
                    bitwidth: p.bitwidth,
                });
            }
            action_names.register(id, &pre.name, &pre.alias)?;
            resolver.actions.insert(
                id,
                ActionSchema {
                    id,
                    name: pre.name.clone(),
                    params,
                },
            );
        }

        for table in &info.tables {
            let pre = &table.preamble;
            let id: TableId = object_id(SchemaObjectKind::Table, pre.id, &pre.name)?;
            let mut fields = Vec::with_capacity(table.match_fields.len());
            for f in &table.match_fields {
                fields.push(FieldSchema {
                    id: object_id(SchemaObjectKind::MatchField, f.id, &f.name)?,
                    name: f.name.clone(),
                    bitwidth: f.bitwidth,
                    kind: f.match_type,
                });
            }
            let actions = table
                .action_refs
                .iter()
                .filter_map(|r| ActionId::from_raw(r.id))
                .collect();
            table_names.register(id, &pre.name, &pre.alias)?;
            resolver.tables.insert(
                id,
                TableSchema {
                    id,
                    name: pre.name.clone(),
                    fields,
                    actions,
                    size: table.size,
                },
            );
        }

        for counter in &info.counters {
            let pre = &counter.preamble;
            let id: CounterId = object_id(SchemaObjectKind::Counter, pre.id, &pre.name)?;
            counter_names.register(id, &pre.name, &pre.alias)?;
            resolver.counters.insert(
                id,
                CounterSchema {
                    id,
                    name: pre.name.clone(),
                    size: counter.size,
                },
            );
        }

        resolver.action_names = action_names.into_names();
        resolver.table_names = table_names.into_names();
        resolver.counter_names = counter_names.into_names();

        debug!(
            "Loaded schema: {} tables, {} actions, {} counters",
            resolver.tables.len(),
            resolver.actions.len(),
            resolver.counters.len()
        );
        Ok(resolver)
    }

    pub fn from_json(content: &str) -> Result<Self, SchemaError> {
        Self::new(&P4Info::from_json(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        Self::new(&P4Info::load(path)?)
    }

    pub fn table_id(&self, name: &str) -> Result<TableId, SchemaError> {
        self.table_names
            .get(name)
            .copied()
            .ok_or_else(|| SchemaError::unknown(SchemaObjectKind::Table, name))
    }

    pub fn action_id(&self, name: &str) -> Result<ActionId, SchemaError> {
        self.action_names
            .get(name)
            .copied()
            .ok_or_else(|| SchemaError::unknown(SchemaObjectKind::Action, name))
    }

    pub fn counter_id(&self, name: &str) -> Result<CounterId, SchemaError> {
        self.counter_names
            .get(name)
            .copied()
            .ok_or_else(|| SchemaError::unknown(SchemaObjectKind::Counter, name))
    }

    pub fn table(&self, id: TableId) -> Option<&TableSchema> {
        self.tables.get(&id)
    }

    pub fn action(&self, id: ActionId) -> Option<&ActionSchema> {
        self.actions.get(&id)
    }

    pub fn counter(&self, id: CounterId) -> Option<&CounterSchema> {
        self.counters.get(&id)
    }

    /// Resolves a match field of `table` by full name or last path segment.
    pub fn field(&self, table: TableId, name: &str) -> Result<&FieldSchema, SchemaError> {
        let unknown = || {
            let table_name = self.table_name(table).unwrap_or("?");
            SchemaError::unknown(SchemaObjectKind::MatchField, format!("{}.{}", table_name, name))
        };
        let schema = self.tables.get(&table).ok_or_else(unknown)?;

        if let Some(field) = schema.fields.iter().find(|f| f.name == name) {
            return Ok(field);
        }
        let mut by_suffix = schema
            .fields
            .iter()
            .filter(|f| f.name.rsplit('.').next() == Some(name));
        match (by_suffix.next(), by_suffix.next()) {
            (Some(field), None) => Ok(field),
            _ => Err(unknown()),
        }
    }

    /// Resolves a parameter of `action` by name.
    pub fn param(&self, action: ActionId, name: &str) -> Result<&ParamSchema, SchemaError> {
        self.actions
            .get(&action)
            .and_then(|a| a.params.iter().find(|p| p.name == name))
            .ok_or_else(|| {
                let action_name = self.action_name(action).unwrap_or("?");
                SchemaError::unknown(
                    SchemaObjectKind::ActionParam,
                    format!("{}.{}", action_name, name),
                )
            })
    }

    pub fn table_name(&self, id: TableId) -> Option<&str> {
        self.tables.get(&id).map(|t| t.name.as_str())
    }

    pub fn action_name(&self, id: ActionId) -> Option<&str> {
        self.actions.get(&id).map(|a| a.name.as_str())
    }

    pub fn counter_name(&self, id: CounterId) -> Option<&str> {
        self.counters.get(&id).map(|c| c.name.as_str())
    }

    pub fn field_by_id(&self, table: TableId, field: FieldId) -> Option<&FieldSchema> {
        self.tables
            .get(&table)
            .and_then(|t| t.fields.iter().find(|f| f.id == field))
    }

    pub fn param_by_id(&self, action: ActionId, param: ParamId) -> Option<&ParamSchema> {
        self.actions
            .get(&action)
            .and_then(|a| a.params.iter().find(|p| p.id == param))
    }

    pub fn field_name(&self, table: TableId, field: FieldId) -> Option<&str> {
        self.field_by_id(table, field).map(|f| f.name.as_str())
    }

    pub fn param_name(&self, action: ActionId, param: ParamId) -> Option<&str> {
        self.param_by_id(action, param).map(|p| p.name.as_str())
    }
}
