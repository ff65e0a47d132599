//! Read-back of installed entries with schema names.

use crate::schema::SchemaResolver;
use p4ctl_southbound::{DeviceEntry, DriverResult, MatchValue, SouthboundSession};
use p4ctl_types::{render_address, render_bytes};
use std::fmt::Write as _;
use tokio_stream::StreamExt;

/// An entry read from a device, with its human-readable rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledEntry {
    pub device: DeviceEntry,
    pub rendered: String,
}

/// Reads every entry installed on `session` and renders it with schema
/// names. Ids the schema does not know are rendered numerically.
pub async fn read_back(
    resolver: &SchemaResolver,
    session: &mut dyn SouthboundSession,
) -> DriverResult<Vec<InstalledEntry>> {
    let mut stream = session.read_table_entries().await?;
    let mut installed = Vec::new();
    while let Some(entry) = stream.next().await {
        let device = entry?;
        let rendered = render_entry(resolver, &device);
        installed.push(InstalledEntry { device, rendered });
    }
    Ok(installed)
}

pub fn render_entry(resolver: &SchemaResolver, entry: &DeviceEntry) -> String {
    let mut out = String::new();
    let table = resolver
        .table_name(entry.table_id)
        .map(str::to_string)
        .unwrap_or_else(|| entry.table_id.to_string());
    out.push_str(&table);

    if entry.is_default_action {
        out.push_str(" default");
    } else {
        out.push_str(" [");
        for (i, m) in entry.matches.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let field = resolver.field_by_id(entry.table_id, m.field_id);
            let name = field
                .map(|f| f.name.clone())
                .unwrap_or_else(|| m.field_id.to_string());
            let bitwidth = field.map(|f| f.bitwidth).unwrap_or(0);
            match &m.value {
                MatchValue::Exact(value) => {
                    let _ = write!(out, "{}={}", name, render_value(&name, value, bitwidth));
                }
                MatchValue::Lpm { value, prefix_len } => {
                    let _ = write!(out, "{}={}/{}", name, render_address(value, bitwidth), prefix_len);
                }
            }
        }
        out.push(']');
    }

    let action_id = entry.action.action_id;
    let action = resolver
        .action_name(action_id)
        .map(str::to_string)
        .unwrap_or_else(|| action_id.to_string());
    let _ = write!(out, " -> {}(", action);
    for (i, p) in entry.action.params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let param = resolver.param_by_id(action_id, p.param_id);
        let name = param
            .map(|p| p.name.clone())
            .unwrap_or_else(|| p.param_id.to_string());
        let bitwidth = param.map(|p| p.bitwidth).unwrap_or(0);
        let _ = write!(out, "{}={}", name, render_value(&name, &p.value, bitwidth));
    }
    out.push(')');

    if let Some(priority) = entry.priority {
        let _ = write!(out, " priority {}", priority);
    }
    out
}

/// Exact-match fields and params carry no address type in P4Info, so
/// addresses are recognised by name (`hdr.ipv4.dstAddr`, `nhop_ipv4`).
fn render_value(name: &str, value: &[u8], bitwidth: u32) -> String {
    let lower = name.to_ascii_lowercase();
    if lower.contains("ipv4") || lower.ends_with("addr") {
        render_address(value, bitwidth)
    } else {
        render_bytes(value, bitwidth)
    }
}
