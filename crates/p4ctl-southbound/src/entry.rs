//! Device-level table entries, counter cells and program descriptors.
//!
//! These are the id-resolved, byte-encoded forms the session operates on.
//! Name resolution and value encoding happen once, before anything reaches
//! a session.

use crate::types::{ActionId, CounterId, FieldId, ParamId, TableId};
use std::fmt;

/// A match value for one field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatchValue {
    Exact(Vec<u8>),
    Lpm { value: Vec<u8>, prefix_len: u32 },
}

/// One field of a match key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldMatch {
    pub field_id: FieldId,
    pub value: MatchValue,
}

impl FieldMatch {
    pub fn exact(field_id: FieldId, value: Vec<u8>) -> Self {
        Self {
            field_id,
            value: MatchValue::Exact(value),
        }
    }

    pub fn lpm(field_id: FieldId, value: Vec<u8>, prefix_len: u32) -> Self {
        Self {
            field_id,
            value: MatchValue::Lpm { value, prefix_len },
        }
    }
}

/// An encoded action parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamValue {
    pub param_id: ParamId,
    pub value: Vec<u8>,
}

/// An action invocation with its encoded parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionCall {
    pub action_id: ActionId,
    pub params: Vec<ParamValue>,
}

/// A table entry as written to a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceEntry {
    pub table_id: TableId,
    pub matches: Vec<FieldMatch>,
    pub action: ActionCall,
    pub priority: Option<i32>,
    /// Sets the table's default action instead of adding an entry.
    pub is_default_action: bool,
}

/// Identity of an entry within a device: the table plus its match fields.
///
/// Two entries with the same key occupy the same slot; a device holds at
/// most one action per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey {
    pub table_id: TableId,
    pub matches: Vec<FieldMatch>,
    pub is_default_action: bool,
}

impl DeviceEntry {
    /// Returns the entry's key with match fields ordered by field id.
    pub fn key(&self) -> EntryKey {
        let mut matches = self.matches.clone();
        matches.sort();
        EntryKey {
            table_id: self.table_id,
            matches,
            is_default_action: self.is_default_action,
        }
    }
}

impl fmt::Display for DeviceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table {} ", self.table_id)?;
        if self.is_default_action {
            write!(f, "default")?;
        } else {
            write!(f, "[")?;
            for (i, m) in self.matches.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                match &m.value {
                    MatchValue::Exact(v) => write!(f, "{}={}", m.field_id, hex(v))?,
                    MatchValue::Lpm { value, prefix_len } => {
                        write!(f, "{}={}/{}", m.field_id, hex(value), prefix_len)?
                    }
                }
            }
            write!(f, "]")?;
        }
        write!(f, " -> action {}", self.action.action_id)?;
        if let Some(priority) = self.priority {
            write!(f, " priority {}", priority)?;
        }
        Ok(())
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(2 + bytes.len() * 2);
    s.push_str("0x");
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

/// Packet and byte counts for one counter index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CounterCell {
    pub counter_id: CounterId,
    pub index: u64,
    pub packet_count: u64,
    pub byte_count: u64,
}

/// The data-plane program handed to a device before any entry is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramDescriptor {
    pub name: String,
    pub p4info: Vec<u8>,
    pub device_config: Vec<u8>,
}
