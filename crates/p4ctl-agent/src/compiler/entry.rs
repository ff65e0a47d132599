//! Named table entries produced by the compiler.

use p4ctl_southbound::DeviceEntry;
use p4ctl_types::FieldValue;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchField {
    pub name: String,
    pub value: FieldValue,
    /// Prefix length for LPM fields; `None` for exact matches.
    pub prefix_len: Option<u8>,
}

impl MatchField {
    pub fn exact(name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            prefix_len: None,
        }
    }

    pub fn lpm(name: impl Into<String>, value: impl Into<FieldValue>, prefix_len: u8) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            prefix_len: Some(prefix_len),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionParam {
    pub name: String,
    pub value: FieldValue,
}

impl ActionParam {
    pub fn new(name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A match-action entry in schema names.
///
/// An entry without match fields sets the table's default action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableEntry {
    pub table: String,
    pub matches: Vec<MatchField>,
    pub action: String,
    pub params: Vec<ActionParam>,
    pub priority: Option<i32>,
}

impl TableEntry {
    pub fn new(table: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            matches: Vec::new(),
            action: action.into(),
            params: Vec::new(),
            priority: None,
        }
    }

    pub fn with_match(mut self, field: MatchField) -> Self {
        self.matches.push(field);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.params.push(ActionParam::new(name, value));
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn is_default_action(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn param(&self, name: &str) -> Option<&FieldValue> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    pub fn match_value(&self, name: &str) -> Option<&FieldValue> {
        self.matches.iter().find(|m| m.name == name).map(|m| &m.value)
    }
}

impl fmt::Display for TableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.table)?;
        if self.is_default_action() {
            write!(f, "default")?;
        } else {
            write!(f, "[")?;
            for (i, m) in self.matches.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}={}", m.name, m.value)?;
                if let Some(len) = m.prefix_len {
                    write!(f, "/{}", len)?;
                }
            }
            write!(f, "]")?;
        }
        write!(f, " -> {}(", self.action)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", p.name, p.value)?;
        }
        write!(f, ")")?;
        if let Some(priority) = self.priority {
            write!(f, " priority {}", priority)?;
        }
        Ok(())
    }
}

/// One compiled entry bound to its switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledEntry {
    pub switch: String,
    pub entry: TableEntry,
    /// The id-resolved, byte-encoded form written to the device.
    pub device: DeviceEntry,
    /// Position of the intent this entry came from.
    pub origin: usize,
}

/// Compiler output in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledBatch {
    entries: Vec<CompiledEntry>,
}

impl CompiledBatch {
    pub fn new(entries: Vec<CompiledEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CompiledEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledEntry> {
        self.entries.iter()
    }

    /// Entries for one switch, in emission order.
    pub fn for_switch<'a>(&'a self, switch: &'a str) -> impl Iterator<Item = &'a CompiledEntry> {
        self.entries.iter().filter(move |e| e.switch == switch)
    }

    /// Switch names in order of first appearance.
    pub fn switches(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for e in &self.entries {
            if !seen.contains(&e.switch.as_str()) {
                seen.push(e.switch.as_str());
            }
        }
        seen
    }
}

impl<'a> IntoIterator for &'a CompiledBatch {
    type Item = &'a CompiledEntry;
    type IntoIter = std::slice::Iter<'a, CompiledEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
