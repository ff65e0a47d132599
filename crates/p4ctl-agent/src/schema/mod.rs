//! Device schema: P4Info loading and name resolution.
//!
//! The resolver is built once per run and shared read-only (`Arc`) by the
//! compiler, the installation engine and the telemetry poller.

mod p4info;
mod resolver;

pub use p4info::{MatchKind, P4Info};
pub use resolver::{
    ActionSchema, CounterSchema, FieldSchema, ParamSchema, SchemaResolver, TableSchema,
};

use std::fmt;

/// Kind of schema object named in a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaObjectKind {
    Table,
    Action,
    MatchField,
    ActionParam,
    Counter,
}

impl fmt::Display for SchemaObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaObjectKind::Table => write!(f, "table"),
            SchemaObjectKind::Action => write!(f, "action"),
            SchemaObjectKind::MatchField => write!(f, "match field"),
            SchemaObjectKind::ActionParam => write!(f, "action parameter"),
            SchemaObjectKind::Counter => write!(f, "counter"),
        }
    }
}

/// Error type for schema loading and lookups.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("failed to read schema {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed P4Info: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown {kind}: {name}")]
    UnknownSchemaObject { kind: SchemaObjectKind, name: String },

    #[error("{kind} {name} has id 0")]
    InvalidId { kind: SchemaObjectKind, name: String },

    #[error("duplicate {kind} name: {name}")]
    DuplicateName { kind: SchemaObjectKind, name: String },
}

impl SchemaError {
    pub fn unknown(kind: SchemaObjectKind, name: impl Into<String>) -> Self {
        SchemaError::UnknownSchemaObject {
            kind,
            name: name.into(),
        }
    }
}
