//! Compilation errors.
//!
//! Every variant is a configuration error: it is detected before any device
//! is touched and aborts the run.

use crate::intent::Intent;
use crate::schema::SchemaError;
use p4ctl_types::{ParseError, PortNumber};

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("unknown switch: {0}")]
    UnknownSwitch(String),

    #[error("switch {switch} has no port {port}")]
    UnknownPort { switch: String, port: PortNumber },

    #[error("invalid intent: {0}")]
    InvalidIntent(String),

    #[error("tunnel id {tunnel_id} already carries {existing}, cannot reuse it for {requested}")]
    DuplicateTunnelId {
        tunnel_id: u32,
        existing: String,
        requested: String,
    },

    #[error(
        "selection range [{base}, {end}) on {switch} overlaps [{existing_base}, {existing_end})"
    )]
    RangeConflict {
        switch: String,
        base: u32,
        end: u64,
        existing_base: u32,
        existing_end: u64,
    },

    #[error("selection index {index} on {switch} is outside every ECMP range")]
    DanglingSelectionIndex { switch: String, index: u32 },

    #[error(
        "ports {ingress_port} -> {egress_port} on {switch} already tagged {existing}, cannot tag {requested}"
    )]
    ConflictingDirection {
        switch: String,
        ingress_port: PortNumber,
        egress_port: PortNumber,
        existing: String,
        requested: String,
    },

    #[error("route {prefix} in {table} on {switch} already points elsewhere")]
    DuplicateRoute {
        switch: String,
        table: String,
        prefix: String,
    },

    #[error("entry {entry} on {switch} clashes with {existing}")]
    ConflictingEntry {
        switch: String,
        entry: String,
        existing: String,
    },

    #[error("invalid value for {object}: {source}")]
    InvalidValue {
        object: String,
        #[source]
        source: ParseError,
    },

    #[error("invalid match on {table}.{field}: {reason}")]
    InvalidMatch {
        table: String,
        field: String,
        reason: String,
    },

    #[error("action {action} is not allowed in table {table}")]
    ActionNotInTable { table: String, action: String },

    #[error("action {action} requires parameter {param}")]
    MissingParam { action: String, param: String },
}

/// A compile failure with the intent that caused it.
#[derive(Debug, thiserror::Error)]
#[error("intent #{index} ({intent}): {error}")]
pub struct IntentError {
    pub index: usize,
    pub intent: Intent,
    #[source]
    pub error: CompileError,
}
