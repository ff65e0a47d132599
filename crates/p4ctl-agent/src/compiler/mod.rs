//! Intent to table entry compilation.
//!
//! The compiler runs entirely before any session is opened. It expands
//! intents against a [`TablePlan`], checks them against each other and
//! against the schema, and lowers every entry to its device form once.

mod entry;
mod error;
mod lower;
mod plan;
mod rule_compiler;

pub use entry::{ActionParam, CompiledBatch, CompiledEntry, MatchField, TableEntry};
pub use error::{CompileError, IntentError};
pub use lower::lower;
pub use plan::{
    EcmpPlan, FirewallPlan, ForwardPlan, NextHopPlan, RewritePlan, TablePlan, TracePlan,
    TunnelPlan,
};
pub use rule_compiler::{lpm_priority, RuleCompiler};
