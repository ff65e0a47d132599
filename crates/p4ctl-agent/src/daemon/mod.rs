//! Run orchestration.
//!
//! The [`Orchestrator`] drives one run end to end: compile the intents,
//! open and claim a session per switch, push the program, install the
//! compiled batch, read it back, poll counters until cancelled and finally
//! release every session.

mod orchestrator;

pub use orchestrator::{Orchestrator, OrchestratorError, RunContext, RunSummary};
