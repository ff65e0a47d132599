//! p4ctl agent - intent compilation and installation for P4Runtime switches
//!
//! The agent turns operator intents (tunnels, ECMP groups, firewall port
//! checks, ...) into P4 table entries, installs them on every switch of a
//! static topology and then polls counters until cancelled.
//!
//! # Architecture
//!
//! ```text
//! [topology.yaml] ──> [RuleCompiler] ──> [InstallationEngine] ──> [SouthboundSession] ──> [switch]
//!                          │                                              │
//!                   [SchemaResolver]                              [TelemetryPoller]
//! ```
//!
//! # Key Components
//!
//! - [`schema`]: P4Info loading and name/id resolution
//! - [`intent`]: operator intents
//! - [`compiler`]: intent to table entry compilation
//! - [`install`]: per-switch batch installation, read-back and withdrawal
//! - [`telemetry`]: periodic counter polling
//! - [`daemon::Orchestrator`]: one run, from compile to session release
//! - [`audit`]: structured audit records

pub mod audit;
pub mod compiler;
pub mod config;
pub mod daemon;
pub mod install;
pub mod intent;
pub mod schema;
pub mod telemetry;
pub mod topology;
