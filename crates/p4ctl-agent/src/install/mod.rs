//! Installation of compiled entries onto switches.
//!
//! - [`InstallationEngine::apply`]: ordered per switch, concurrent across
//!   switches, per-entry outcomes
//! - [`InstallationEngine::withdraw`]: reverse-order delete of a batch
//! - [`read_back`]: installed entries rendered with schema names

mod engine;
mod readback;
mod report;

use p4ctl_southbound::SouthboundSession;
use std::collections::BTreeMap;

pub use engine::InstallationEngine;
pub use readback::{read_back, render_entry, InstalledEntry};
pub use report::{EntryOutcome, EntryResult, InstallError, InstallReport, SwitchReport};

/// Open sessions keyed by switch name. Each session has a single owner.
pub type Sessions = BTreeMap<String, Box<dyn SouthboundSession>>;
