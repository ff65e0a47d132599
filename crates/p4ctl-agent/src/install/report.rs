//! Per-entry installation outcomes and the operator report.

use crate::compiler::CompiledEntry;
use p4ctl_southbound::{DriverError, DriverErrorKind};
use std::fmt;

/// Why an entry could not be installed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstallError {
    /// The device already holds a different entry under the same match key.
    #[error("rule conflict: {0}")]
    RuleConflict(DriverError),

    #[error(transparent)]
    Driver(DriverError),

    #[error("no session for switch {0}")]
    NoSession(String),

    #[error("install task for switch {0} aborted")]
    TaskAborted(String),
}

impl From<DriverError> for InstallError {
    fn from(err: DriverError) -> Self {
        match err.kind {
            DriverErrorKind::Conflict => InstallError::RuleConflict(err),
            _ => InstallError::Driver(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Installed,
    /// The device already held this exact entry.
    AlreadyPresent,
    Withdrawn,
    /// The device no longer held the entry being withdrawn.
    AlreadyAbsent,
    Failed(InstallError),
    /// Not attempted because an earlier entry on the same switch failed.
    Skipped,
}

impl EntryOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, EntryOutcome::Failed(_) | EntryOutcome::Skipped)
    }
}

impl fmt::Display for EntryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryOutcome::Installed => write!(f, "installed"),
            EntryOutcome::AlreadyPresent => write!(f, "already present"),
            EntryOutcome::Withdrawn => write!(f, "withdrawn"),
            EntryOutcome::AlreadyAbsent => write!(f, "already absent"),
            EntryOutcome::Failed(err) => write!(f, "FAILED ({})", err),
            EntryOutcome::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryResult {
    pub entry: CompiledEntry,
    pub outcome: EntryOutcome,
}

/// Outcomes for one switch, in compiled order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchReport {
    pub switch: String,
    pub results: Vec<EntryResult>,
}

impl SwitchReport {
    pub fn new(switch: impl Into<String>) -> Self {
        Self {
            switch: switch.into(),
            results: Vec::new(),
        }
    }

    /// Marks every entry failed with `error` (the first) or skipped (the rest).
    pub fn abandoned(switch: impl Into<String>, entries: Vec<CompiledEntry>, error: InstallError) -> Self {
        let mut report = Self::new(switch);
        let mut error = Some(error);
        for entry in entries {
            let outcome = match error.take() {
                Some(err) => EntryOutcome::Failed(err),
                None => EntryOutcome::Skipped,
            };
            report.results.push(EntryResult { entry, outcome });
        }
        report
    }

    pub fn push(&mut self, entry: CompiledEntry, outcome: EntryOutcome) {
        self.results.push(EntryResult { entry, outcome });
    }

    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_success())
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &EntryResult> {
        self.results.iter().filter(|r| r.outcome.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &EntryResult> {
        self.results.iter().filter(|r| !r.outcome.is_success())
    }

    /// The error that stopped this switch, if any.
    pub fn failure(&self) -> Option<&InstallError> {
        self.results.iter().find_map(|r| match &r.outcome {
            EntryOutcome::Failed(err) => Some(err),
            _ => None,
        })
    }

    pub fn count(&self, outcome: fn(&EntryOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| outcome(&r.outcome)).count()
    }
}

/// Result of applying a batch across all switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub switches: Vec<SwitchReport>,
}

impl InstallReport {
    pub fn switch(&self, name: &str) -> Option<&SwitchReport> {
        self.switches.iter().find(|s| s.switch == name)
    }

    pub fn is_success(&self) -> bool {
        self.switches.iter().all(SwitchReport::is_success)
    }

    pub fn total(&self) -> usize {
        self.switches.iter().map(|s| s.results.len()).sum()
    }

    pub fn succeeded(&self) -> usize {
        self.switches.iter().map(|s| s.succeeded().count()).sum()
    }

    pub fn failed_switches(&self) -> Vec<&str> {
        self.switches
            .iter()
            .filter(|s| !s.is_success())
            .map(|s| s.switch.as_str())
            .collect()
    }
}

impl fmt::Display for InstallReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "----- Installed entries -----")?;
        for sw in &self.switches {
            let status = match sw.failure() {
                None => "ok".to_string(),
                Some(err) => format!("partial: {}", err),
            };
            writeln!(
                f,
                "{}: {}/{} entries ({})",
                sw.switch,
                sw.succeeded().count(),
                sw.results.len(),
                status
            )?;
            for r in &sw.results {
                writeln!(f, "  [{}] {}", r.outcome, r.entry.entry)?;
            }
        }
        write!(f, "{}/{} entries applied", self.succeeded(), self.total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::TableEntry;
    use p4ctl_southbound::{ActionCall, ActionId, DeviceEntry, TableId};
    use pretty_assertions::assert_eq;

    fn compiled(switch: &str, action: &str) -> CompiledEntry {
        CompiledEntry {
            switch: switch.to_string(),
            entry: TableEntry::new("MyEgress.swtrace", action),
            device: DeviceEntry {
                table_id: TableId::from_raw(1).unwrap(),
                matches: Vec::new(),
                action: ActionCall {
                    action_id: ActionId::from_raw(2).unwrap(),
                    params: Vec::new(),
                },
                priority: None,
                is_default_action: true,
            },
            origin: 0,
        }
    }

    #[test]
    fn test_driver_error_mapping() {
        assert!(matches!(
            InstallError::from(DriverError::conflict("taken")),
            InstallError::RuleConflict(_)
        ));
        assert!(matches!(
            InstallError::from(DriverError::unreachable("down")),
            InstallError::Driver(_)
        ));
    }

    #[test]
    fn test_abandoned_report() {
        let report = SwitchReport::abandoned(
            "s2",
            vec![compiled("s2", "a"), compiled("s2", "b")],
            InstallError::NoSession("s2".to_string()),
        );
        assert!(!report.is_success());
        assert_eq!(report.results[0].outcome, EntryOutcome::Failed(InstallError::NoSession("s2".to_string())));
        assert_eq!(report.results[1].outcome, EntryOutcome::Skipped);
        assert_eq!(report.count(|o| matches!(o, EntryOutcome::Skipped)), 1);
    }

    #[test]
    fn test_render() {
        let mut ok = SwitchReport::new("s1");
        ok.push(compiled("s1", "a"), EntryOutcome::Installed);
        ok.push(compiled("s1", "b"), EntryOutcome::AlreadyPresent);
        let mut bad = SwitchReport::new("s2");
        bad.push(
            compiled("s2", "a"),
            EntryOutcome::Failed(InstallError::Driver(DriverError::unreachable("connection refused"))),
        );
        bad.push(compiled("s2", "b"), EntryOutcome::Skipped);

        let report = InstallReport {
            switches: vec![ok, bad],
        };
        assert!(!report.is_success());
        assert_eq!(report.failed_switches(), vec!["s2"]);
        assert_eq!(
            report.to_string(),
            "----- Installed entries -----\n\
             s1: 2/2 entries (ok)\n  \
             [installed] MyEgress.swtrace default -> a()\n  \
             [already present] MyEgress.swtrace default -> b()\n\
             s2: 0/2 entries (partial: unreachable: connection refused)\n  \
             [FAILED (unreachable: connection refused)] MyEgress.swtrace default -> a()\n  \
             [skipped] MyEgress.swtrace default -> b()\n\
             2/4 entries applied"
        );
    }
}
