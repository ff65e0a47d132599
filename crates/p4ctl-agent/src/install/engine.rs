//! Batch installation across switches.

use super::readback::{read_back, InstalledEntry};
use super::report::{EntryOutcome, InstallError, InstallReport, SwitchReport};
use super::Sessions;
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::compiler::{CompiledBatch, CompiledEntry};
use crate::schema::SchemaResolver;
use log::{debug, error, info, warn};
use p4ctl_southbound::{DriverErrorKind, DriverResult, SouthboundSession};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Applies compiled batches to switches.
///
/// Each switch is driven by its own task that owns the switch's session for
/// the duration of the batch. Within a switch entries are written strictly
/// in compiled order; the first failure abandons the rest of that switch's
/// entries. Entries already written are never rolled back.
pub struct InstallationEngine {
    resolver: Arc<SchemaResolver>,
}

impl InstallationEngine {
    pub fn new(resolver: Arc<SchemaResolver>) -> Self {
        Self { resolver }
    }

    /// Writes `batch` to the switches in `sessions`.
    ///
    /// Sessions are handed back to `sessions` when their task finishes. A
    /// switch with no session fails without touching the others.
    pub async fn apply(&self, batch: &CompiledBatch, sessions: &mut Sessions) -> InstallReport {
        let order: Vec<String> = batch.switches().into_iter().map(str::to_string).collect();
        let mut reports: BTreeMap<String, SwitchReport> = BTreeMap::new();
        let mut pending: BTreeMap<String, Vec<CompiledEntry>> = BTreeMap::new();
        let mut tasks = JoinSet::new();

        for switch in &order {
            let entries: Vec<CompiledEntry> = batch.for_switch(switch).cloned().collect();
            match sessions.remove(switch) {
                Some(session) => {
                    debug!("Installing {} entries on {}", entries.len(), switch);
                    pending.insert(switch.clone(), entries.clone());
                    tasks.spawn(install_switch(switch.clone(), session, entries));
                }
                None => {
                    warn!("No session for switch {}, skipping {} entries", switch, entries.len());
                    let err = InstallError::NoSession(switch.clone());
                    reports.insert(switch.clone(), SwitchReport::abandoned(switch, entries, err));
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((session, report)) => {
                    pending.remove(&report.switch);
                    sessions.insert(report.switch.clone(), session);
                    reports.insert(report.switch.clone(), report);
                }
                Err(e) => error!("Install task failed: {}", e),
            }
        }

        // A task that panicked took its session with it.
        for (switch, entries) in pending {
            let err = InstallError::TaskAborted(switch.clone());
            reports.insert(switch.clone(), SwitchReport::abandoned(&switch, entries, err));
        }

        let report = InstallReport {
            switches: order.iter().filter_map(|s| reports.remove(s)).collect(),
        };
        for sw in &report.switches {
            audit_switch(sw);
        }
        info!(
            "Applied {}/{} entries across {} switches",
            report.succeeded(),
            report.total(),
            report.switches.len()
        );
        report
    }

    /// Deletes `batch` from the switches in reverse compiled order.
    ///
    /// An entry the device no longer holds counts as withdrawn. A failure
    /// stops withdrawal on that switch only.
    pub async fn withdraw(&self, batch: &CompiledBatch, sessions: &mut Sessions) -> InstallReport {
        let mut report = InstallReport::default();

        for switch in batch.switches() {
            let mut entries: Vec<CompiledEntry> = batch.for_switch(switch).cloned().collect();
            entries.reverse();
            let Some(session) = sessions.get_mut(switch) else {
                let err = InstallError::NoSession(switch.to_string());
                report.switches.push(SwitchReport::abandoned(switch, entries, err));
                continue;
            };

            let mut sw = SwitchReport::new(switch);
            let mut stopped = false;
            for compiled in entries {
                if stopped {
                    sw.push(compiled, EntryOutcome::Skipped);
                    continue;
                }
                let outcome = match session.delete_table_entry(&compiled.device).await {
                    Ok(()) => EntryOutcome::Withdrawn,
                    Err(e) if e.kind == DriverErrorKind::NotFound => EntryOutcome::AlreadyAbsent,
                    Err(e) => {
                        warn!("Failed to withdraw {} from {}: {}", compiled.entry, switch, e);
                        stopped = true;
                        EntryOutcome::Failed(e.into())
                    }
                };
                sw.push(compiled, outcome);
            }

            let record = AuditRecord::new(AuditCategory::RuleWithdraw, "InstallationEngine", "withdraw")
                .with_switch(switch)
                .with_details(serde_json::json!({
                    "withdrawn": sw.succeeded().count(),
                    "total": sw.results.len(),
                }));
            match sw.failure() {
                Some(err) => {
                    audit_log!(record.with_error(err.to_string()));
                }
                None => {
                    audit_log!(record.with_outcome(AuditOutcome::Success));
                }
            }
            report.switches.push(sw);
        }
        report
    }

    /// Reads back the entries installed on one switch, rendered with schema
    /// names.
    pub async fn read_back(&self, session: &mut dyn SouthboundSession) -> DriverResult<Vec<InstalledEntry>> {
        read_back(&self.resolver, session).await
    }
}

async fn install_switch(
    switch: String,
    mut session: Box<dyn SouthboundSession>,
    entries: Vec<CompiledEntry>,
) -> (Box<dyn SouthboundSession>, SwitchReport) {
    let mut report = SwitchReport::new(&switch);
    let mut abandoned = false;

    for compiled in entries {
        if abandoned {
            report.push(compiled, EntryOutcome::Skipped);
            continue;
        }

        let outcome = match session.write_table_entry(&compiled.device).await {
            Ok(()) => EntryOutcome::Installed,
            Err(e) if e.kind == DriverErrorKind::AlreadyExists => {
                debug!("{}: already present: {}", switch, compiled.entry);
                EntryOutcome::AlreadyPresent
            }
            Err(e) => {
                error!(
                    "Failed to install {} on {}: {}; abandoning remaining entries",
                    compiled.entry, switch, e
                );
                abandoned = true;
                EntryOutcome::Failed(e.into())
            }
        };
        report.push(compiled, outcome);
    }

    (session, report)
}

fn audit_switch(report: &SwitchReport) {
    let record = AuditRecord::new(AuditCategory::RuleInstall, "InstallationEngine", "apply")
        .with_switch(&report.switch)
        .with_details(serde_json::json!({
            "installed": report.count(|o| matches!(o, EntryOutcome::Installed)),
            "already_present": report.count(|o| matches!(o, EntryOutcome::AlreadyPresent)),
            "skipped": report.count(|o| matches!(o, EntryOutcome::Skipped)),
            "total": report.results.len(),
        }));

    match report.failure() {
        None => {
            audit_log!(record.with_outcome(AuditOutcome::Success));
        }
        Some(err) => {
            let outcome = if report.succeeded().next().is_some() {
                AuditOutcome::Partial
            } else {
                AuditOutcome::Failure
            };
            audit_log!(record.with_error(err.to_string()).with_outcome(outcome));
        }
    }
}
