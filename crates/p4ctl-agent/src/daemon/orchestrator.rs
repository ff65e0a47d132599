//! Run lifecycle.

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::compiler::{IntentError, RuleCompiler, TablePlan};
use crate::config::{AgentConfig, ConfigError};
use crate::install::{InstallReport, InstallationEngine, InstalledEntry, Sessions};
use crate::intent::Intent;
use crate::schema::SchemaResolver;
use crate::telemetry::{CounterTarget, TelemetryError, TelemetryPoller, TelemetrySummary, TickReport};
use crate::topology::Topology;
use log::{debug, error, info, warn};
use p4ctl_southbound::{DriverError, ProgramDescriptor, SouthboundConnector, SouthboundSession};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Compile(#[from] IntentError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error("switch {switch}: {source}")]
    Session {
        switch: String,
        #[source]
        source: DriverError,
    },
}

/// Everything one run needs. Built once, owned by the [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct RunContext {
    pub resolver: Arc<SchemaResolver>,
    pub topology: Topology,
    pub plan: TablePlan,
    pub program: ProgramDescriptor,
    pub election_id: u64,
    pub readback: bool,
    pub withdraw_on_exit: bool,
    pub counters: Vec<CounterTarget>,
    pub poll_interval: Duration,
    pub max_ticks: Option<u64>,
}

impl RunContext {
    pub fn from_config(
        config: &AgentConfig,
        resolver: Arc<SchemaResolver>,
        program: ProgramDescriptor,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            resolver,
            topology: config.topology()?,
            plan: config.tables.clone(),
            program,
            election_id: config.election_id,
            readback: config.readback,
            withdraw_on_exit: config.withdraw_on_exit,
            counters: config.telemetry.counters.clone(),
            poll_interval: config.poll_interval(),
            max_ticks: None,
        })
    }

    pub fn with_max_ticks(mut self, ticks: Option<u64>) -> Self {
        self.max_ticks = ticks;
        self
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub install: InstallReport,
    /// Installed entries per switch, when read-back is enabled.
    pub installed: BTreeMap<String, Vec<InstalledEntry>>,
    pub telemetry: TelemetrySummary,
    pub withdraw: Option<InstallReport>,
}

/// Drives one run: compile, connect, install, poll, release.
pub struct Orchestrator {
    ctx: RunContext,
    connector: Arc<dyn SouthboundConnector>,
}

impl Orchestrator {
    pub fn new(ctx: RunContext, connector: Arc<dyn SouthboundConnector>) -> Self {
        Self { ctx, connector }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Runs until telemetry stops, then releases every session.
    ///
    /// Every intent is compiled before any session is opened. Installation
    /// failures are reported in the summary and do not stop telemetry.
    pub async fn run<F>(
        &self,
        intents: &[Intent],
        cancel: &CancellationToken,
        on_tick: F,
    ) -> Result<RunSummary, OrchestratorError>
    where
        F: FnMut(&TickReport),
    {
        let ctx = &self.ctx;
        let batch = RuleCompiler::new(&ctx.topology, &ctx.plan, &ctx.resolver).compile_all(intents)?;

        let mut poller = TelemetryPoller::new(&ctx.resolver, ctx.counters.clone(), ctx.poll_interval)?;
        if let Some(ticks) = ctx.max_ticks {
            poller = poller.with_max_ticks(ticks);
        }

        let mut sessions = self.open_sessions().await?;
        let engine = InstallationEngine::new(ctx.resolver.clone());
        let mut summary = RunSummary {
            install: engine.apply(&batch, &mut sessions).await,
            ..RunSummary::default()
        };
        if !summary.install.is_success() {
            warn!(
                "Partial installation on {}; entries already written were kept",
                summary.install.failed_switches().join(", ")
            );
        }

        if ctx.readback {
            for (name, session) in sessions.iter_mut() {
                match engine.read_back(&mut **session).await {
                    Ok(entries) => {
                        info!("{}: {} entries installed", name, entries.len());
                        for entry in &entries {
                            info!("  {}", entry.rendered);
                        }
                        summary.installed.insert(name.clone(), entries);
                    }
                    Err(e) => warn!("Failed to read back entries from {}: {}", name, e),
                }
            }
        }

        summary.telemetry = poller.run(&mut sessions, cancel, on_tick).await;

        if ctx.withdraw_on_exit {
            summary.withdraw = Some(engine.withdraw(&batch, &mut sessions).await);
        }

        release(&mut sessions).await;
        Ok(summary)
    }

    /// Opens, claims and programs every switch in topology order.
    ///
    /// On the first failure the sessions opened so far are released.
    async fn open_sessions(&self) -> Result<Sessions, OrchestratorError> {
        let mut sessions = Sessions::new();

        for sw in self.ctx.topology.iter() {
            let opened = self.open_one(&sw.name, &sw.address, sw.device_id).await;

            match opened {
                Ok(session) => {
                    audit_log!(AuditRecord::new(
                        AuditCategory::SessionLifecycle,
                        "Orchestrator",
                        "establish_session"
                    )
                    .with_switch(&sw.name)
                    .with_object(&sw.address)
                    .with_outcome(AuditOutcome::Success));
                    sessions.insert(sw.name.clone(), session);
                }
                Err(source) => {
                    error!("Failed to set up switch {}: {}", sw.name, source);
                    audit_log!(AuditRecord::new(
                        AuditCategory::ErrorCondition,
                        "Orchestrator",
                        "establish_session"
                    )
                    .with_switch(&sw.name)
                    .with_object(&sw.address)
                    .with_error(source.to_string()));
                    release(&mut sessions).await;
                    return Err(OrchestratorError::Session {
                        switch: sw.name.clone(),
                        source,
                    });
                }
            }
        }

        Ok(sessions)
    }

    async fn open_one(
        &self,
        name: &str,
        address: &str,
        device_id: u64,
    ) -> Result<Box<dyn SouthboundSession>, DriverError> {
        let mut session = self
            .connector
            .establish_session(name, address, device_id)
            .await?;
        debug!("Connected to {} at {} (device {})", name, address, device_id);

        if let Err(e) = self.claim(session.as_mut(), name).await {
            let _ = session.shutdown().await;
            return Err(e);
        }
        Ok(session)
    }

    async fn claim(
        &self,
        session: &mut dyn SouthboundSession,
        switch: &str,
    ) -> Result<(), DriverError> {
        let ctx = &self.ctx;

        session.assert_mastership(ctx.election_id).await?;
        audit_log!(AuditRecord::new(AuditCategory::Mastership, "Orchestrator", "assert_mastership")
            .with_switch(switch)
            .with_details(serde_json::json!({ "election_id": ctx.election_id }))
            .with_outcome(AuditOutcome::Success));

        session.push_program(&ctx.program).await?;
        audit_log!(AuditRecord::new(AuditCategory::ProgramInstall, "Orchestrator", "push_program")
            .with_switch(switch)
            .with_object(&ctx.program.name)
            .with_details(serde_json::json!({
                "p4info_bytes": ctx.program.p4info.len(),
                "device_config_bytes": ctx.program.device_config.len(),
            }))
            .with_outcome(AuditOutcome::Success));
        info!("Installed program {} on {}", ctx.program.name, switch);
        Ok(())
    }
}

/// Shuts down and drops every session.
async fn release(sessions: &mut Sessions) {
    for (name, mut session) in std::mem::take(sessions) {
        match session.shutdown().await {
            Ok(()) => {
                debug!("Released session to {}", name);
                audit_log!(AuditRecord::new(
                    AuditCategory::SessionLifecycle,
                    "Orchestrator",
                    "shutdown"
                )
                .with_switch(&name)
                .with_outcome(AuditOutcome::Success));
            }
            Err(e) => warn!("Failed to release session to {}: {}", name, e),
        }
    }
}
