//! Periodic counter polling.

use super::sample::{CounterFailure, CounterSample, CounterTarget, TelemetrySummary, TickReport};
use super::TelemetryError;
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::install::Sessions;
use crate::schema::SchemaResolver;
use log::{debug, info, warn};
use p4ctl_southbound::{CounterId, DriverError};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
struct ResolvedTarget {
    target: CounterTarget,
    counter_id: CounterId,
    counter_name: String,
}

/// Reads a fixed list of counters on a fixed cadence.
///
/// Targets are read sequentially in configuration order. A failed read is
/// logged and reported for its tick; the loop carries on.
#[derive(Debug, Clone)]
pub struct TelemetryPoller {
    targets: Vec<ResolvedTarget>,
    interval: Duration,
    max_ticks: Option<u64>,
}

impl TelemetryPoller {
    /// Resolves every target's counter against the schema.
    pub fn new(
        resolver: &SchemaResolver,
        targets: Vec<CounterTarget>,
        interval: Duration,
    ) -> Result<Self, TelemetryError> {
        if interval.is_zero() {
            return Err(TelemetryError::InvalidInterval);
        }

        let mut resolved = Vec::with_capacity(targets.len());
        for target in targets {
            let counter_id = resolver.counter_id(&target.counter)?;
            let counter_name = resolver
                .counter_name(counter_id)
                .unwrap_or(&target.counter)
                .to_string();
            resolved.push(ResolvedTarget {
                target,
                counter_id,
                counter_name,
            });
        }

        Ok(Self {
            targets: resolved,
            interval,
            max_ticks: None,
        })
    }

    /// Stops the loop after `ticks` ticks.
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn targets(&self) -> impl Iterator<Item = &CounterTarget> {
        self.targets.iter().map(|r| &r.target)
    }

    /// Reads every target once.
    pub async fn poll_once(&self, sessions: &mut Sessions, tick: u64) -> TickReport {
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        for resolved in &self.targets {
            let target = &resolved.target;
            let result = match sessions.get_mut(&target.switch) {
                Some(session) => session.read_counter(resolved.counter_id, target.index).await,
                None => Err(DriverError::unreachable(format!(
                    "no session for switch {}",
                    target.switch
                ))),
            };

            match result {
                Ok(cells) if cells.is_empty() && target.index != 0 => {
                    report.samples.push(self.sample(resolved, target.index, 0, 0));
                }
                Ok(cells) => {
                    for cell in cells {
                        report.samples.push(self.sample(
                            resolved,
                            cell.index,
                            cell.packet_count,
                            cell.byte_count,
                        ));
                    }
                }
                Err(error) => {
                    warn!(
                        "Failed to read {}[{}] on {}: {}",
                        resolved.counter_name, target.index, target.switch, error
                    );
                    report.failures.push(CounterFailure {
                        switch: target.switch.clone(),
                        counter: resolved.counter_name.clone(),
                        index: target.index,
                        error,
                    });
                }
            }
        }

        debug!(
            "Tick {}: {} samples, {} failures",
            tick,
            report.samples.len(),
            report.failures.len()
        );
        report
    }

    /// Polls until `cancel` fires or the tick limit is reached.
    ///
    /// The first read happens one interval after the call. Cancellation is
    /// observed between ticks only; a tick that has started always finishes.
    pub async fn run<F>(
        &self,
        sessions: &mut Sessions,
        cancel: &CancellationToken,
        mut on_tick: F,
    ) -> TelemetrySummary
    where
        F: FnMut(&TickReport),
    {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut summary = TelemetrySummary::default();

        info!(
            "Polling {} counters every {:?}",
            self.targets.len(),
            self.interval
        );

        loop {
            if self.max_ticks.is_some_and(|max| summary.ticks >= max) {
                debug!("Reached tick limit");
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Telemetry cancelled after {} ticks", summary.ticks);
                    break;
                }
                _ = ticker.tick() => {}
            }

            let report = self.poll_once(sessions, summary.ticks + 1).await;
            summary.record(&report);
            on_tick(&report);
        }

        let record = AuditRecord::new(AuditCategory::Telemetry, "TelemetryPoller", "run")
            .with_details(serde_json::json!({
                "ticks": summary.ticks,
                "samples": summary.samples,
                "failures": summary.failures,
            }));
        let outcome = if summary.failures == 0 {
            AuditOutcome::Success
        } else {
            AuditOutcome::Partial
        };
        audit_log!(record.with_outcome(outcome));

        summary
    }

    fn sample(
        &self,
        resolved: &ResolvedTarget,
        index: u64,
        packet_count: u64,
        byte_count: u64,
    ) -> CounterSample {
        CounterSample {
            switch: resolved.target.switch.clone(),
            counter: resolved.counter_name.clone(),
            index,
            packet_count,
            byte_count,
            label: resolved.target.label.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaError;
    use p4ctl_southbound::{ProgramDescriptor, SimulatedFabric, SouthboundConnector};
    use pretty_assertions::assert_eq;

    const TUTORIAL: &str = include_str!("../../tests/fixtures/tutorial.p4info.json");
    const INGRESS: &str = "MyIngress.ingressTunnelCounter";
    const S1: &str = "127.0.0.1:50051";

    fn schema() -> SchemaResolver {
        SchemaResolver::from_json(TUTORIAL).unwrap()
    }

    async fn sessions(fabric: &SimulatedFabric) -> Sessions {
        let mut session = fabric.establish_session("s1", S1, 0).await.unwrap();
        session.assert_mastership(1).await.unwrap();
        session
            .push_program(&ProgramDescriptor {
                name: "advanced_tunnel".to_string(),
                p4info: Vec::new(),
                device_config: Vec::new(),
            })
            .await
            .unwrap();
        let mut sessions = Sessions::new();
        sessions.insert("s1".to_string(), session);
        sessions
    }

    fn counter_id(schema: &SchemaResolver) -> CounterId {
        schema.counter_id(INGRESS).unwrap()
    }

    #[tokio::test]
    async fn test_zero_traffic_is_a_sample() {
        let schema = schema();
        let fabric = SimulatedFabric::new();
        let mut sessions = sessions(&fabric).await;
        let poller = TelemetryPoller::new(
            &schema,
            vec![CounterTarget::new("s1", INGRESS, 100)],
            Duration::from_millis(10),
        )
        .unwrap();

        let report = poller.poll_once(&mut sessions, 1).await;
        assert!(report.failures.is_empty());
        assert_eq!(report.samples.len(), 1);
        assert_eq!(report.samples[0].packet_count, 0);
        assert_eq!(report.samples[0].byte_count, 0);
        assert_eq!(report.samples[0].index, 100);
    }

    #[tokio::test]
    async fn test_index_zero_reads_all_cells() {
        let schema = schema();
        let fabric = SimulatedFabric::new();
        let mut sessions = sessions(&fabric).await;
        fabric.set_counter(S1, 0, counter_id(&schema), 101, 4, 400).await;
        fabric.set_counter(S1, 0, counter_id(&schema), 100, 2, 196).await;

        let poller = TelemetryPoller::new(
            &schema,
            vec![CounterTarget::new("s1", "ingressTunnelCounter", 0).with_label("all")],
            Duration::from_millis(10),
        )
        .unwrap();

        let report = poller.poll_once(&mut sessions, 1).await;
        let rendered: Vec<String> = report.samples.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "s1 MyIngress.ingressTunnelCounter 100: 2 packets (196 bytes)",
                "s1 MyIngress.ingressTunnelCounter 101: 4 packets (400 bytes)",
            ]
        );
        assert!(report.samples.iter().all(|s| s.label.as_deref() == Some("all")));
    }

    #[tokio::test]
    async fn test_failed_read_is_skipped() {
        let schema = schema();
        let fabric = SimulatedFabric::new();
        let mut sessions = sessions(&fabric).await;
        fabric.set_counter(S1, 0, counter_id(&schema), 100, 5, 500).await;

        let poller = TelemetryPoller::new(
            &schema,
            vec![
                CounterTarget::new("s2", INGRESS, 100),
                CounterTarget::new("s1", INGRESS, 100),
            ],
            Duration::from_millis(10),
        )
        .unwrap();

        let report = poller.poll_once(&mut sessions, 1).await;
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].switch, "s2");
        assert_eq!(report.samples.len(), 1);
        assert_eq!(report.samples[0].packet_count, 5);

        fabric.set_unreachable(S1, true).await;
        let report = poller.poll_once(&mut sessions, 2).await;
        assert_eq!(report.failures.len(), 2);
        assert!(report.samples.is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_at_tick_limit() {
        let schema = schema();
        let fabric = SimulatedFabric::new();
        let mut sessions = sessions(&fabric).await;
        let poller = TelemetryPoller::new(
            &schema,
            vec![CounterTarget::new("s1", INGRESS, 100)],
            Duration::from_millis(5),
        )
        .unwrap()
        .with_max_ticks(3);

        let mut ticks = Vec::new();
        let summary = poller
            .run(&mut sessions, &CancellationToken::new(), |r| ticks.push(r.tick))
            .await;

        assert_eq!(ticks, vec![1, 2, 3]);
        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.samples, 3);
    }

    #[tokio::test]
    async fn test_cancel_between_ticks() {
        let schema = schema();
        let fabric = SimulatedFabric::new();
        let mut sessions = sessions(&fabric).await;
        let poller = TelemetryPoller::new(
            &schema,
            vec![CounterTarget::new("s1", INGRESS, 100)],
            Duration::from_millis(5),
        )
        .unwrap();

        let cancel = CancellationToken::new();
        let summary = poller
            .run(&mut sessions, &cancel, |r| {
                if r.tick == 2 {
                    cancel.cancel();
                }
            })
            .await;

        // The tick that observed cancellation still delivered its sample.
        assert_eq!(summary.ticks, 2);
        assert_eq!(summary.samples, 2);

        let summary = poller.run(&mut sessions, &cancel, |_| {}).await;
        assert_eq!(summary.ticks, 0);
    }

    #[test]
    fn test_unknown_counter() {
        let err = TelemetryPoller::new(
            &schema(),
            vec![CounterTarget::new("s1", "MyIngress.nope", 1)],
            Duration::from_secs(2),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TelemetryError::Schema(SchemaError::UnknownSchemaObject { .. })
        ));

        assert!(matches!(
            TelemetryPoller::new(&schema(), Vec::new(), Duration::ZERO),
            Err(TelemetryError::InvalidInterval)
        ));
    }
}
