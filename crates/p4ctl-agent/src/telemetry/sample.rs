//! Counter targets, samples and per-tick reports.

use p4ctl_southbound::DriverError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A counter cell to sample on every tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterTarget {
    pub switch: String,

    /// Counter name or alias (e.g., `MyIngress.ingressTunnelCounter`).
    pub counter: String,

    /// Cell index. `0` reads every cell of the counter.
    #[serde(default)]
    pub index: u64,

    /// Heading printed above this target's samples.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl CounterTarget {
    pub fn new(switch: impl Into<String>, counter: impl Into<String>, index: u64) -> Self {
        Self {
            switch: switch.into(),
            counter: counter.into(),
            index,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// One counter reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSample {
    pub switch: String,
    pub counter: String,
    pub index: u64,
    pub packet_count: u64,
    pub byte_count: u64,
    pub label: Option<String>,
}

impl fmt::Display for CounterSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}: {} packets ({} bytes)",
            self.switch, self.counter, self.index, self.packet_count, self.byte_count
        )
    }
}

/// A counter read that failed this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterFailure {
    pub switch: String,
    pub counter: String,
    pub index: u64,
    pub error: DriverError,
}

impl fmt::Display for CounterFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}: read failed ({})",
            self.switch, self.counter, self.index, self.error
        )
    }
}

/// Everything read during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub samples: Vec<CounterSample>,
    pub failures: Vec<CounterFailure>,
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "----- Reading counters -----")?;
        let mut label: Option<&str> = None;
        for sample in &self.samples {
            if let Some(current) = sample.label.as_deref() {
                if label != Some(current) {
                    write!(f, "\n----- {} -----", current)?;
                    label = Some(current);
                }
            }
            write!(f, "\n{}", sample)?;
        }
        for failure in &self.failures {
            write!(f, "\n{}", failure)?;
        }
        Ok(())
    }
}

/// Totals over a telemetry run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetrySummary {
    pub ticks: u64,
    pub samples: usize,
    pub failures: usize,
}

impl TelemetrySummary {
    pub fn record(&mut self, report: &TickReport) {
        self.ticks += 1;
        self.samples += report.samples.len();
        self.failures += report.failures.len();
    }
}
