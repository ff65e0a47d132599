//! Agent configuration file.
//!
//! A single YAML document describes the switches, the intents to install,
//! the counters to poll and optional table-name overrides:
//!
//! ```yaml
//! election_id: 1
//! switches:
//!   - { name: s1, address: "127.0.0.1:50051", device_id: 0 }
//! intents:
//!   - { kind: trace, switch: s1, swid: 1 }
//! telemetry:
//!   interval_ms: 2000
//!   counters:
//!     - { switch: s1, counter: MyIngress.ingressTunnelCounter, index: 100 }
//! ```

use crate::compiler::TablePlan;
use crate::intent::Intent;
use crate::telemetry::CounterTarget;
use crate::topology::{Switch, Topology};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("duplicate switch name: {0}")]
    DuplicateSwitch(String),

    #[error("duplicate device {device_id} at {address}")]
    DuplicateDevice { address: String, device_id: u64 },
}

/// Counter polling settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Polling interval in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Counter cells read on every tick, in order
    #[serde(default)]
    pub counters: Vec<CounterTarget>,
}

/// Complete agent configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Election id used to claim mastership on every switch
    #[serde(default = "default_election_id")]
    pub election_id: u64,

    /// Log the installed entries of every switch after applying
    #[serde(default = "default_readback")]
    pub readback: bool,

    /// Delete the installed entries before releasing sessions
    #[serde(default)]
    pub withdraw_on_exit: bool,

    pub switches: Vec<Switch>,

    #[serde(default)]
    pub intents: Vec<Intent>,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Table, action and parameter name overrides
    #[serde(default)]
    pub tables: TablePlan,
}

fn default_election_id() -> u64 {
    1
}

fn default_readback() -> bool {
    true
}

fn default_interval_ms() -> u64 {
    2000
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            counters: Vec::new(),
        }
    }
}

impl AgentConfig {
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: AgentConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.election_id == 0 {
            return Err(ConfigError::Invalid("election_id must be > 0".to_string()));
        }

        if self.telemetry.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "telemetry.interval_ms must be > 0".to_string(),
            ));
        }

        if self.switches.is_empty() {
            return Err(ConfigError::Invalid("no switches configured".to_string()));
        }

        let topology = self.topology()?;
        if let Some(target) = self
            .telemetry
            .counters
            .iter()
            .find(|c| topology.get(&c.switch).is_none())
        {
            return Err(ConfigError::Invalid(format!(
                "counter {} polls unknown switch {}",
                target.counter, target.switch
            )));
        }

        Ok(())
    }

    pub fn topology(&self) -> Result<Topology, ConfigError> {
        Topology::new(self.switches.clone())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry.interval_ms)
    }
}
