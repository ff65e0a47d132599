//! Static switch topology.

use crate::config::ConfigError;
use p4ctl_types::PortNumber;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A managed switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Switch {
    /// Logical name, unique within the topology.
    pub name: String,

    /// Southbound address (e.g., `127.0.0.1:50051`).
    pub address: String,

    /// Device id, unique per address.
    #[serde(default)]
    pub device_id: u64,

    /// Physical ports. Empty means ports are not checked.
    #[serde(default)]
    pub ports: Vec<PortNumber>,

    /// Port the egress end of a tunnel delivers to.
    #[serde(default = "default_host_port")]
    pub host_port: PortNumber,
}

fn default_host_port() -> PortNumber {
    1
}

impl Switch {
    pub fn new(name: impl Into<String>, address: impl Into<String>, device_id: u64) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            device_id,
            ports: Vec::new(),
            host_port: default_host_port(),
        }
    }

    pub fn with_ports(mut self, ports: impl IntoIterator<Item = PortNumber>) -> Self {
        self.ports = ports.into_iter().collect();
        self
    }

    pub fn with_host_port(mut self, port: PortNumber) -> Self {
        self.host_port = port;
        self
    }

    pub fn has_port(&self, port: PortNumber) -> bool {
        self.ports.is_empty() || self.ports.contains(&port)
    }
}

/// The set of switches a run manages, in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    switches: Vec<Switch>,
    by_name: BTreeMap<String, usize>,
}

impl Topology {
    pub fn new(switches: Vec<Switch>) -> Result<Self, ConfigError> {
        let mut by_name = BTreeMap::new();
        let mut devices = BTreeSet::new();

        for (i, sw) in switches.iter().enumerate() {
            if sw.name.is_empty() {
                return Err(ConfigError::Invalid("switch name must not be empty".to_string()));
            }
            if by_name.insert(sw.name.clone(), i).is_some() {
                return Err(ConfigError::DuplicateSwitch(sw.name.clone()));
            }
            if !devices.insert((sw.address.as_str(), sw.device_id)) {
                return Err(ConfigError::DuplicateDevice {
                    address: sw.address.clone(),
                    device_id: sw.device_id,
                });
            }
        }

        Ok(Self { switches, by_name })
    }

    pub fn get(&self, name: &str) -> Option<&Switch> {
        self.by_name.get(name).map(|&i| &self.switches[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Switch> {
        self.switches.iter()
    }

    pub fn len(&self) -> usize {
        self.switches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }
}
