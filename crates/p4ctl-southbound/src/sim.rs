//! In-process simulated switches.
//!
//! [`SimulatedFabric`] holds any number of devices keyed by
//! `(address, device_id)` and hands out [`SimulatedSession`]s to them. It
//! behaves like a software switch with a P4Runtime server in the ways the
//! agent depends on:
//!
//! - the highest election id holds mastership; writes from any other session
//!   fail with `Unauthorized`
//! - entries cannot be written before a program has been pushed
//! - inserting an identical entry fails with `AlreadyExists`; the same match
//!   key with a different action fails with `Conflict`
//! - default-action writes overwrite the previous default
//! - counter cells that were never set read as zero
//!
//! Faults can be injected per address for tests: an unreachable address
//! fails every call, and `fail_writes_after` makes writes fail once a number
//! of writes have succeeded.

use crate::driver::{EntryStream, SouthboundConnector, SouthboundSession};
use crate::entry::{CounterCell, DeviceEntry, EntryKey, ProgramDescriptor};
use crate::error::{DriverError, DriverErrorKind, DriverResult};
use crate::types::CounterId;
use async_trait::async_trait;
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;

type DeviceKey = (String, u64);

#[derive(Debug, Default)]
struct DeviceState {
    /// (session id, election id) of the current master.
    master: Option<(u64, u64)>,
    program: Option<ProgramDescriptor>,
    entries: BTreeMap<EntryKey, DeviceEntry>,
    counters: BTreeMap<(CounterId, u64), (u64, u64)>,
    writes: usize,
    fail_writes_after: Option<(usize, DriverErrorKind)>,
}

#[derive(Debug, Default)]
struct FabricState {
    devices: BTreeMap<DeviceKey, DeviceState>,
    unreachable: BTreeSet<String>,
    next_session: u64,
}

/// A set of simulated switches shared by every session opened on it.
#[derive(Debug, Clone, Default)]
pub struct SimulatedFabric {
    state: Arc<Mutex<FabricState>>,
}

impl SimulatedFabric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call to `address` fail with `Unreachable`, including calls
    /// on sessions that are already open.
    pub async fn set_unreachable(&self, address: &str, unreachable: bool) {
        let mut state = self.state.lock().await;
        if unreachable {
            state.unreachable.insert(address.to_string());
        } else {
            state.unreachable.remove(address);
        }
    }

    /// After `count` more successful writes, every write to the device fails
    /// with `kind`.
    pub async fn fail_writes_after(
        &self,
        address: &str,
        device_id: u64,
        count: usize,
        kind: DriverErrorKind,
    ) {
        let mut state = self.state.lock().await;
        let device = state
            .devices
            .entry((address.to_string(), device_id))
            .or_default();
        device.fail_writes_after = Some((device.writes + count, kind));
    }

    pub async fn set_counter(
        &self,
        address: &str,
        device_id: u64,
        counter_id: CounterId,
        index: u64,
        packet_count: u64,
        byte_count: u64,
    ) {
        let mut state = self.state.lock().await;
        state
            .devices
            .entry((address.to_string(), device_id))
            .or_default()
            .counters
            .insert((counter_id, index), (packet_count, byte_count));
    }

    /// Returns every installed entry, default actions included.
    pub async fn installed_entries(&self, address: &str, device_id: u64) -> Vec<DeviceEntry> {
        let state = self.state.lock().await;
        state
            .devices
            .get(&(address.to_string(), device_id))
            .map(|d| d.entries.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the election id of the current master, if any.
    pub async fn master_election_id(&self, address: &str, device_id: u64) -> Option<u64> {
        let state = self.state.lock().await;
        state
            .devices
            .get(&(address.to_string(), device_id))
            .and_then(|d| d.master)
            .map(|(_, election_id)| election_id)
    }

    /// Returns the name of the installed program, if any.
    pub async fn program_name(&self, address: &str, device_id: u64) -> Option<String> {
        let state = self.state.lock().await;
        state
            .devices
            .get(&(address.to_string(), device_id))
            .and_then(|d| d.program.as_ref())
            .map(|p| p.name.clone())
    }
}

#[async_trait]
impl SouthboundConnector for SimulatedFabric {
    async fn establish_session(
        &self,
        name: &str,
        address: &str,
        device_id: u64,
    ) -> DriverResult<Box<dyn SouthboundSession>> {
        let mut state = self.state.lock().await;
        if state.unreachable.contains(address) {
            return Err(DriverError::unreachable(format!(
                "cannot connect to {} at {}",
                name, address
            )));
        }

        state.next_session += 1;
        let session_id = state.next_session;
        state
            .devices
            .entry((address.to_string(), device_id))
            .or_default();

        info!(
            "Opened simulated session {} to {} ({} device {})",
            session_id, name, address, device_id
        );

        Ok(Box::new(SimulatedSession {
            name: name.to_string(),
            address: address.to_string(),
            device_id,
            session_id,
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

/// A session to one simulated device.
#[derive(Debug)]
pub struct SimulatedSession {
    name: String,
    address: String,
    device_id: u64,
    session_id: u64,
    state: Arc<Mutex<FabricState>>,
    closed: bool,
}

impl SimulatedSession {
    fn key(&self) -> DeviceKey {
        (self.address.clone(), self.device_id)
    }

    fn check_reachable(&self, state: &FabricState) -> DriverResult<()> {
        if self.closed {
            return Err(DriverError::unreachable(format!(
                "session to {} is closed",
                self.name
            )));
        }
        if state.unreachable.contains(&self.address) {
            return Err(DriverError::unreachable(format!(
                "lost connection to {} at {}",
                self.name, self.address
            )));
        }
        Ok(())
    }

    fn check_master(&self, device: &DeviceState) -> DriverResult<()> {
        match device.master {
            Some((session_id, _)) if session_id == self.session_id => Ok(()),
            _ => Err(DriverError::unauthorized(format!(
                "session to {} is not master",
                self.name
            ))),
        }
    }
}

#[async_trait]
impl SouthboundSession for SimulatedSession {
    fn name(&self) -> &str {
        &self.name
    }

    fn device_id(&self) -> u64 {
        self.device_id
    }

    async fn assert_mastership(&mut self, election_id: u64) -> DriverResult<()> {
        let mut state = self.state.lock().await;
        self.check_reachable(&state)?;
        let device = state.devices.entry(self.key()).or_default();

        match device.master {
            Some((session_id, current))
                if session_id != self.session_id && current >= election_id =>
            {
                Err(DriverError::unauthorized(format!(
                    "election id {} does not exceed current master's {}",
                    election_id, current
                )))
            }
            _ => {
                device.master = Some((self.session_id, election_id));
                debug!("{} is master with election id {}", self.name, election_id);
                Ok(())
            }
        }
    }

    async fn push_program(&mut self, program: &ProgramDescriptor) -> DriverResult<()> {
        let mut state = self.state.lock().await;
        self.check_reachable(&state)?;
        let device = state.devices.entry(self.key()).or_default();
        self.check_master(device)?;

        if device.program.as_ref() == Some(program) {
            debug!("{} already runs program {}", self.name, program.name);
            return Ok(());
        }

        // A new pipeline starts with empty tables.
        device.entries.clear();
        device.program = Some(program.clone());
        info!("Installed program {} on {}", program.name, self.name);
        Ok(())
    }

    async fn write_table_entry(&mut self, entry: &DeviceEntry) -> DriverResult<()> {
        let mut state = self.state.lock().await;
        self.check_reachable(&state)?;
        let device = state.devices.entry(self.key()).or_default();
        self.check_master(device)?;

        if device.program.is_none() {
            return Err(DriverError::rejected(format!(
                "{} has no forwarding pipeline",
                self.name
            )));
        }
        if let Some((limit, kind)) = device.fail_writes_after {
            if device.writes >= limit {
                return Err(DriverError::new(
                    kind,
                    format!("injected write failure on {}", self.name),
                ));
            }
        }

        let key = entry.key();
        if !entry.is_default_action {
            if let Some(existing) = device.entries.get(&key) {
                return if existing.action == entry.action && existing.priority == entry.priority {
                    Err(DriverError::already_exists(format!("{}", entry)))
                } else {
                    Err(DriverError::conflict(format!(
                        "{} clashes with installed {}",
                        entry, existing
                    )))
                };
            }
        }

        device.entries.insert(key, entry.clone());
        device.writes += 1;
        debug!("{}: wrote {}", self.name, entry);
        Ok(())
    }

    async fn delete_table_entry(&mut self, entry: &DeviceEntry) -> DriverResult<()> {
        let mut state = self.state.lock().await;
        self.check_reachable(&state)?;
        let device = state.devices.entry(self.key()).or_default();
        self.check_master(device)?;

        match device.entries.remove(&entry.key()) {
            Some(_) => {
                debug!("{}: deleted {}", self.name, entry);
                Ok(())
            }
            None => Err(DriverError::not_found(format!("{}", entry))),
        }
    }

    async fn read_table_entries(&mut self) -> DriverResult<EntryStream> {
        let state = self.state.lock().await;
        self.check_reachable(&state)?;
        let entries: Vec<DriverResult<DeviceEntry>> = state
            .devices
            .get(&self.key())
            .map(|d| d.entries.values().cloned().map(Ok).collect())
            .unwrap_or_default();
        Ok(Box::pin(tokio_stream::iter(entries)))
    }

    async fn read_counter(
        &mut self,
        counter_id: CounterId,
        index: u64,
    ) -> DriverResult<Vec<CounterCell>> {
        let state = self.state.lock().await;
        self.check_reachable(&state)?;
        let counters = state.devices.get(&self.key()).map(|d| &d.counters);

        let cell = |index: u64, (packet_count, byte_count): (u64, u64)| CounterCell {
            counter_id,
            index,
            packet_count,
            byte_count,
        };

        if index == 0 {
            return Ok(counters
                .into_iter()
                .flat_map(|c| c.range((counter_id, 0)..=(counter_id, u64::MAX)))
                .map(|((_, i), v)| cell(*i, *v))
                .collect());
        }

        let value = counters
            .and_then(|c| c.get(&(counter_id, index)))
            .copied()
            .unwrap_or((0, 0));
        Ok(vec![cell(index, value)])
    }

    async fn shutdown(&mut self) -> DriverResult<()> {
        if self.closed {
            return Ok(());
        }
        let mut state = self.state.lock().await;
        if let Some(device) = state.devices.get_mut(&self.key()) {
            if matches!(device.master, Some((session_id, _)) if session_id == self.session_id) {
                device.master = None;
            }
        }
        self.closed = true;
        info!("Closed simulated session to {}", self.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{ActionCall, FieldMatch, ParamValue};
    use crate::types::{ActionId, FieldId, ParamId, TableId};
    use pretty_assertions::assert_eq;
    use tokio_stream::StreamExt;

    const ADDR: &str = "127.0.0.1:50051";

    fn program() -> ProgramDescriptor {
        ProgramDescriptor {
            name: "basic_tunnel".to_string(),
            p4info: b"p4info".to_vec(),
            device_config: b"{}".to_vec(),
        }
    }

    fn entry(key: u8, port: u8) -> DeviceEntry {
        DeviceEntry {
            table_id: TableId::from_raw(1).unwrap(),
            matches: vec![FieldMatch::exact(FieldId::from_raw(1).unwrap(), vec![key])],
            action: ActionCall {
                action_id: ActionId::from_raw(2).unwrap(),
                params: vec![ParamValue {
                    param_id: ParamId::from_raw(1).unwrap(),
                    value: vec![0, port],
                }],
            },
            priority: None,
            is_default_action: false,
        }
    }

    async fn ready_session(fabric: &SimulatedFabric) -> Box<dyn SouthboundSession> {
        let mut session = fabric.establish_session("s1", ADDR, 0).await.unwrap();
        session.assert_mastership(1).await.unwrap();
        session.push_program(&program()).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_write_requires_mastership() {
        let fabric = SimulatedFabric::new();
        let mut session = fabric.establish_session("s1", ADDR, 0).await.unwrap();
        let err = session.write_table_entry(&entry(1, 2)).await.unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_higher_election_id_takes_over() {
        let fabric = SimulatedFabric::new();
        let mut first = fabric.establish_session("s1", ADDR, 0).await.unwrap();
        let mut second = fabric.establish_session("s1", ADDR, 0).await.unwrap();

        first.assert_mastership(5).await.unwrap();
        assert_eq!(
            second.assert_mastership(5).await.unwrap_err().kind,
            DriverErrorKind::Unauthorized
        );
        second.assert_mastership(6).await.unwrap();
        assert_eq!(fabric.master_election_id(ADDR, 0).await, Some(6));

        let err = first.push_program(&program()).await.unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_write_requires_program() {
        let fabric = SimulatedFabric::new();
        let mut session = fabric.establish_session("s1", ADDR, 0).await.unwrap();
        session.assert_mastership(1).await.unwrap();
        let err = session.write_table_entry(&entry(1, 2)).await.unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::Rejected);
    }

    #[tokio::test]
    async fn test_duplicate_and_conflict() {
        let fabric = SimulatedFabric::new();
        let mut session = ready_session(&fabric).await;

        session.write_table_entry(&entry(1, 2)).await.unwrap();
        assert_eq!(
            session.write_table_entry(&entry(1, 2)).await.unwrap_err().kind,
            DriverErrorKind::AlreadyExists
        );
        assert_eq!(
            session.write_table_entry(&entry(1, 3)).await.unwrap_err().kind,
            DriverErrorKind::Conflict
        );
        assert_eq!(fabric.installed_entries(ADDR, 0).await, vec![entry(1, 2)]);
    }

    #[tokio::test]
    async fn test_default_action_overwrites() {
        let fabric = SimulatedFabric::new();
        let mut session = ready_session(&fabric).await;

        let mut first = entry(0, 1);
        first.matches.clear();
        first.is_default_action = true;
        let mut second = first.clone();
        second.action.params[0].value = vec![0, 9];

        session.write_table_entry(&first).await.unwrap();
        session.write_table_entry(&second).await.unwrap();
        assert_eq!(fabric.installed_entries(ADDR, 0).await, vec![second]);
    }

    #[tokio::test]
    async fn test_delete_and_read_back() {
        let fabric = SimulatedFabric::new();
        let mut session = ready_session(&fabric).await;

        session.write_table_entry(&entry(1, 2)).await.unwrap();
        session.write_table_entry(&entry(2, 3)).await.unwrap();
        session.delete_table_entry(&entry(1, 2)).await.unwrap();
        assert_eq!(
            session.delete_table_entry(&entry(1, 2)).await.unwrap_err().kind,
            DriverErrorKind::NotFound
        );

        let stream = session.read_table_entries().await.unwrap();
        let read: Vec<DeviceEntry> = stream.map(|e| e.unwrap()).collect().await;
        assert_eq!(read, vec![entry(2, 3)]);
    }

    #[tokio::test]
    async fn test_same_program_keeps_entries() {
        let fabric = SimulatedFabric::new();
        let mut session = ready_session(&fabric).await;
        session.write_table_entry(&entry(1, 2)).await.unwrap();

        session.push_program(&program()).await.unwrap();
        assert_eq!(fabric.installed_entries(ADDR, 0).await.len(), 1);

        let mut other = program();
        other.name = "load_balance".to_string();
        session.push_program(&other).await.unwrap();
        assert!(fabric.installed_entries(ADDR, 0).await.is_empty());
        assert_eq!(
            fabric.program_name(ADDR, 0).await.as_deref(),
            Some("load_balance")
        );
    }

    #[tokio::test]
    async fn test_counters() {
        let fabric = SimulatedFabric::new();
        let mut session = ready_session(&fabric).await;
        let counter = CounterId::from_raw(7).unwrap();
        let other = CounterId::from_raw(8).unwrap();

        fabric.set_counter(ADDR, 0, counter, 200, 3, 300).await;
        fabric.set_counter(ADDR, 0, counter, 100, 5, 500).await;
        fabric.set_counter(ADDR, 0, other, 100, 1, 1).await;

        let all = session.read_counter(counter, 0).await.unwrap();
        assert_eq!(
            all.iter().map(|c| (c.index, c.packet_count)).collect::<Vec<_>>(),
            vec![(100, 5), (200, 3)]
        );

        let idle = session.read_counter(counter, 42).await.unwrap();
        assert_eq!(idle.len(), 1);
        assert_eq!((idle[0].packet_count, idle[0].byte_count), (0, 0));

        let unknown = CounterId::from_raw(9).unwrap();
        assert!(session.read_counter(unknown, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable() {
        let fabric = SimulatedFabric::new();
        let mut session = ready_session(&fabric).await;

        fabric.set_unreachable(ADDR, true).await;
        assert_eq!(
            session.write_table_entry(&entry(1, 2)).await.unwrap_err().kind,
            DriverErrorKind::Unreachable
        );
        assert!(fabric.establish_session("s1", ADDR, 0).await.is_err());

        fabric.set_unreachable(ADDR, false).await;
        session.write_table_entry(&entry(1, 2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_fail_writes_after() {
        let fabric = SimulatedFabric::new();
        let mut session = ready_session(&fabric).await;
        fabric
            .fail_writes_after(ADDR, 0, 1, DriverErrorKind::Unreachable)
            .await;

        session.write_table_entry(&entry(1, 2)).await.unwrap();
        assert_eq!(
            session.write_table_entry(&entry(2, 2)).await.unwrap_err().kind,
            DriverErrorKind::Unreachable
        );
    }

    #[tokio::test]
    async fn test_shutdown_releases_mastership() {
        let fabric = SimulatedFabric::new();
        let mut session = ready_session(&fabric).await;
        session.shutdown().await.unwrap();

        assert_eq!(fabric.master_election_id(ADDR, 0).await, None);
        assert_eq!(
            session.read_counter(CounterId::from_raw(1).unwrap(), 0).await.unwrap_err().kind,
            DriverErrorKind::Unreachable
        );
        session.shutdown().await.unwrap();
    }
}
