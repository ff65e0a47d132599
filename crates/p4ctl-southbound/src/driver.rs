//! Session traits between the agent and a switch.
//!
//! A [`SouthboundConnector`] opens one [`SouthboundSession`] per switch. A
//! session is owned by exactly one task at a time; the agent never shares a
//! session between tasks, so implementations need `Send` but not `Sync`.

use crate::entry::{CounterCell, DeviceEntry, ProgramDescriptor};
use crate::error::DriverResult;
use crate::types::CounterId;
use async_trait::async_trait;
use std::pin::Pin;
use tokio_stream::Stream;

/// Lazy, finite sequence of installed entries.
pub type EntryStream = Pin<Box<dyn Stream<Item = DriverResult<DeviceEntry>> + Send>>;

/// Per-switch control session.
#[async_trait]
pub trait SouthboundSession: Send {
    /// Logical switch name this session was opened for.
    fn name(&self) -> &str;

    fn device_id(&self) -> u64;

    /// Claims sole-writer status for the device.
    async fn assert_mastership(&mut self, election_id: u64) -> DriverResult<()>;

    /// Installs the data-plane program.
    async fn push_program(&mut self, program: &ProgramDescriptor) -> DriverResult<()>;

    /// Inserts an entry, or sets the default action when
    /// `entry.is_default_action` is set.
    async fn write_table_entry(&mut self, entry: &DeviceEntry) -> DriverResult<()>;

    async fn delete_table_entry(&mut self, entry: &DeviceEntry) -> DriverResult<()>;

    /// Streams every installed entry across all tables.
    async fn read_table_entries(&mut self) -> DriverResult<EntryStream>;

    /// Reads one counter index, or every index when `index` is 0.
    async fn read_counter(
        &mut self,
        counter_id: CounterId,
        index: u64,
    ) -> DriverResult<Vec<CounterCell>>;

    /// Releases the session. Further calls fail with `Unreachable`.
    async fn shutdown(&mut self) -> DriverResult<()>;
}

/// Opens sessions to switches.
#[async_trait]
pub trait SouthboundConnector: Send + Sync {
    async fn establish_session(
        &self,
        name: &str,
        address: &str,
        device_id: u64,
    ) -> DriverResult<Box<dyn SouthboundSession>>;
}
