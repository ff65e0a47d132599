//! Southbound interface between the p4ctl agent and programmable switches.
//!
//! The agent talks to each switch through a [`SouthboundSession`] obtained
//! from a [`SouthboundConnector`]. Everything that crosses this boundary is
//! already resolved to numeric P4 ids and encoded to bytes, so sessions never
//! deal with names.
//!
//! # Architecture
//!
//! - [`types`]: type-safe P4 object ids
//! - [`error`]: driver errors and RPC status mapping
//! - [`entry`]: device-level table entries and counter cells
//! - [`driver`]: the session and connector traits
//! - [`sim`]: in-process simulated switches implementing the traits
//!
//! # Example
//!
//! ```ignore
//! use p4ctl_southbound::{DeviceEntry, DriverResult, SouthboundSession};
//!
//! async fn install(session: &mut dyn SouthboundSession, entry: &DeviceEntry) -> DriverResult<()> {
//!     session.assert_mastership(1).await?;
//!     session.write_table_entry(entry).await
//! }
//! ```

pub mod driver;
pub mod entry;
pub mod error;
pub mod sim;
pub mod types;

pub use driver::{EntryStream, SouthboundConnector, SouthboundSession};
pub use entry::{
    ActionCall, CounterCell, DeviceEntry, EntryKey, FieldMatch, MatchValue, ParamValue,
    ProgramDescriptor,
};
pub use error::{DriverError, DriverErrorKind, DriverResult, RpcCode};
pub use sim::{SimulatedFabric, SimulatedSession};
pub use types::{
    ActionId, ActionKind, ActionParamKind, CounterId, CounterKind, FieldId, MatchFieldKind,
    P4Id, P4ObjectKind, ParamId, RawP4Id, TableId, TableKind,
};
