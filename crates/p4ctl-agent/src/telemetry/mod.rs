//! Counter telemetry.
//!
//! A [`TelemetryPoller`] reads a fixed set of counter cells on every tick and
//! produces a [`TickReport`]. Read failures never stop the loop; only
//! cancellation or the tick limit does.

mod poller;
mod sample;

use crate::schema::SchemaError;

pub use poller::TelemetryPoller;
pub use sample::{CounterFailure, CounterSample, CounterTarget, TelemetrySummary, TickReport};

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("polling interval must be greater than zero")]
    InvalidInterval,
}
