// Location sources.
//
// A `LocationSource` produces one `LocationReading` per call. Sessions share a
// single source behind `Arc<dyn LocationSource>` and poll it from their own
// threads, so implementations must be `Send + Sync`.
//
// Contract: `poll` never panics and never blocks past the source's timeout.
// Internal failures are logged and reported as `LocationReading::invalid()`,
// so a flaky sensor degrades the broadcast instead of ending it.
//
// Two variants:
// - `live.rs`:      runs an external location command and parses its JSON.
// - `simulated.rs`: random coordinates in configured ranges, for running
//                   without hardware.

mod live;
mod simulated;

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use gps_beacon_protocol::LocationReading;
use thiserror::Error;

pub use live::LiveSource;
pub use simulated::SimulatedSource;

use crate::config::{BeaconConfig, SourceKind};
use crate::error::Result;

pub trait LocationSource: Send + Sync {
    /// Take one reading. Failures come back as `valid: false`.
    fn poll(&self) -> LocationReading;

    /// One-time warm-up before the server starts accepting clients.
    fn prepare(&self) {}

    /// Short human-readable description for startup output.
    fn describe(&self) -> String;
}

/// Why a live reading could not be taken.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("could not run location command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("location command timed out after {0:?}")]
    Timeout(Duration),

    #[error("location command exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("unreadable location output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Build the source selected by the configuration.
pub fn build_source(config: &BeaconConfig) -> Result<Arc<dyn LocationSource>> {
    let source: Arc<dyn LocationSource> = match config.source {
        SourceKind::Live => Arc::new(LiveSource::new(&config.live)),
        SourceKind::Simulated => Arc::new(SimulatedSource::new(&config.simulated)?),
    };
    Ok(source)
}
