// Beacon configuration.
//
// Every field has a default, so the server runs with no configuration at all.
// An optional TOML file (`--config <path>`) overrides the defaults, and
// command-line flags in `main.rs` override the file. Example:
//
//   port = 8085
//   source = "live"
//   cadence_ms = 2000
//   framing = "newline-delimited"
//
//   [live]
//   command = "termux-location"
//   args = ["-p", "gps"]
//   timeout_ms = 20000
//
//   [simulated]
//   latitude = [63.3, 63.5]
//   seed = 7

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use gps_beacon_protocol::Framing;
use serde::Deserialize;

use crate::error::{BeaconError, Result};

/// Which location source feeds the broadcast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// External location command on the device.
    Live,
    /// Random coordinates, for development without hardware.
    #[default]
    Simulated,
}

impl SourceKind {
    /// Send interval used when `cadence_ms` isn't configured.
    pub fn default_cadence(self) -> Duration {
        match self {
            SourceKind::Live => Duration::from_secs(5),
            SourceKind::Simulated => Duration::from_secs(10),
        }
    }
}

impl FromStr for SourceKind {
    type Err = BeaconError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(SourceKind::Live),
            "simulated" | "sim" => Ok(SourceKind::Simulated),
            other => Err(BeaconError::Config(format!(
                "unknown source '{other}' (expected 'live' or 'simulated')"
            ))),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Live => f.write_str("live"),
            SourceKind::Simulated => f.write_str("simulated"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BeaconConfig {
    /// Interface to listen on; `0.0.0.0` accepts clients on every interface.
    pub bind_address: String,
    /// Both source variants share this port by default, so running a live and
    /// a simulated beacon on one host needs an explicit override.
    pub port: u16,
    pub source: SourceKind,
    /// Delay between sends to one client. Defaults per source kind.
    pub cadence_ms: Option<u64>,
    pub framing: Framing,
    /// Log every outgoing packet at debug level.
    pub log_packets: bool,
    pub live: LiveSourceConfig,
    pub simulated: SimulatedSourceConfig,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            port: 8085,
            source: SourceKind::default(),
            cadence_ms: None,
            framing: Framing::default(),
            log_packets: false,
            live: LiveSourceConfig::default(),
            simulated: SimulatedSourceConfig::default(),
        }
    }
}

impl BeaconConfig {
    /// Load a TOML file. Missing keys keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            BeaconError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Effective send interval for each session.
    pub fn cadence(&self) -> Duration {
        self.cadence_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.source.default_cadence())
    }

    /// `host:port` string for binding.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Settings for the external location command.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LiveSourceConfig {
    pub command: String,
    pub args: Vec<String>,
    /// The command is killed if it hasn't exited after this long.
    pub timeout_ms: u64,
}

impl Default for LiveSourceConfig {
    fn default() -> Self {
        Self {
            command: "termux-location".into(),
            args: Vec::new(),
            timeout_ms: 30_000,
        }
    }
}

/// Inclusive `[min, max]` ranges for generated coordinates.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulatedSourceConfig {
    pub latitude: [f64; 2],
    pub longitude: [f64; 2],
    pub altitude: [f64; 2],
    /// Fixed seed for reproducible output; random if absent.
    pub seed: Option<u64>,
}

impl Default for SimulatedSourceConfig {
    fn default() -> Self {
        Self {
            latitude: [63.3, 63.5],
            longitude: [10.3, 10.7],
            altitude: [0.0, 100.0],
            seed: None,
        }
    }
}
