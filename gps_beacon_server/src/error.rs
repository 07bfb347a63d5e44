// Error type for the beacon server.
//
// Only `Bind` and `Config` are fatal, and only at startup. Everything else is
// recovered where it happens: a session that hits `Io` or `Json` ends itself
// and logs the reason, and source failures never get this far (see
// `source::SourceError`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BeaconError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("signal handler error: {0}")]
    Signal(String),
}

impl From<toml::de::Error> for BeaconError {
    fn from(e: toml::de::Error) -> Self {
        BeaconError::Config(e.to_string())
    }
}

impl From<ctrlc::Error> for BeaconError {
    fn from(e: ctrlc::Error) -> Self {
        BeaconError::Signal(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BeaconError>;
