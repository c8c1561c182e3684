use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("native host channel is not connected")]
    ChannelUnavailable,

    #[error("failed to launch native host {program:?}")]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("native host manifest for {0} not found")]
    ManifestNotFound(String),

    #[error("failed to read native host manifest {path}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("received empty frame (length = 0)")]
    EmptyFrame,

    #[error("frame too large: {len} bytes (limit {limit} bytes)")]
    FrameTooLarge { len: usize, limit: usize },

    #[error("native messaging I/O error")]
    Io(#[from] std::io::Error),

    #[error("invalid native message JSON")]
    Json(#[from] serde_json::Error),

    #[error("invalid bridge config: {reason}")]
    InvalidConfig { reason: String },

    #[error("bridge service has stopped")]
    ServiceStopped,
}

pub type BridgeResult<T> = Result<T, BridgeError>;
