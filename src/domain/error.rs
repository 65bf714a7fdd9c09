// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Every error is fatal for the run. Callers propagate these
// through anyhow so the process exits with the full chain.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrainingError {
    /// A snapshot or saved stage does not fit the current ensemble.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("i/o failure at '{}': {source}", path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The accelerator could not be initialised.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TrainingError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TrainingError::Io { path: path.into(), source }
    }
}
