//! Error types for the integrity monitor core.
//!
//! Only conditions that make further tracking unsafe surface as errors.
//! Vanished files and corrupt durable state are recovered from locally and
//! reported through `tracing` instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FimError {
    #[error("cannot persist {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("cannot determine data directory")]
    DataDir,
}

impl FimError {
    pub(crate) fn persist(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FimError::Persist {
            path: path.into(),
            source,
        }
    }

    /// Persistence failures end the monitoring session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FimError::Persist { .. } | FimError::Serialize(_))
    }
}

pub type Result<T> = std::result::Result<T, FimError>;
