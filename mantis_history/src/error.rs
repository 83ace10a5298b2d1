use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history storage unavailable while {operation} at {path}: {source}")]
    StorageUnavailable {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("history file {path} is corrupt: {source}")]
    StorageCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize conversation history: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl HistoryError {
    #[must_use]
    pub fn unavailable(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::StorageUnavailable {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn corrupt(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::StorageCorrupt {
            path: path.into(),
            source,
        }
    }
}
