use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by a [`Storage`](crate::storage::Storage) backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to access store at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store at {path} is not a valid document")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode store document")]
    Encode(#[source] serde_json::Error),

    #[error("storage backend failed: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("stored value for `{key}` could not be decoded")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("`{key}` is still loading")]
    NotHydrated { key: String },

    #[error("unknown action type `{0}`")]
    UnknownAction(String),

    #[error("unknown control `{0}`")]
    UnknownControl(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
