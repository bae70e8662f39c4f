//! Error types for payload storage.

use std::path::PathBuf;

use pigment_types::PayloadKey;
use thiserror::Error;

/// Errors that can occur while persisting or re-hydrating a payload.
#[derive(Error, Debug)]
pub enum CasError {
    /// Filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The value could not be serialized.
    #[error("failed to encode payload: {0}")]
    Encode(#[source] postcard::Error),

    /// The stored bytes could not be deserialized back into the value.
    #[error("failed to decode payload {key:?}: {source}")]
    Decode {
        key: PayloadKey,
        #[source]
        source: postcard::Error,
    },

    /// The stored bytes no longer match the digest recorded when they were written.
    #[error("payload {key:?} is corrupt: expected digest {expected}, found {actual}")]
    Corrupt {
        key: PayloadKey,
        expected: String,
        actual: String,
    },

    /// The payload file is gone.
    #[error("payload {0:?} is missing from the store")]
    Missing(PayloadKey),
}

impl CasError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
