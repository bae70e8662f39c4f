//! History engine configuration.
//!
//! Loaded from RON. Every field has a default, so an empty file (`()`) is a
//! valid config.
//!
//! ```ron
//! (
//!     payload_dir: Some("/var/tmp/pigment"),
//!     keep_payloads: false,
//!     worker_thread_prefix: "pigment-fn",
//! )
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default name prefix for history function worker threads.
pub const DEFAULT_WORKER_THREAD_PREFIX: &str = "pigment-history";

/// Settings shared by every history in a [`HistoryContext`](crate::HistoryContext).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Where flushed payloads are written. Each context gets its own session
    /// directory underneath. `None` uses a directory under the system temp dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_dir: Option<PathBuf>,

    /// Leave the session directory on disk when the context is dropped.
    pub keep_payloads: bool,

    /// Worker threads are named `<prefix>-<execution short id>`.
    pub worker_thread_prefix: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            payload_dir: None,
            keep_payloads: false,
            worker_thread_prefix: DEFAULT_WORKER_THREAD_PREFIX.to_string(),
        }
    }
}

impl HistoryConfig {
    pub fn with_payload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.payload_dir = Some(dir.into());
        self
    }

    pub fn with_keep_payloads(mut self, keep: bool) -> Self {
        self.keep_payloads = keep;
        self
    }

    pub fn with_worker_thread_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.worker_thread_prefix = prefix.into();
        self
    }

    /// Parse a config from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    /// Read and parse a RON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_ron_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded history config");
        Ok(config)
    }
}
