//! Directory-backed payload store.
//!
//! Payloads are opaque byte blobs addressed by [`PayloadKey`]. Each blob is
//! written once, verified against its BLAKE3 digest on every read, and removed
//! when its owner lets go of it.
//!
//! ```text
//! root/
//!   3f/
//!     0190c7e2a1b47c2d8e5f6a7b8c9d0e3f.bin
//!   a1/
//!     0190c7e2a1b47c2d8e5f6a7b8c9d0ea1.bin
//! ```
//!
//! Files are sharded by the last two hex characters of the key (the random
//! tail of a UUIDv7), so shards fill evenly.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use pigment_types::PayloadKey;
use tempfile::TempDir;

use crate::{CasError, Result};

/// A directory of persisted payloads.
pub struct PayloadStore {
    root: PathBuf,
    /// Remove `root` entirely when the store is dropped.
    remove_on_drop: bool,
    /// Set for stores created by [`PayloadStore::temporary`]; removes the
    /// directory when dropped.
    scratch: Option<TempDir>,
    /// Keys written through this store and not yet removed.
    live: Mutex<HashSet<PayloadKey>>,
}

impl PayloadStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// The directory is left in place when the store is dropped.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| CasError::io(&root, e))?;
        tracing::debug!(root = %root.display(), "opened payload store");
        Ok(Self {
            root,
            remove_on_drop: false,
            scratch: None,
            live: Mutex::new(HashSet::new()),
        })
    }

    /// Create a store in a fresh directory under the system temp dir.
    ///
    /// The directory and everything in it is removed when the store is dropped.
    pub fn temporary() -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("pigment-payloads-")
            .tempdir()
            .map_err(|e| CasError::io(std::env::temp_dir(), e))?;
        let mut store = Self::open(scratch.path())?;
        store.remove_on_drop = true;
        store.scratch = Some(scratch);
        Ok(store)
    }

    /// Control whether the root directory is deleted on drop.
    pub fn set_remove_on_drop(&mut self, remove: bool) {
        self.remove_on_drop = remove;
        if !remove {
            if let Some(scratch) = self.scratch.take() {
                let _ = scratch.keep();
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `key`.
    pub fn path_for(&self, key: PayloadKey) -> PathBuf {
        let hex = key.to_hex();
        self.root.join(&hex[hex.len() - 2..]).join(format!("{hex}.bin"))
    }

    /// Write `bytes` under `key`, returning their digest.
    ///
    /// The write goes to a temporary sibling first and is renamed into
    /// place, so readers never observe a half-written payload.
    pub fn put(&self, key: PayloadKey, bytes: &[u8]) -> Result<blake3::Hash> {
        let path = self.path_for(key);
        if let Some(shard) = path.parent() {
            fs::create_dir_all(shard).map_err(|e| CasError::io(shard, e))?;
        }

        let staging = path.with_extension("tmp");
        fs::write(&staging, bytes).map_err(|e| CasError::io(&staging, e))?;
        fs::rename(&staging, &path).map_err(|e| CasError::io(&path, e))?;

        self.live.lock().insert(key);
        let digest = blake3::hash(bytes);
        tracing::trace!(key = %key, bytes = bytes.len(), "payload written");
        Ok(digest)
    }

    /// Read the bytes stored under `key` and check them against `expected`.
    pub fn get(&self, key: PayloadKey, expected: &blake3::Hash) -> Result<Vec<u8>> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(CasError::Missing(key)),
            Err(e) => return Err(CasError::io(&path, e)),
        };

        let actual = blake3::hash(&bytes);
        if actual != *expected {
            return Err(CasError::Corrupt {
                key,
                expected: hex::encode(expected.as_bytes()),
                actual: hex::encode(actual.as_bytes()),
            });
        }
        Ok(bytes)
    }

    /// Delete the payload stored under `key`.
    ///
    /// Returns `false` if there was nothing to delete.
    pub fn remove(&self, key: PayloadKey) -> Result<bool> {
        self.live.lock().remove(&key);
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CasError::io(&path, e)),
        }
    }

    /// Whether `key` was written through this store and not yet removed.
    pub fn contains(&self, key: PayloadKey) -> bool {
        self.live.lock().contains(&key)
    }

    /// Number of live payloads.
    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for PayloadStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadStore")
            .field("root", &self.root)
            .field("live", &self.len())
            .finish()
    }
}

impl Drop for PayloadStore {
    fn drop(&mut self) {
        // A scratch directory cleans itself up.
        if !self.remove_on_drop || self.scratch.is_some() {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.root) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(root = %self.root.display(), "failed to remove payload store: {}", e);
            }
        }
    }
}
