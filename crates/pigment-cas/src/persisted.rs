//! A single value persisted to a [`PayloadStore`].
//!
//! The value is serialized the moment a [`Persisted`] is created. After that
//! it lives in memory until [`Persisted::flush`] releases it; later reads
//! re-hydrate it from disk. A flushed value that someone else still holds is
//! handed back without touching the disk.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use pigment_types::PayloadKey;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{CasError, PayloadStore, Result};

enum Residency<T> {
    /// Held in memory by this container.
    Strong(Arc<T>),
    /// Released; may still be alive if a caller kept a reference.
    Weak(Weak<T>),
}

/// A value of type `T` backed by a file in a payload store.
///
/// Dropping the container deletes the file.
pub struct Persisted<T> {
    store: Arc<PayloadStore>,
    key: PayloadKey,
    digest: blake3::Hash,
    size: usize,
    residency: Mutex<Residency<T>>,
}

impl<T> Persisted<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Serialize `value` into `store` right away and keep it resident.
    pub fn new(store: Arc<PayloadStore>, value: T) -> Result<Self> {
        let bytes = postcard::to_stdvec(&value).map_err(CasError::Encode)?;
        let key = PayloadKey::new();
        let digest = store.put(key, &bytes)?;

        Ok(Self {
            store,
            key,
            digest,
            size: bytes.len(),
            residency: Mutex::new(Residency::Strong(Arc::new(value))),
        })
    }

    /// The value, re-hydrated from disk if it is no longer in memory.
    pub fn get(&self) -> Result<Arc<T>> {
        let mut residency = self.residency.lock();
        match &*residency {
            Residency::Strong(value) => return Ok(Arc::clone(value)),
            Residency::Weak(weak) => {
                if let Some(value) = weak.upgrade() {
                    return Ok(value);
                }
            }
        }

        let bytes = self.store.get(self.key, &self.digest)?;
        let value: T = postcard::from_bytes(&bytes).map_err(|source| CasError::Decode {
            key: self.key,
            source,
        })?;
        tracing::trace!(key = %self.key, bytes = bytes.len(), "payload re-hydrated");

        let value = Arc::new(value);
        *residency = Residency::Weak(Arc::downgrade(&value));
        Ok(value)
    }
}

impl<T> Persisted<T> {
    /// The value if it is still in memory; never touches the disk.
    pub fn get_resident(&self) -> Option<Arc<T>> {
        match &*self.residency.lock() {
            Residency::Strong(value) => Some(Arc::clone(value)),
            Residency::Weak(weak) => weak.upgrade(),
        }
    }

    /// Release the in-memory copy. Idempotent.
    pub fn flush(&self) {
        let mut residency = self.residency.lock();
        if let Residency::Strong(value) = &*residency {
            *residency = Residency::Weak(Arc::downgrade(value));
        }
    }

    /// Whether the value can be read without going to disk.
    pub fn is_resident(&self) -> bool {
        match &*self.residency.lock() {
            Residency::Strong(_) => true,
            Residency::Weak(weak) => weak.strong_count() > 0,
        }
    }

    pub fn key(&self) -> PayloadKey {
        self.key
    }

    /// The store this value lives in.
    pub fn store(&self) -> &Arc<PayloadStore> {
        &self.store
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl<T> std::fmt::Debug for Persisted<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persisted")
            .field("key", &self.key)
            .field("size", &self.size)
            .field("resident", &self.is_resident())
            .finish()
    }
}

impl<T> Drop for Persisted<T> {
    fn drop(&mut self) {
        if let Err(e) = self.store.remove(self.key) {
            tracing::warn!(key = %self.key, "failed to remove payload: {}", e);
        }
    }
}
