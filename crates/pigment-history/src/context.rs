//! Per-session history context.
//!
//! A [`HistoryContext`] hands out memento IDs and owns the payload store that
//! memento data is written to. Every document gets its own context, so two
//! documents never share IDs or payload files.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use pigment_cas::{CasError, PayloadStore};
use pigment_types::{MementoId, PayloadKey};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::HistoryConfig;
use crate::memento::MementoData;

/// ID allocator and payload store for one history.
pub struct HistoryContext {
    next_id: AtomicU64,
    store: Arc<PayloadStore>,
    config: HistoryConfig,
}

impl HistoryContext {
    /// Create a context from `config`.
    ///
    /// With a `payload_dir`, payloads go to a fresh session directory inside
    /// it. Without one, a temporary directory is used. Either way the
    /// directory is removed on drop unless `keep_payloads` is set.
    pub fn new(config: HistoryConfig) -> Result<Self, CasError> {
        let mut store = match &config.payload_dir {
            Some(dir) => {
                let session = format!("session-{}", PayloadKey::new().to_hex());
                PayloadStore::open(dir.join(session))?
            }
            None => PayloadStore::temporary()?,
        };
        store.set_remove_on_drop(!config.keep_payloads);

        tracing::debug!(root = %store.root().display(), "history context created");
        Ok(Self {
            next_id: AtomicU64::new(1),
            store: Arc::new(store),
            config,
        })
    }

    /// A context with default settings and a temporary payload directory.
    pub fn temporary() -> Result<Self, CasError> {
        Self::new(HistoryConfig::default())
    }

    /// Allocate the next memento ID. IDs start at 1.
    pub fn next_memento_id(&self) -> MementoId {
        MementoId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Serialize `value` into this context's store, ready to attach to a memento.
    pub fn persist<T>(&self, value: T) -> Result<MementoData, CasError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        MementoData::persist(Arc::clone(&self.store), value)
    }

    pub fn store(&self) -> &Arc<PayloadStore> {
        &self.store
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }
}

impl std::fmt::Debug for HistoryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryContext")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .field("store", &self.store)
            .finish()
    }
}
