//! Mementos: recorded, invertible actions.
//!
//! A [`Memento`] pairs the identity of an action (its [`MementoId`] and
//! optional [`SeriesId`]) with a [`MementoBody`] that knows how to reverse
//! it. Reversing a memento yields another memento, the inverse, that carries
//! the same identity. Redo is simply undoing the inverse.
//!
//! Large state (pixels, layer contents) belongs in the memento's
//! [`MementoData`] slot, which is written to the payload store as soon as it
//! is set and released from memory when the memento is flushed.

use std::any::Any;
use std::sync::Arc;

use pigment_cas::{CasError, PayloadStore, Persisted};
use pigment_types::{ImageHandle, MementoId, SeriesId, ToolType};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::context::HistoryContext;
use crate::error::MementoError;
use crate::workspace::HistoryWorkspace;

// ============================================================================
// Payload slot
// ============================================================================

trait ErasedPayload: Send + Sync {
    fn flush(&self);
    fn is_resident(&self) -> bool;
    fn size(&self) -> usize;
    fn store(&self) -> &Arc<PayloadStore>;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Send + Sync + 'static> ErasedPayload for Persisted<T> {
    fn flush(&self) {
        Persisted::flush(self)
    }

    fn is_resident(&self) -> bool {
        Persisted::is_resident(self)
    }

    fn size(&self) -> usize {
        Persisted::size(self)
    }

    fn store(&self) -> &Arc<PayloadStore> {
        Persisted::store(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A memento's optional persisted payload.
///
/// Reading an unset slot yields `None`. Setting it serializes the value to
/// the payload store immediately.
#[derive(Default)]
pub struct MementoData {
    payload: Option<Box<dyn ErasedPayload>>,
}

impl MementoData {
    /// An unset slot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Serialize `value` into `store`.
    pub fn persist<T>(store: Arc<PayloadStore>, value: T) -> Result<Self, CasError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let persisted = Persisted::new(store, value)?;
        Ok(Self {
            payload: Some(Box::new(persisted)),
        })
    }

    /// Persist a value for an inverse memento, in the same store as this one.
    pub fn persist_inverse<T>(&self, value: T) -> Result<Self, MementoError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let store = self
            .payload
            .as_ref()
            .map(|payload| Arc::clone(payload.store()))
            .ok_or(MementoError::MissingPayload)?;
        Ok(Self::persist(store, value)?)
    }

    pub fn is_set(&self) -> bool {
        self.payload.is_some()
    }

    /// The payload, re-hydrated from disk if it has been flushed.
    ///
    /// `Ok(None)` if the slot was never set.
    pub fn get<T>(&self) -> Result<Option<Arc<T>>, MementoError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let Some(payload) = &self.payload else {
            return Ok(None);
        };
        let persisted = payload
            .as_any()
            .downcast_ref::<Persisted<T>>()
            .ok_or(MementoError::PayloadType {
                expected: std::any::type_name::<T>(),
            })?;
        Ok(Some(persisted.get()?))
    }

    /// Like [`get`](Self::get), but an unset slot is an error.
    pub fn require<T>(&self) -> Result<Arc<T>, MementoError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.get()?.ok_or(MementoError::MissingPayload)
    }

    /// Release the in-memory copy. Idempotent; a no-op for an unset slot.
    pub fn flush(&self) {
        if let Some(payload) = &self.payload {
            payload.flush();
        }
    }

    /// Whether reading the payload would avoid the disk.
    pub fn is_resident(&self) -> bool {
        self.payload.as_ref().is_some_and(|p| p.is_resident())
    }

    /// Serialized size in bytes (0 when unset).
    pub fn size(&self) -> usize {
        self.payload.as_ref().map_or(0, |p| p.size())
    }
}

impl std::fmt::Debug for MementoData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.payload {
            None => f.write_str("MementoData(unset)"),
            Some(p) => f
                .debug_struct("MementoData")
                .field("size", &p.size())
                .field("resident", &p.is_resident())
                .finish(),
        }
    }
}

// ============================================================================
// Memento
// ============================================================================

/// Whether a memento belongs to a particular tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MementoKind {
    Plain,
    /// Only replayed while this tool is active.
    Tool(ToolType),
}

impl MementoKind {
    pub fn tool(&self) -> Option<&ToolType> {
        match self {
            Self::Plain => None,
            Self::Tool(tool) => Some(tool),
        }
    }
}

/// The action-specific half of a memento.
pub trait MementoBody<W>: Send {
    /// Reverse the recorded action against `workspace` and describe how to
    /// reverse the reversal.
    fn on_undo(&mut self, data: &MementoData, workspace: &mut W) -> Result<Inverse<W>, MementoError>;

    /// Called after the memento's payload has been flushed.
    fn on_flush(&mut self) {}
}

/// What [`MementoBody::on_undo`] returns: everything an inverse memento
/// needs except its identity.
pub struct Inverse<W> {
    name: Option<String>,
    image: Option<ImageHandle>,
    data: MementoData,
    body: Box<dyn MementoBody<W>>,
}

impl<W> Inverse<W> {
    /// An inverse that keeps the original memento's name and image.
    pub fn new(body: impl MementoBody<W> + 'static) -> Self {
        Self {
            name: None,
            image: None,
            data: MementoData::empty(),
            body: Box::new(body),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_image(mut self, image: ImageHandle) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_data(mut self, data: MementoData) -> Self {
        self.data = data;
        self
    }
}

/// One undoable action on the history.
pub struct Memento<W> {
    id: MementoId,
    series: Option<SeriesId>,
    name: String,
    image: Option<ImageHandle>,
    kind: MementoKind,
    data: MementoData,
    body: Box<dyn MementoBody<W>>,
}

impl<W> Memento<W> {
    /// A plain memento with a fresh ID from `ctx`.
    pub fn new(ctx: &HistoryContext, name: impl Into<String>, body: impl MementoBody<W> + 'static) -> Self {
        Self {
            id: ctx.next_memento_id(),
            series: None,
            name: name.into(),
            image: None,
            kind: MementoKind::Plain,
            data: MementoData::empty(),
            body: Box::new(body),
        }
    }

    /// Mark this memento as part of a continuous gesture.
    pub fn in_series(mut self, series: SeriesId) -> Self {
        self.series = Some(series);
        self
    }

    /// Make this a tool memento, replayed only while `tool` is active.
    pub fn for_tool(mut self, tool: ToolType) -> Self {
        self.kind = MementoKind::Tool(tool);
        self
    }

    pub fn with_image(mut self, image: ImageHandle) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_data(mut self, data: MementoData) -> Self {
        self.data = data;
        self
    }

    pub fn set_data(&mut self, data: MementoData) {
        self.data = data;
    }

    pub fn id(&self) -> MementoId {
        self.id
    }

    pub fn series(&self) -> Option<SeriesId> {
        self.series
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> Option<&ImageHandle> {
        self.image.as_ref()
    }

    pub fn kind(&self) -> &MementoKind {
        &self.kind
    }

    pub fn tool(&self) -> Option<&ToolType> {
        self.kind.tool()
    }

    pub fn data(&self) -> &MementoData {
        &self.data
    }

    /// Release the payload from memory, then run the body's flush hook.
    ///
    /// Safe to call repeatedly; the hook runs every time.
    pub fn flush(&mut self) {
        self.data.flush();
        self.body.on_flush();
        tracing::trace!(memento = %self.id, "memento flushed");
    }
}

impl<W: HistoryWorkspace> Memento<W> {
    /// Reverse this memento, returning its inverse.
    ///
    /// The inverse always has this memento's ID, series and kind. A tool
    /// memento first makes its tool active.
    pub fn perform_undo(&mut self, workspace: &mut W) -> Result<Self, MementoError> {
        if let MementoKind::Tool(tool) = &self.kind {
            if workspace.active_tool().as_ref() != Some(tool) {
                workspace.set_tool(tool);
            }
        }

        let inverse = self.body.on_undo(&self.data, workspace)?;
        tracing::debug!(memento = %self.id, name = %self.name, "memento inverted");

        Ok(Self {
            id: self.id,
            series: self.series,
            kind: self.kind.clone(),
            name: inverse.name.unwrap_or_else(|| self.name.clone()),
            image: inverse.image.or_else(|| self.image.clone()),
            data: inverse.data,
            body: inverse.body,
        })
    }
}

impl<W> std::fmt::Debug for Memento<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memento")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("series", &self.series)
            .field("kind", &self.kind)
            .field("data", &self.data)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
