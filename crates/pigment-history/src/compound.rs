//! Several mementos recorded as one history entry.

use crate::context::HistoryContext;
use crate::error::MementoError;
use crate::memento::{Inverse, Memento, MementoBody, MementoData};
use crate::workspace::HistoryWorkspace;

/// Groups child mementos under a single name.
///
/// Undoing the group undoes the children last-to-first. The inverse group
/// holds the children's inverses, so redo replays them first-to-last.
pub struct CompoundMemento<W> {
    children: Vec<Memento<W>>,
}

impl<W> CompoundMemento<W> {
    pub fn new(children: Vec<Memento<W>>) -> Self {
        Self { children }
    }

    pub fn push(&mut self, child: Memento<W>) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[Memento<W>] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl<W: HistoryWorkspace + 'static> CompoundMemento<W> {
    /// Wrap the group in a memento of its own.
    pub fn into_memento(self, ctx: &HistoryContext, name: impl Into<String>) -> Memento<W> {
        Memento::new(ctx, name, self)
    }
}

impl<W> Default for CompoundMemento<W> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<W: HistoryWorkspace + 'static> MementoBody<W> for CompoundMemento<W> {
    fn on_undo(&mut self, _data: &MementoData, workspace: &mut W) -> Result<Inverse<W>, MementoError> {
        let mut inverted = Vec::with_capacity(self.children.len());
        for child in self.children.iter_mut().rev() {
            inverted.push(child.perform_undo(workspace)?);
        }
        Ok(Inverse::new(CompoundMemento::new(inverted)))
    }

    fn on_flush(&mut self) {
        for child in &mut self.children {
            child.flush();
        }
    }
}
