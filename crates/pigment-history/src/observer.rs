//! Notifications raised by a [`HistoryStack`](crate::HistoryStack).
//!
//! Every callback has a no-op default, so an observer implements only what it
//! cares about. Callbacks run synchronously on the thread that drives the
//! stack.

use crate::memento::Memento;

/// Which way a step moves through the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum StepDirection {
    /// Redo.
    Forward,
    /// Undo.
    Backward,
}

impl StepDirection {
    pub fn opposite(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }
}

/// Raised just before a memento is replayed.
pub struct ExecutingMemento<'a, W> {
    /// The memento about to be inverted.
    pub memento: &'a Memento<W>,
    pub direction: StepDirection,
    /// Whether the active tool is suspended for this replay.
    pub suspend_tool: bool,
}

/// A snapshot of the stack, passed with `changed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistoryStatus {
    pub undo_depth: usize,
    pub redo_depth: usize,
    /// A step is in progress; document changes now are replays, not new actions.
    pub executing_memento: bool,
}

impl HistoryStatus {
    pub fn can_undo(&self) -> bool {
        self.undo_depth > 0
    }

    pub fn can_redo(&self) -> bool {
        self.redo_depth > 0
    }
}

/// Handle returned by [`HistoryStack::subscribe`](crate::HistoryStack::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u64);

/// Receives history notifications.
pub trait HistoryObserver<W> {
    /// The stack is about to change.
    fn changing(&mut self) {}

    /// The stack has changed.
    fn changed(&mut self, _status: HistoryStatus) {}

    /// A new memento was pushed (after the redo branch was discarded).
    fn new_memento(&mut self, _memento: &Memento<W>) {}

    fn stepped_forward(&mut self) {}

    fn stepped_backward(&mut self) {}

    /// The outermost step or step group completed. Good time to refresh UI.
    fn finished_step_group(&mut self) {}

    /// The whole history was cleared. Anything keyed by memento ID is stale.
    fn history_flushed(&mut self) {}

    /// A memento is about to be replayed.
    fn executing_memento(&mut self, _event: &ExecutingMemento<'_, W>) {}

    /// A memento was replayed; `inverse` now sits on the opposite sequence.
    fn executed_memento(&mut self, _inverse: &Memento<W>, _direction: StepDirection) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_display_and_opposite() {
        assert_eq!(StepDirection::Forward.to_string(), "forward");
        assert_eq!(StepDirection::Backward.to_string(), "backward");
        assert_eq!(StepDirection::Forward.opposite(), StepDirection::Backward);
    }

    #[test]
    fn test_status_predicates() {
        let status = HistoryStatus {
            undo_depth: 2,
            redo_depth: 0,
            executing_memento: false,
        };
        assert!(status.can_undo());
        assert!(!status.can_redo());
        assert!(!HistoryStatus::default().can_undo());
    }
}
