//! The undo/redo history of one document.
//!
//! ```text
//!                 step_backward (undo)
//!        ┌────────────────────────────────────┐
//!        │                                    ▼
//!   undo: [A, B, C]  ◀── top        front ──▶ redo: [C', ...]
//!        ▲                                    │
//!        └────────────────────────────────────┘
//!                 step_forward (redo)
//! ```
//!
//! The stack owns every memento on both sequences. Stepping inverts the
//! memento at the relevant end and pushes the inverse onto the other
//! sequence. Pushing a new memento discards the redo sequence.
//!
//! The stack is driven from one thread. Observers are called synchronously
//! from within each operation.

use std::collections::VecDeque;

use pigment_types::MementoId;

use crate::error::{HistoryError, UsageError};
use crate::memento::{Memento, MementoKind};
use crate::observer::{ExecutingMemento, HistoryObserver, HistoryStatus, ObserverId, StepDirection};
use crate::workspace::HistoryWorkspace;

type Observers<W> = Vec<(ObserverId, Box<dyn HistoryObserver<W>>)>;

/// Undo and redo sequences plus their observers.
pub struct HistoryStack<W> {
    undo: Vec<Memento<W>>,
    /// Front is the next memento to redo.
    redo: VecDeque<Memento<W>>,
    step_group_depth: usize,
    executing: usize,
    observers: Observers<W>,
    next_observer: u64,
}

impl<W> HistoryStack<W> {
    pub fn new() -> Self {
        Self {
            undo: Vec::new(),
            redo: VecDeque::new(),
            step_group_depth: 0,
            executing: 0,
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    // ========================================================================
    // Observers
    // ========================================================================

    pub fn subscribe(&mut self, observer: impl HistoryObserver<W> + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer, _)| *observer != id);
        self.observers.len() != before
    }

    /// Raise `changed` without changing anything.
    pub fn perform_changed(&mut self) {
        let status = self.status();
        emit(&mut self.observers, |o| o.changed(status));
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Applied mementos, oldest first. The last one is undone next.
    pub fn undo_stack(&self) -> &[Memento<W>] {
        &self.undo
    }

    /// Undone mementos. The front one is redone next.
    pub fn redo_stack(&self) -> &VecDeque<Memento<W>> {
        &self.redo
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// True for the duration of a step, including any tool switch it makes.
    pub fn is_executing_memento(&self) -> bool {
        self.executing > 0
    }

    pub fn step_group_depth(&self) -> usize {
        self.step_group_depth
    }

    pub fn status(&self) -> HistoryStatus {
        HistoryStatus {
            undo_depth: self.undo.len(),
            redo_depth: self.redo.len(),
            executing_memento: self.is_executing_memento(),
        }
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Record a new action. Discards the redo sequence.
    pub fn push_new_memento(&mut self, memento: Memento<W>) {
        tracing::debug!(memento = %memento.id(), name = %memento.name(), "pushing memento");
        emit(&mut self.observers, |o| o.changing());
        self.clear_redo_stack();
        self.undo.push(memento);

        if let Some(pushed) = self.undo.last() {
            emit(&mut self.observers, |o| o.new_memento(pushed));
        }
        let status = self.status();
        emit(&mut self.observers, |o| o.changed(status));

        if let Some(pushed) = self.undo.last_mut() {
            pushed.flush();
        }
    }

    /// Flush and discard every redo memento.
    pub fn clear_redo_stack(&mut self) {
        for memento in &mut self.redo {
            memento.flush();
        }
        emit(&mut self.observers, |o| o.changing());
        self.redo.clear();
        let status = self.status();
        emit(&mut self.observers, |o| o.changed(status));
    }

    /// Flush and discard the whole history.
    pub fn clear_all(&mut self) {
        tracing::debug!(undo = self.undo.len(), redo = self.redo.len(), "clearing history");
        emit(&mut self.observers, |o| o.changing());
        for memento in self.undo.iter_mut().chain(self.redo.iter_mut()) {
            memento.flush();
        }
        self.undo.clear();
        self.redo.clear();
        let status = self.status();
        emit(&mut self.observers, |o| o.changed(status));
        emit(&mut self.observers, |o| o.history_flushed());
    }

    // ========================================================================
    // Step groups
    // ========================================================================

    /// Batch steps so `finished_step_group` fires once, at the outermost end.
    pub fn begin_step_group(&mut self) {
        self.step_group_depth += 1;
    }

    pub fn end_step_group(&mut self) -> Result<(), UsageError> {
        if self.step_group_depth == 0 {
            return Err(UsageError::UnbalancedStepGroup);
        }
        self.step_group_depth -= 1;
        if self.step_group_depth == 0 {
            emit(&mut self.observers, |o| o.finished_step_group());
        }
        Ok(())
    }
}

impl<W: HistoryWorkspace> HistoryStack<W> {
    // ========================================================================
    // Stepping
    // ========================================================================

    /// Redo the front of the redo sequence.
    pub fn step_forward(&mut self, workspace: &mut W) -> Result<(), HistoryError> {
        self.executing += 1;
        let result = self.step(StepDirection::Forward, workspace);
        self.executing -= 1;
        result
    }

    /// Undo the top of the undo sequence.
    pub fn step_backward(&mut self, workspace: &mut W) -> Result<(), HistoryError> {
        self.executing += 1;
        let result = self.step(StepDirection::Backward, workspace);
        self.executing -= 1;
        result
    }

    /// Undo everything, as one step group.
    pub fn rewind(&mut self, workspace: &mut W) -> Result<(), HistoryError> {
        self.grouped(workspace, |stack, workspace| {
            while stack.can_undo() {
                stack.step_backward(workspace)?;
            }
            Ok(())
        })
    }

    /// Redo everything, as one step group.
    pub fn fast_forward(&mut self, workspace: &mut W) -> Result<(), HistoryError> {
        self.grouped(workspace, |stack, workspace| {
            while stack.can_redo() {
                stack.step_forward(workspace)?;
            }
            Ok(())
        })
    }

    /// Step until `target` is the most recently applied memento.
    pub fn step_to(&mut self, target: MementoId, workspace: &mut W) -> Result<(), HistoryError> {
        let direction = if self.undo.iter().any(|m| m.id() == target) {
            StepDirection::Backward
        } else if self.redo.iter().any(|m| m.id() == target) {
            StepDirection::Forward
        } else {
            return Err(UsageError::UnknownMemento(target).into());
        };

        self.grouped(workspace, |stack, workspace| {
            match direction {
                StepDirection::Backward => {
                    while stack.undo.last().is_some_and(|m| m.id() != target) {
                        stack.step_backward(workspace)?;
                    }
                }
                StepDirection::Forward => {
                    while stack.undo.last().is_none_or(|m| m.id() != target) {
                        stack.step_forward(workspace)?;
                    }
                }
            }
            Ok(())
        })
    }

    fn grouped(
        &mut self,
        workspace: &mut W,
        steps: impl FnOnce(&mut Self, &mut W) -> Result<(), HistoryError>,
    ) -> Result<(), HistoryError> {
        self.begin_step_group();
        let result = steps(self, workspace);
        self.end_step_group()?;
        result
    }

    fn step(&mut self, direction: StepDirection, workspace: &mut W) -> Result<(), HistoryError> {
        self.align_tool(direction, workspace)?;

        let suspend_tool = self.should_suspend(direction);
        emit(&mut self.observers, |o| o.changing());
        if let Some(memento) = source(&self.undo, &self.redo, direction) {
            let event = ExecutingMemento {
                memento,
                direction,
                suspend_tool,
            };
            emit(&mut self.observers, |o| o.executing_memento(&event));
        }

        if suspend_tool {
            workspace.push_null_tool();
        }

        let target = match direction {
            StepDirection::Forward => self.redo.front_mut().ok_or(UsageError::EmptyRedo)?,
            StepDirection::Backward => self.undo.last_mut().ok_or(UsageError::EmptyUndo)?,
        };
        let id = target.id();
        let inverse = match target.perform_undo(workspace) {
            Ok(inverse) => inverse,
            Err(source) => {
                tracing::error!(memento = %id, %direction, "memento inversion failed: {}", source);
                if suspend_tool {
                    workspace.pop_null_tool();
                }
                let status = self.status();
                emit(&mut self.observers, |o| o.changed(status));
                if self.step_group_depth == 0 {
                    emit(&mut self.observers, |o| o.finished_step_group());
                }
                return Err(HistoryError::Undo { memento: id, source });
            }
        };

        match direction {
            StepDirection::Forward => {
                self.redo.pop_front();
                self.undo.push(inverse);
            }
            StepDirection::Backward => {
                self.undo.pop();
                self.redo.push_front(inverse);
            }
        }
        tracing::debug!(memento = %id, %direction, suspend_tool, "stepped");

        if let Some(inverse) = source(&self.undo, &self.redo, direction.opposite()) {
            emit(&mut self.observers, |o| o.executed_memento(inverse, direction));
        }
        let status = self.status();
        emit(&mut self.observers, |o| o.changed(status));
        match direction {
            StepDirection::Forward => emit(&mut self.observers, |o| o.stepped_forward()),
            StepDirection::Backward => emit(&mut self.observers, |o| o.stepped_backward()),
        }

        let landed = match direction {
            StepDirection::Forward => self.undo.last_mut(),
            StepDirection::Backward => self.redo.front_mut(),
        };
        if let Some(inverse) = landed {
            inverse.flush();
        }

        if suspend_tool {
            workspace.pop_null_tool();
        }

        if self.step_group_depth == 0 {
            emit(&mut self.observers, |o| o.finished_step_group());
        }
        Ok(())
    }

    /// Make the workspace's tool match the next memento's, if it is a tool
    /// memento.
    fn align_tool(&self, direction: StepDirection, workspace: &mut W) -> Result<(), HistoryError> {
        loop {
            let next = source(&self.undo, &self.redo, direction).ok_or(match direction {
                StepDirection::Forward => UsageError::EmptyRedo,
                StepDirection::Backward => UsageError::EmptyUndo,
            })?;
            let MementoKind::Tool(tool) = next.kind() else {
                return Ok(());
            };
            if workspace.active_tool().as_ref() == Some(tool) {
                return Ok(());
            }

            workspace.set_tool(tool);
            if workspace.active_tool().as_ref() != Some(tool) {
                return Err(UsageError::ToolSwitchRejected(tool.clone()).into());
            }
            tracing::debug!(memento = %next.id(), tool = %tool, "switched tool before step");
        }
    }

    /// Suspend the tool for isolated actions, not for steps inside a gesture.
    fn should_suspend(&self, direction: StepDirection) -> bool {
        match direction {
            StepDirection::Forward => self
                .redo
                .front()
                .is_some_and(|m| *m.kind() == MementoKind::Plain && m.series().is_none()),
            StepDirection::Backward => {
                let Some((top, rest)) = self.undo.split_last() else {
                    return false;
                };
                *top.kind() == MementoKind::Plain && rest.last().is_none_or(|below| below.series().is_none())
            }
        }
    }
}

impl<W> Default for HistoryStack<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> std::fmt::Debug for HistoryStack<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStack")
            .field("undo", &self.undo.len())
            .field("redo", &self.redo.len())
            .field("step_group_depth", &self.step_group_depth)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// The memento a step in `direction` would invert next.
fn source<'a, W>(
    undo: &'a [Memento<W>],
    redo: &'a VecDeque<Memento<W>>,
    direction: StepDirection,
) -> Option<&'a Memento<W>> {
    match direction {
        StepDirection::Forward => redo.front(),
        StepDirection::Backward => undo.last(),
    }
}

fn emit<W>(observers: &mut Observers<W>, mut notify: impl FnMut(&mut dyn HistoryObserver<W>)) {
    for (_, observer) in observers.iter_mut() {
        notify(observer.as_mut());
    }
}

// ============================================================================
// Tests
// ============================================================================
