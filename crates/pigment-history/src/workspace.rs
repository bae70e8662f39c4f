//! What the history engine needs from the document workspace.

use std::sync::Arc;

use parking_lot::Mutex;
use pigment_types::ToolType;

/// Tool control the history stack uses while replaying mementos.
///
/// Replaying an isolated action suspends the active tool by pushing a "null"
/// tool, so tool input cannot interleave with the replay. Tool mementos are
/// only replayed while their own tool is active.
pub trait HistoryWorkspace {
    /// The active tool, or `None` while no tool (or the null tool) is active.
    fn active_tool(&self) -> Option<ToolType>;

    /// Make `tool` the active tool.
    fn set_tool(&mut self, tool: &ToolType);

    /// Suspend tool input. Calls nest.
    fn push_null_tool(&mut self);

    /// Undo the matching `push_null_tool`.
    fn pop_null_tool(&mut self);
}

/// A workspace shared between the owner thread and a history function worker.
pub type SharedWorkspace<W> = Arc<Mutex<W>>;

/// Wrap a workspace for asynchronous history functions.
pub fn shared_workspace<W>(workspace: W) -> SharedWorkspace<W> {
    Arc::new(Mutex::new(workspace))
}
