//! Undo/redo history engine for pigment.
//!
//! Every change to a document is recorded as a [`Memento`] that knows how to
//! reverse itself. Mementos live on a [`HistoryStack`]; undo inverts the top
//! of the undo sequence, redo inverts the front of the redo sequence.
//!
//! # Pieces
//!
//! - **Memento**: an invertible record of one action. Its payload slot is
//!   written to a disk store on creation and released from memory once the
//!   memento is on the stack.
//! - **History function**: a one-shot operation that changes the workspace
//!   and returns the memento for the change. It can run on a worker thread,
//!   report progress and honor cancel requests up to its critical region.
//! - **History stack**: owns both sequences, suspends the active tool while
//!   replaying isolated actions, and notifies observers.
//!
//! # Typical flow
//!
//! ```text
//!   HistoryFunction::execute ──▶ Memento ──▶ HistoryStack::push_new_memento
//!                                                  │
//!                 step_backward / step_forward ◀───┘
//! ```
//!
//! # Threading
//!
//! The stack and every observer live on one owner thread. Asynchronous
//! functions lock a [`SharedWorkspace`] on their worker and report back
//! through an [`EventSink`] that the owner dispatches.

mod compound;
mod config;
mod context;
mod error;
mod function;
mod memento;
mod observer;
mod sink;
mod stack;
mod workspace;

pub use compound::CompoundMemento;
pub use config::{DEFAULT_WORKER_THREAD_PREFIX, HistoryConfig};
pub use context::HistoryContext;
pub use error::{
    ConfigError, ExecuteError, FunctionFault, GENERIC_FAILURE_MESSAGE, HistoryError, MementoError,
    NonFatalError, UsageError,
};
pub use function::{ExecutionContext, FunctionBody, FunctionResult, HistoryFunction};
pub use memento::{Inverse, Memento, MementoBody, MementoData, MementoKind};
pub use observer::{ExecutingMemento, HistoryObserver, HistoryStatus, ObserverId, StepDirection};
pub use sink::{EventSink, FinishStatus, Finished, FunctionEvent};
pub use stack::HistoryStack;
pub use workspace::{HistoryWorkspace, SharedWorkspace, shared_workspace};

pub use pigment_types::{ActionFlags, ExecutionId, ImageHandle, MementoId, SeriesId, ToolType};

/// Result type for history stack operations.
pub type Result<T> = std::result::Result<T, HistoryError>;
