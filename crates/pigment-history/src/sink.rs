//! Owner-side mailbox for history function events.
//!
//! History functions run on worker threads, but everything they report
//! (progress, cancel acknowledgements, completion) is handed to the owner
//! thread through an [`EventSink`]. Nothing registered on the sink is ever
//! called from a worker.
//!
//! ```text
//!   worker thread                   mpsc (unbounded)      owner thread
//!   ┌──────────────────────┐      ──────────────────▶   ┌────────────────────────┐
//!   │ FunctionBody         │  Progress / Finished       │ EventSink              │
//!   │   report_progress()  │                            │   dispatch_pending()   │
//!   └──────────────────────┘                            │   dispatch_blocking()  │
//!   HistoryFunction::request_cancel() ───────────────▶  │   → listeners          │
//!                          CancelRequested              │   → on_finished(..)    │
//!                                                       └────────────────────────┘
//! ```
//!
//! Events from one function arrive in the order they were raised. Events from
//! different functions may interleave.

use std::collections::HashMap;

use pigment_types::ExecutionId;
use tokio::sync::mpsc;

use crate::config::{DEFAULT_WORKER_THREAD_PREFIX, HistoryConfig};
use crate::error::ExecuteError;
use crate::memento::Memento;

// ============================================================================
// Messages
// ============================================================================

/// Sent from a worker (or the cancel path) to the sink.
pub(crate) enum SinkMessage<W> {
    Progress {
        execution: ExecutionId,
        percent: f64,
    },
    CancelRequested {
        execution: ExecutionId,
    },
    Finished(Finished<W>),
}

/// How a history function execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum FinishStatus {
    /// Produced a memento.
    Completed,
    /// Ran to completion and had nothing to record.
    NoOp,
    /// Honored a cancel request; the workspace is unchanged.
    Cancelled,
    /// Failed before its critical region; the workspace is unchanged.
    NonFatal,
    /// Failed in a way that may have left the workspace inconsistent.
    Fatal,
}

/// The outcome of an asynchronous execution, handed to `on_finished`.
pub struct Finished<W> {
    pub execution: ExecutionId,
    pub function: String,
    pub result: Result<Option<Memento<W>>, ExecuteError>,
    /// A cancel was requested at some point during the execution.
    pub cancel_requested: bool,
}

impl<W> Finished<W> {
    /// The function gave up because of a cancel request.
    pub fn was_cancelled(&self) -> bool {
        self.cancel_requested && matches!(self.result, Ok(None))
    }

    pub fn status(&self) -> FinishStatus {
        match &self.result {
            Ok(Some(_)) => FinishStatus::Completed,
            Ok(None) if self.cancel_requested => FinishStatus::Cancelled,
            Ok(None) => FinishStatus::NoOp,
            Err(ExecuteError::NonFatal(_)) => FinishStatus::NonFatal,
            Err(ExecuteError::Fatal(_) | ExecuteError::Usage(_)) => FinishStatus::Fatal,
        }
    }
}

impl<W> std::fmt::Debug for Finished<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Finished")
            .field("execution", &self.execution)
            .field("function", &self.function)
            .field("status", &self.status())
            .finish()
    }
}

/// What listeners registered with [`EventSink::listen`] see.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionEvent {
    /// Raw progress as reported; not clamped, not necessarily monotonic.
    Progress { execution: ExecutionId, percent: f64 },
    CancelRequested { execution: ExecutionId },
    Finished { execution: ExecutionId, status: FinishStatus },
}

impl FunctionEvent {
    pub fn execution(&self) -> ExecutionId {
        match self {
            Self::Progress { execution, .. }
            | Self::CancelRequested { execution }
            | Self::Finished { execution, .. } => *execution,
        }
    }
}

type FinishedCallback<W> = Box<dyn FnOnce(Finished<W>)>;
type Listener = Box<dyn FnMut(&FunctionEvent)>;

// ============================================================================
// EventSink
// ============================================================================

/// Receives history function events and delivers them on the owner thread.
///
/// Not `Send`: create it on the thread that owns the history and dispatch
/// from there.
pub struct EventSink<W> {
    tx: mpsc::UnboundedSender<SinkMessage<W>>,
    rx: mpsc::UnboundedReceiver<SinkMessage<W>>,
    callbacks: HashMap<ExecutionId, FinishedCallback<W>>,
    listeners: Vec<Listener>,
    thread_prefix: String,
}

impl<W> EventSink<W> {
    pub fn new() -> Self {
        Self::with_thread_prefix(DEFAULT_WORKER_THREAD_PREFIX)
    }

    /// A sink whose workers are named after `config.worker_thread_prefix`.
    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::with_thread_prefix(config.worker_thread_prefix.clone())
    }

    pub fn with_thread_prefix(prefix: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            callbacks: HashMap::new(),
            listeners: Vec::new(),
            thread_prefix: prefix.into(),
        }
    }

    /// Observe every event dispatched through this sink.
    pub fn listen(&mut self, listener: impl FnMut(&FunctionEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Executions whose `Finished` has not been dispatched yet.
    pub fn outstanding(&self) -> usize {
        self.callbacks.len()
    }

    pub(crate) fn thread_prefix(&self) -> &str {
        &self.thread_prefix
    }

    pub(crate) fn register(
        &mut self,
        execution: ExecutionId,
        on_finished: FinishedCallback<W>,
    ) -> mpsc::UnboundedSender<SinkMessage<W>> {
        self.callbacks.insert(execution, on_finished);
        self.tx.clone()
    }

    /// Deliver everything already received, without blocking.
    ///
    /// Returns the number of events dispatched.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut dispatched = 0;
        while let Ok(message) = self.rx.try_recv() {
            self.dispatch(message);
            dispatched += 1;
        }
        dispatched
    }

    /// Deliver events until every registered execution has finished.
    ///
    /// Blocks the calling thread. Must not be called from inside an async
    /// runtime, and the caller must not hold the workspace lock.
    pub fn dispatch_blocking(&mut self) -> usize {
        let mut dispatched = self.dispatch_pending();
        while !self.callbacks.is_empty() {
            match self.rx.blocking_recv() {
                Some(message) => {
                    self.dispatch(message);
                    dispatched += 1;
                }
                None => break,
            }
        }
        dispatched + self.dispatch_pending()
    }

    /// Wait for and deliver the next event. For owners driven by an async
    /// runtime.
    pub async fn dispatch_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(message) => {
                self.dispatch(message);
                true
            }
            None => false,
        }
    }

    fn dispatch(&mut self, message: SinkMessage<W>) {
        match message {
            SinkMessage::Progress { execution, percent } => {
                self.notify(&FunctionEvent::Progress { execution, percent });
            }
            SinkMessage::CancelRequested { execution } => {
                self.notify(&FunctionEvent::CancelRequested { execution });
            }
            SinkMessage::Finished(finished) => {
                let execution = finished.execution;
                self.notify(&FunctionEvent::Finished {
                    execution,
                    status: finished.status(),
                });
                match self.callbacks.remove(&execution) {
                    Some(on_finished) => on_finished(finished),
                    None => tracing::warn!(execution = %execution, "finished event with no registered callback"),
                }
            }
        }
    }

    fn notify(&mut self, event: &FunctionEvent) {
        for listener in &mut self.listeners {
            listener(event);
        }
    }
}

impl<W> Default for EventSink<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> std::fmt::Debug for EventSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("outstanding", &self.callbacks.len())
            .field("listeners", &self.listeners.len())
            .field("thread_prefix", &self.thread_prefix)
            .finish()
    }
}
