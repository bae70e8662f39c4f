//! History functions: operations that change the workspace and produce a
//! memento describing how to undo the change.
//!
//! A [`HistoryFunction`] runs its [`FunctionBody`] exactly once, either on the
//! calling thread ([`execute`](HistoryFunction::execute)) or on a worker
//! thread ([`begin_execute`](HistoryFunction::begin_execute)).
//!
//! # Critical regions
//!
//! A body does its fallible and cancellable preparation first, then calls
//! [`ExecutionContext::enter_critical_region`] right before it mutates the
//! workspace. That one call decides how failures are classified:
//!
//! | Fault                         | Before the critical region | After it |
//! |-------------------------------|----------------------------|----------|
//! | `OutOfRange`, `OutOfMemory`   | `NonFatal`                 | `Fatal`  |
//! | `NonFatal`                    | `NonFatal`                 | `NonFatal` |
//! | `Other`, `Panicked`           | `Fatal`                    | `Fatal`  |
//!
//! Cancellation is cooperative: a body polls
//! [`please_cancel`](ExecutionContext::please_cancel) at safe checkpoints and
//! returns `Ok(None)` when it sees a request. Inside the critical region
//! `please_cancel` always answers `false`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;

use pigment_types::{ActionFlags, ExecutionId};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{ExecuteError, FunctionFault, NonFatalError, UsageError};
use crate::memento::Memento;
use crate::sink::{EventSink, Finished, SinkMessage};
use crate::workspace::SharedWorkspace;

/// What a function body returns.
pub type FunctionResult<W> = Result<Option<Memento<W>>, FunctionFault>;

/// The operation-specific half of a history function.
pub trait FunctionBody<W>: Send {
    /// Apply the operation. `Ok(None)` means nothing needed recording (or the
    /// body honored a cancel request).
    fn on_execute(&mut self, cx: &ExecutionContext<W>, workspace: &mut W) -> FunctionResult<W>;
}

struct FnBody<F>(F);

impl<W, F> FunctionBody<W> for FnBody<F>
where
    F: FnMut(&ExecutionContext<W>, &mut W) -> FunctionResult<W> + Send,
{
    fn on_execute(&mut self, cx: &ExecutionContext<W>, workspace: &mut W) -> FunctionResult<W> {
        (self.0)(cx, workspace)
    }
}

struct Shared<W> {
    name: String,
    flags: ActionFlags,
    execution: ExecutionId,
    cancel: CancellationToken,
    critical: AtomicBool,
    events: OnceLock<mpsc::UnboundedSender<SinkMessage<W>>>,
}

impl<W> Shared<W> {
    fn send(&self, message: SinkMessage<W>) {
        if let Some(tx) = self.events.get() {
            if tx.send(message).is_err() {
                tracing::debug!(execution = %self.execution, "event sink dropped; event discarded");
            }
        }
    }
}

// ============================================================================
// ExecutionContext
// ============================================================================

/// Handed to a [`FunctionBody`] while it runs.
pub struct ExecutionContext<W> {
    shared: Arc<Shared<W>>,
}

impl<W> ExecutionContext<W> {
    pub fn execution(&self) -> ExecutionId {
        self.shared.execution
    }

    pub fn flags(&self) -> ActionFlags {
        self.shared.flags
    }

    /// Whether the body should stop at this checkpoint.
    ///
    /// Always `false` once the critical region has been entered.
    pub fn please_cancel(&self) -> bool {
        !self.in_critical_region() && self.shared.cancel.is_cancelled()
    }

    /// Commit to finishing. Call immediately before the first irreversible
    /// change to the workspace. There is no way back out.
    pub fn enter_critical_region(&self) {
        if !self.shared.critical.swap(true, Ordering::SeqCst) {
            tracing::debug!(execution = %self.shared.execution, function = %self.shared.name, "entered critical region");
        }
    }

    pub fn in_critical_region(&self) -> bool {
        self.shared.critical.load(Ordering::SeqCst)
    }

    /// Report progress. The value is passed through as-is.
    ///
    /// Only meaningful for functions flagged `REPORTS_PROGRESS`; otherwise the
    /// call is logged and ignored.
    pub fn report_progress(&self, percent: f64) {
        if !self.shared.flags.reports_progress() {
            tracing::warn!(
                function = %self.shared.name,
                percent,
                "progress reported by a function without REPORTS_PROGRESS"
            );
            return;
        }
        self.shared.send(SinkMessage::Progress {
            execution: self.shared.execution,
            percent,
        });
    }

    /// A token that is cancelled when a cancel is requested, for nested
    /// long-running work. Unlike `please_cancel`, it ignores the critical region.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }
}

// ============================================================================
// HistoryFunction
// ============================================================================

/// A one-shot operation that records a memento.
pub struct HistoryFunction<W> {
    shared: Arc<Shared<W>>,
    body: Option<Box<dyn FunctionBody<W>>>,
    worker: Option<JoinHandle<()>>,
}

impl<W> HistoryFunction<W> {
    pub fn new(name: impl Into<String>, flags: ActionFlags, body: impl FunctionBody<W> + 'static) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                flags,
                execution: ExecutionId::new(),
                cancel: CancellationToken::new(),
                critical: AtomicBool::new(false),
                events: OnceLock::new(),
            }),
            body: Some(Box::new(body)),
            worker: None,
        }
    }

    /// A function whose body is a closure.
    pub fn from_fn<F>(name: impl Into<String>, flags: ActionFlags, f: F) -> Self
    where
        F: FnMut(&ExecutionContext<W>, &mut W) -> FunctionResult<W> + Send + 'static,
    {
        Self::new(name, flags, FnBody(f))
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn flags(&self) -> ActionFlags {
        self.shared.flags
    }

    pub fn execution(&self) -> ExecutionId {
        self.shared.execution
    }

    /// Whether `execute` or `begin_execute` has been called.
    pub fn has_executed(&self) -> bool {
        self.body.is_none()
    }

    /// Whether this function was started with `begin_execute`.
    pub fn is_async(&self) -> bool {
        self.shared.events.get().is_some()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    pub fn in_critical_region(&self) -> bool {
        self.shared.critical.load(Ordering::SeqCst)
    }

    /// Whether the worker thread is still running.
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|worker| !worker.is_finished())
    }

    /// Run the body on the calling thread.
    pub fn execute(&mut self, workspace: &mut W) -> Result<Option<Memento<W>>, ExecuteError> {
        let mut body = self
            .body
            .take()
            .ok_or_else(|| UsageError::AlreadyExecuted(self.shared.name.clone()))?;
        run(&self.shared, body.as_mut(), workspace)
    }

    /// Ask an asynchronous, cancellable execution to stop.
    ///
    /// Advisory: the body may already be past its last checkpoint.
    pub fn request_cancel(&self) -> Result<(), UsageError> {
        if !self.shared.flags.is_cancellable() {
            return Err(UsageError::NotCancellable(self.shared.name.clone()));
        }
        if !self.is_async() {
            return Err(UsageError::NotExecutingAsync(self.shared.name.clone()));
        }

        self.shared.cancel.cancel();
        tracing::info!(execution = %self.shared.execution, function = %self.shared.name, "cancel requested");
        self.shared.send(SinkMessage::CancelRequested {
            execution: self.shared.execution,
        });
        Ok(())
    }

    /// Block until the worker thread exits. Returns immediately for
    /// synchronous executions.
    ///
    /// The owner must not hold the workspace lock while waiting.
    pub fn wait(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!(execution = %self.shared.execution, "history function worker died");
            }
        }
    }
}

impl<W: Send + 'static> HistoryFunction<W> {
    /// Run the body on a worker thread.
    ///
    /// The worker holds the workspace lock for the whole execution. The
    /// outcome is delivered to `on_finished` when the owner next dispatches
    /// `sink`; it is never called from the worker.
    pub fn begin_execute<F>(
        &mut self,
        sink: &mut EventSink<W>,
        workspace: SharedWorkspace<W>,
        on_finished: F,
    ) -> Result<(), UsageError>
    where
        F: FnOnce(Finished<W>) + 'static,
    {
        if self.is_async() {
            return Err(UsageError::AlreadyExecuting(self.shared.name.clone()));
        }
        let mut body = self
            .body
            .take()
            .ok_or_else(|| UsageError::AlreadyExecuted(self.shared.name.clone()))?;

        let execution = self.shared.execution;
        let tx = sink.register(execution, Box::new(on_finished));
        // Cannot fail: is_async() was false and only this method sets it.
        let _ = self.shared.events.set(tx.clone());

        let shared = Arc::clone(&self.shared);
        let thread_name = format!("{}-{}", sink.thread_prefix(), execution.short());
        tracing::debug!(execution = %execution, function = %shared.name, thread = %thread_name, "starting history function");

        let spawned = std::thread::Builder::new().name(thread_name).spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                let mut guard = workspace.lock();
                run(&shared, body.as_mut(), &mut *guard)
            }));
            let result = match outcome {
                Ok(result) => result,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(execution = %shared.execution, function = %shared.name, "history function panicked: {}", message);
                    Err(ExecuteError::Fatal(FunctionFault::Panicked(message)))
                }
            };
            shared.send(SinkMessage::Finished(Finished {
                execution: shared.execution,
                function: shared.name.clone(),
                result,
                cancel_requested: shared.cancel.is_cancelled(),
            }));
        });

        match spawned {
            Ok(worker) => self.worker = Some(worker),
            Err(e) => {
                tracing::error!(execution = %execution, "failed to spawn history function worker: {}", e);
                let cause = FunctionFault::Other(anyhow::Error::new(e).context("failed to spawn worker thread"));
                let finished = Finished {
                    execution,
                    function: self.shared.name.clone(),
                    result: Err(ExecuteError::NonFatal(NonFatalError::caused_by(cause))),
                    cancel_requested: false,
                };
                let _ = tx.send(SinkMessage::Finished(finished));
            }
        }
        Ok(())
    }
}

impl<W> std::fmt::Debug for HistoryFunction<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryFunction")
            .field("name", &self.shared.name)
            .field("execution", &self.shared.execution)
            .field("flags", &self.shared.flags)
            .field("executed", &self.has_executed())
            .field("async", &self.is_async())
            .finish()
    }
}

fn run<W>(
    shared: &Arc<Shared<W>>,
    body: &mut dyn FunctionBody<W>,
    workspace: &mut W,
) -> Result<Option<Memento<W>>, ExecuteError> {
    let cx = ExecutionContext {
        shared: Arc::clone(shared),
    };
    let result = body.on_execute(&cx, workspace);
    let critical = cx.in_critical_region();

    match result {
        Ok(memento) => {
            tracing::info!(
                execution = %shared.execution,
                function = %shared.name,
                memento = ?memento.as_ref().map(|m| m.id()),
                "history function finished"
            );
            Ok(memento)
        }
        Err(fault) => {
            let err = classify(fault, critical);
            match &err {
                ExecuteError::Fatal(fault) => {
                    tracing::error!(execution = %shared.execution, function = %shared.name, critical, "history function failed: {}", fault)
                }
                _ => tracing::info!(execution = %shared.execution, function = %shared.name, "history function failed harmlessly: {}", err),
            }
            Err(err)
        }
    }
}

fn classify(fault: FunctionFault, critical: bool) -> ExecuteError {
    match fault {
        FunctionFault::NonFatal(e) => ExecuteError::NonFatal(e),
        fault if fault.is_recoverable() && !critical => ExecuteError::NonFatal(NonFatalError::caused_by(fault)),
        fault => ExecuteError::Fatal(fault),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
