//! Error types for the history engine.
//!
//! Four kinds of failure cross this crate's boundary:
//!
//! - [`UsageError`]: the caller broke a contract (double execution, stepping
//!   an empty history). Never recovered from.
//! - [`NonFatalError`]: a history function failed before its critical region.
//!   The workspace is unchanged; show the message and carry on.
//! - [`ExecuteError::Fatal`]: a fault after the critical region, or one that
//!   is not known to be recoverable. Document state may be inconsistent.
//! - [`HistoryError::Undo`]: a memento could not be inverted. Fatal to the
//!   integrity of the history.
//!
//! Cancellation is not an error: it surfaces as an empty result with the
//! cancel flag set.

use std::fmt;

use pigment_cas::CasError;
use pigment_types::{MementoId, ToolType};
use thiserror::Error;

/// Message shown when a non-fatal error carries no localized text.
pub const GENERIC_FAILURE_MESSAGE: &str = "The operation could not be completed.";

/// A caller contract violation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("history function '{0}' has already been executed")]
    AlreadyExecuted(String),

    #[error("history function '{0}' is already executing asynchronously")]
    AlreadyExecuting(String),

    #[error("history function '{0}' is not cancellable")]
    NotCancellable(String),

    #[error("history function '{0}' is not executing asynchronously")]
    NotExecutingAsync(String),

    #[error("nothing to undo")]
    EmptyUndo,

    #[error("nothing to redo")]
    EmptyRedo,

    #[error("end_step_group called without a matching begin_step_group")]
    UnbalancedStepGroup,

    #[error("memento {0} is not in the history")]
    UnknownMemento(MementoId),

    #[error("workspace did not switch to tool '{0}'")]
    ToolSwitchRejected(ToolType),
}

/// A history function failed without modifying the workspace.
#[derive(Debug)]
pub struct NonFatalError {
    localized: Option<String>,
    cause: Option<Box<FunctionFault>>,
}

impl NonFatalError {
    /// A failure with user-facing text.
    pub fn new(localized: impl Into<String>) -> Self {
        Self {
            localized: Some(localized.into()),
            cause: None,
        }
    }

    /// A failure with no user-facing text; the generic message will be shown.
    pub fn generic() -> Self {
        Self {
            localized: None,
            cause: None,
        }
    }

    /// Wrap a recoverable fault.
    pub fn caused_by(cause: FunctionFault) -> Self {
        Self {
            localized: None,
            cause: Some(Box::new(cause)),
        }
    }

    pub fn with_cause(mut self, cause: FunctionFault) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// The localized text, if the function supplied one.
    pub fn localized(&self) -> Option<&str> {
        self.localized.as_deref()
    }

    /// What to show the user.
    pub fn message(&self) -> &str {
        self.localized.as_deref().unwrap_or(GENERIC_FAILURE_MESSAGE)
    }

    pub fn cause(&self) -> Option<&FunctionFault> {
        self.cause.as_deref()
    }
}

impl fmt::Display for NonFatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "non-fatal history function failure: {}", self.message())
    }
}

impl std::error::Error for NonFatalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// What a function body reports when it fails.
#[derive(Debug, Error)]
pub enum FunctionFault {
    /// An argument or index was outside its valid range.
    #[error("argument out of range: {0}")]
    OutOfRange(String),

    /// An allocation could not be satisfied.
    #[error("out of memory (requested {requested} bytes)")]
    OutOfMemory { requested: usize },

    /// The body already knows the failure is harmless.
    #[error(transparent)]
    NonFatal(#[from] NonFatalError),

    /// Anything else.
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// The body panicked on a worker thread.
    #[error("history function panicked: {0}")]
    Panicked(String),
}

impl FunctionFault {
    /// Faults that are harmless when raised outside a critical region.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::OutOfRange(_) | Self::OutOfMemory { .. })
    }
}

/// Why `execute` / `begin_execute` did not produce a result.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error(transparent)]
    NonFatal(#[from] NonFatalError),

    #[error("fatal history function failure: {0}")]
    Fatal(#[source] FunctionFault),
}

impl ExecuteError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    pub fn as_non_fatal(&self) -> Option<&NonFatalError> {
        match self {
            Self::NonFatal(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure inside a memento's inversion.
#[derive(Debug, Error)]
pub enum MementoError {
    /// The memento's payload could not be read back.
    #[error("memento payload unavailable: {0}")]
    Payload(#[from] CasError),

    /// The payload holds a different type than the one requested.
    #[error("memento payload is not a {expected}")]
    PayloadType { expected: &'static str },

    /// The memento expected a payload but none was set.
    #[error("memento has no payload")]
    MissingPayload,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from history stack operations.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// Inverting a memento failed; the history can no longer be trusted.
    #[error("failed to invert memento {memento}: {source}")]
    Undo {
        memento: MementoId,
        #[source]
        source: MementoError,
    },

    #[error(transparent)]
    Store(#[from] CasError),
}

/// Errors loading a [`HistoryConfig`](crate::HistoryConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid history config: {0}")]
    Parse(#[from] ron::error::SpannedError),
}
