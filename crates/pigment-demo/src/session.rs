//! A scripted editing session: a canvas, its history, and the steps that
//! drive them.
//!
//! Steps are written as short strings so they can be passed on a command line:
//!
//! ```text
//! fill:X,Y,W,H:RRGGBB          fill a rectangle (runs on a worker thread)
//! cancel-fill:X,Y,W,H:RRGGBB   start a fill and immediately ask it to stop
//! clear:X,Y,W,H;X,Y,W,H:RRGGBB paint several rectangles as one entry
//! stroke:X,Y;X,Y;...:RRGGBB    brush stroke, one dab per point
//! tool:NAME                    select a tool
//! undo | redo | rewind | fast-forward
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;

use pigment_history::{
    EventSink, ExecuteError, FinishStatus, Finished, FunctionEvent, HistoryConfig, HistoryContext, HistoryError,
    HistoryFunction, HistoryObserver, HistoryStack, HistoryStatus, Memento, SharedWorkspace, StepDirection,
    UsageError, shared_workspace,
};
use serde::Serialize;
use strum::{Display, EnumString};
use thiserror::Error;

use crate::canvas::{Canvas, Rect, Tool};
use crate::ops;
use crate::patch::PatchError;

// ============================================================================
// Steps
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
enum Verb {
    Fill,
    CancelFill,
    Clear,
    Stroke,
    Tool,
    Undo,
    Redo,
    Rewind,
    FastForward,
}

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Fill { rect: Rect, color: u32 },
    CancelFill { rect: Rect, color: u32 },
    Clear { rects: Vec<Rect>, color: u32 },
    Stroke { points: Vec<(u32, u32)>, color: u32 },
    SelectTool(Tool),
    Undo,
    Redo,
    Rewind,
    FastForward,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StepParseError {
    #[error("unknown step '{0}'")]
    UnknownVerb(String),

    #[error("step '{verb}' is missing its {what}")]
    Missing { verb: String, what: &'static str },

    #[error("invalid number '{0}'")]
    Number(String),

    #[error("invalid rectangle '{0}' (expected X,Y,W,H)")]
    Rect(String),

    #[error("invalid point '{0}' (expected X,Y)")]
    Point(String),

    #[error("invalid color '{0}' (expected RRGGBB)")]
    Color(String),

    #[error("unknown tool '{0}'")]
    Tool(String),
}

impl FromStr for Step {
    type Err = StepParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split(':');
        let word = parts.next().unwrap_or_default();
        let verb: Verb = word.parse().map_err(|_| StepParseError::UnknownVerb(word.to_string()))?;
        let mut arg = |what: &'static str| {
            parts.next().filter(|p| !p.is_empty()).ok_or_else(|| StepParseError::Missing {
                verb: verb.to_string(),
                what,
            })
        };

        Ok(match verb {
            Verb::Fill => Step::Fill {
                rect: parse_rect(arg("rectangle")?)?,
                color: parse_color(arg("color")?)?,
            },
            Verb::CancelFill => Step::CancelFill {
                rect: parse_rect(arg("rectangle")?)?,
                color: parse_color(arg("color")?)?,
            },
            Verb::Clear => Step::Clear {
                rects: arg("rectangles")?.split(';').map(parse_rect).collect::<Result<_, _>>()?,
                color: parse_color(arg("color")?)?,
            },
            Verb::Stroke => Step::Stroke {
                points: arg("points")?.split(';').map(parse_point).collect::<Result<_, _>>()?,
                color: parse_color(arg("color")?)?,
            },
            Verb::Tool => {
                let name = arg("tool name")?;
                Step::SelectTool(name.parse().map_err(|_| StepParseError::Tool(name.to_string()))?)
            }
            Verb::Undo => Step::Undo,
            Verb::Redo => Step::Redo,
            Verb::Rewind => Step::Rewind,
            Verb::FastForward => Step::FastForward,
        })
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T>(items: &[T], each: impl Fn(&T) -> String) -> String {
            items.iter().map(each).collect::<Vec<_>>().join(";")
        }
        match self {
            Step::Fill { rect, color } => write!(f, "fill:{rect}:{color:06x}"),
            Step::CancelFill { rect, color } => write!(f, "cancel-fill:{rect}:{color:06x}"),
            Step::Clear { rects, color } => write!(f, "clear:{}:{color:06x}", join(rects, |r| r.to_string())),
            Step::Stroke { points, color } => {
                write!(f, "stroke:{}:{color:06x}", join(points, |(x, y)| format!("{x},{y}")))
            }
            Step::SelectTool(tool) => write!(f, "tool:{tool}"),
            Step::Undo => f.write_str("undo"),
            Step::Redo => f.write_str("redo"),
            Step::Rewind => f.write_str("rewind"),
            Step::FastForward => f.write_str("fast-forward"),
        }
    }
}

fn parse_u32(s: &str) -> Result<u32, StepParseError> {
    s.trim().parse().map_err(|_| StepParseError::Number(s.to_string()))
}

fn parse_rect(s: &str) -> Result<Rect, StepParseError> {
    let fields = s.split(',').map(parse_u32).collect::<Result<Vec<_>, _>>()?;
    match fields[..] {
        [x, y, width, height] => Ok(Rect::new(x, y, width, height)),
        _ => Err(StepParseError::Rect(s.to_string())),
    }
}

fn parse_point(s: &str) -> Result<(u32, u32), StepParseError> {
    let fields = s.split(',').map(parse_u32).collect::<Result<Vec<_>, _>>()?;
    match fields[..] {
        [x, y] => Ok((x, y)),
        _ => Err(StepParseError::Point(s.to_string())),
    }
}

/// Parse `RRGGBB` (an optional leading `#` is allowed).
pub fn parse_color(s: &str) -> Result<u32, StepParseError> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return Err(StepParseError::Color(s.to_string()));
    }
    u32::from_str_radix(hex, 16).map_err(|_| StepParseError::Color(s.to_string()))
}

// ============================================================================
// Outcomes and summary
// ============================================================================

/// What a step did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Recorded { name: String, entries: usize },
    NoOp,
    Cancelled,
    /// The operation failed harmlessly; the canvas is unchanged.
    Failed { message: String },
    Stepped { direction: String, count: usize },
    /// Nothing to undo or redo.
    Nothing,
    ToolSelected { tool: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub name: String,
    pub series: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
}

impl HistoryEntry {
    fn of(memento: &Memento<Canvas>) -> Self {
        Self {
            id: memento.id().get(),
            name: memento.name().to_string(),
            series: memento.series().is_some(),
            tool: memento.tool().map(|t| t.to_string()),
        }
    }
}

/// End-of-session snapshot, printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub width: u32,
    pub height: u32,
    pub undo: Vec<HistoryEntry>,
    pub redo: Vec<HistoryEntry>,
    pub can_undo: bool,
    pub can_redo: bool,
    pub step_groups: usize,
    pub payloads: usize,
    pub progress_events: usize,
    pub rows: Vec<String>,
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to create history context: {0}")]
    Context(#[from] pigment_cas::CasError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error(transparent)]
    Execute(ExecuteError),

    #[error("failed to record stroke: {0}")]
    Stroke(#[from] PatchError),

    #[error("history function '{0}' finished without reporting a result")]
    NoResult(String),
}

/// Tracks what a toolbar would show.
#[derive(Default)]
struct StatusBar {
    status: HistoryStatus,
    step_groups: usize,
}

#[derive(Clone, Default)]
struct SharedStatus(Rc<RefCell<StatusBar>>);

impl HistoryObserver<Canvas> for SharedStatus {
    fn changed(&mut self, status: HistoryStatus) {
        self.0.borrow_mut().status = status;
    }

    fn finished_step_group(&mut self) {
        self.0.borrow_mut().step_groups += 1;
    }
}

/// A canvas with an undo history, driven one [`Step`] at a time.
pub struct Session {
    ctx: Arc<HistoryContext>,
    stack: HistoryStack<Canvas>,
    canvas: SharedWorkspace<Canvas>,
    sink: EventSink<Canvas>,
    status: SharedStatus,
    progress_events: Rc<RefCell<usize>>,
}

impl Session {
    pub fn new(config: HistoryConfig, width: u32, height: u32, background: u32) -> Result<Self, SessionError> {
        let sink = EventSink::from_config(&config);
        let ctx = Arc::new(HistoryContext::new(config)?);
        let mut session = Self {
            ctx,
            stack: HistoryStack::new(),
            canvas: shared_workspace(Canvas::new(width, height, background)),
            sink,
            status: SharedStatus::default(),
            progress_events: Rc::new(RefCell::new(0)),
        };
        session.stack.subscribe(session.status.clone());

        let progress = Rc::clone(&session.progress_events);
        session.sink.listen(move |event| {
            if let FunctionEvent::Progress { execution, percent } = event {
                *progress.borrow_mut() += 1;
                tracing::debug!(execution = %execution.short(), percent = percent.clamp(0.0, 100.0), "progress");
            }
        });
        Ok(session)
    }

    pub fn canvas(&self) -> &SharedWorkspace<Canvas> {
        &self.canvas
    }

    pub fn stack(&self) -> &HistoryStack<Canvas> {
        &self.stack
    }

    pub fn context(&self) -> &Arc<HistoryContext> {
        &self.ctx
    }

    pub fn run(&mut self, step: &Step) -> Result<StepOutcome, SessionError> {
        tracing::debug!(step = %step, "running step");
        match step {
            Step::Fill { rect, color } => self.run_async(ops::fill(Arc::clone(&self.ctx), *rect, *color), false),
            Step::CancelFill { rect, color } => {
                self.run_async(ops::fill(Arc::clone(&self.ctx), *rect, *color), true)
            }
            Step::Clear { rects, color } => {
                let mut function = ops::clear_regions(Arc::clone(&self.ctx), rects.clone(), *color);
                let result = function.execute(&mut self.canvas.lock());
                self.record(result, false)
            }
            Step::Stroke { points, color } => {
                let dabs = match ops::stroke(&self.ctx, &mut self.canvas.lock(), points, *color) {
                    Ok(dabs) => dabs,
                    Err(PatchError::Canvas(e)) => {
                        tracing::warn!("stroke rejected: {}", e);
                        return Ok(StepOutcome::Failed { message: e.to_string() });
                    }
                    Err(e) => return Err(e.into()),
                };
                let entries = dabs.len();
                for dab in dabs {
                    self.stack.push_new_memento(dab);
                }
                Ok(StepOutcome::Recorded {
                    name: "Brush".to_string(),
                    entries,
                })
            }
            Step::SelectTool(tool) => {
                self.canvas.lock().select_tool(*tool);
                Ok(StepOutcome::ToolSelected { tool: tool.to_string() })
            }
            Step::Undo => self.step_once(StepDirection::Backward),
            Step::Redo => self.step_once(StepDirection::Forward),
            Step::Rewind => {
                let count = self.stack.undo_stack().len();
                self.stack.rewind(&mut self.canvas.lock())?;
                Ok(stepped(StepDirection::Backward, count))
            }
            Step::FastForward => {
                let count = self.stack.redo_stack().len();
                self.stack.fast_forward(&mut self.canvas.lock())?;
                Ok(stepped(StepDirection::Forward, count))
            }
        }
    }

    pub fn summary(&self) -> Summary {
        let canvas = self.canvas.lock();
        let status = self.status.0.borrow();
        Summary {
            width: canvas.width(),
            height: canvas.height(),
            undo: self.stack.undo_stack().iter().map(HistoryEntry::of).collect(),
            redo: self.stack.redo_stack().iter().map(HistoryEntry::of).collect(),
            can_undo: status.status.can_undo(),
            can_redo: status.status.can_redo(),
            step_groups: status.step_groups,
            payloads: self.ctx.store().len(),
            progress_events: *self.progress_events.borrow(),
            rows: canvas.rows_hex(),
        }
    }

    fn step_once(&mut self, direction: StepDirection) -> Result<StepOutcome, SessionError> {
        let mut canvas = self.canvas.lock();
        match direction {
            StepDirection::Backward if self.stack.can_undo() => self.stack.step_backward(&mut canvas)?,
            StepDirection::Forward if self.stack.can_redo() => self.stack.step_forward(&mut canvas)?,
            _ => return Ok(StepOutcome::Nothing),
        }
        Ok(stepped(direction, 1))
    }

    fn run_async(&mut self, mut function: HistoryFunction<Canvas>, cancel: bool) -> Result<StepOutcome, SessionError> {
        let slot: Rc<RefCell<Option<Finished<Canvas>>>> = Rc::new(RefCell::new(None));
        let on_finished = {
            let slot = Rc::clone(&slot);
            move |finished| *slot.borrow_mut() = Some(finished)
        };

        {
            // The worker cannot reach its first checkpoint until this guard drops.
            let _held = cancel.then(|| self.canvas.lock());
            function.begin_execute(&mut self.sink, Arc::clone(&self.canvas), on_finished)?;
            if cancel {
                function.request_cancel()?;
            }
        }
        self.sink.dispatch_blocking();
        function.wait();

        let finished = slot
            .borrow_mut()
            .take()
            .ok_or_else(|| SessionError::NoResult(function.name().to_string()))?;
        let cancelled = finished.status() == FinishStatus::Cancelled;
        self.record(finished.result, cancelled)
    }

    fn record(
        &mut self,
        result: Result<Option<Memento<Canvas>>, ExecuteError>,
        cancelled: bool,
    ) -> Result<StepOutcome, SessionError> {
        match result {
            Ok(Some(memento)) => {
                let name = memento.name().to_string();
                self.stack.push_new_memento(memento);
                Ok(StepOutcome::Recorded { name, entries: 1 })
            }
            Ok(None) if cancelled => Ok(StepOutcome::Cancelled),
            Ok(None) => Ok(StepOutcome::NoOp),
            Err(ExecuteError::NonFatal(e)) => {
                tracing::warn!("operation failed: {}", e.message());
                Ok(StepOutcome::Failed {
                    message: e.message().to_string(),
                })
            }
            Err(e) => Err(SessionError::Execute(e)),
        }
    }
}

fn stepped(direction: StepDirection, count: usize) -> StepOutcome {
    StepOutcome::Stepped {
        direction: direction.to_string(),
        count,
    }
}
