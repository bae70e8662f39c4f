//! History functions run on worker threads, reporting back through an
//! event sink on the owner thread.

mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc;
use std::sync::Arc;

use common::{Ledger, context, set_cell};
use pigment_history::{
    ActionFlags, EventSink, ExecuteError, ExecutionContext, FinishStatus, Finished, FunctionEvent, FunctionFault,
    HistoryContext, HistoryFunction, HistoryStack, UsageError, shared_workspace,
};

type Slot = Rc<RefCell<Option<Finished<Ledger>>>>;

fn slot() -> Slot {
    Rc::new(RefCell::new(None))
}

fn store_into(slot: &Slot) -> impl FnOnce(Finished<Ledger>) + 'static {
    let slot = Rc::clone(slot);
    move |finished| *slot.borrow_mut() = Some(finished)
}

/// A body that pauses at a checkpoint until the test lets it continue, then
/// writes `value` into cell 0 inside its critical region.
fn gated_write(
    ctx: Arc<HistoryContext>,
    value: i64,
    flags: ActionFlags,
) -> (HistoryFunction<Ledger>, mpsc::Receiver<()>, mpsc::Sender<()>) {
    let (reached_tx, reached_rx) = mpsc::channel();
    let (resume_tx, resume_rx) = mpsc::channel::<()>();
    let function = HistoryFunction::from_fn("Write", flags, move |cx: &ExecutionContext<Ledger>, ledger: &mut Ledger| {
        reached_tx.send(()).ok();
        resume_rx.recv().ok();
        if cx.please_cancel() {
            return Ok(None);
        }
        cx.enter_critical_region();
        Ok(Some(set_cell(&ctx, ledger, 0, value, "Write")))
    });
    (function, reached_rx, resume_tx)
}

// ============================================================================
// Completion
// ============================================================================

#[test]
fn test_async_result_is_delivered_on_dispatch() {
    let ctx = context();
    let workspace = shared_workspace(Ledger::with_cells(&[0]));
    let mut sink = EventSink::new();
    let result = slot();

    let (mut function, reached, resume) = gated_write(Arc::clone(&ctx), 42, ActionFlags::empty());
    function.begin_execute(&mut sink, Arc::clone(&workspace), store_into(&result)).unwrap();
    reached.recv().unwrap();
    resume.send(()).unwrap();

    function.wait();
    // Nothing is delivered until the owner dispatches.
    assert!(result.borrow().is_none());
    assert!(sink.dispatch_pending() >= 1);

    let finished = result.borrow_mut().take().unwrap();
    assert_eq!(finished.status(), FinishStatus::Completed);
    assert_eq!(finished.execution, function.execution());
    let memento = finished.result.unwrap().unwrap();

    let mut stack = HistoryStack::new();
    stack.push_new_memento(memento);
    let mut ledger = workspace.lock();
    assert_eq!(ledger.cells, [42]);
    stack.step_backward(&mut ledger).unwrap();
    assert_eq!(ledger.cells, [0]);
}

#[test]
fn test_execute_twice_faults_even_after_async() {
    let ctx = context();
    let workspace = shared_workspace(Ledger::with_cells(&[0]));
    let mut sink = EventSink::new();
    let (mut function, reached, resume) = gated_write(ctx, 1, ActionFlags::empty());

    function.begin_execute(&mut sink, Arc::clone(&workspace), |_| {}).unwrap();
    assert!(matches!(
        function.begin_execute(&mut sink, Arc::clone(&workspace), |_| {}),
        Err(UsageError::AlreadyExecuting(_))
    ));

    reached.recv().unwrap();
    resume.send(()).unwrap();
    sink.dispatch_blocking();

    let mut ledger = workspace.lock();
    assert!(matches!(
        function.execute(&mut ledger),
        Err(ExecuteError::Usage(UsageError::AlreadyExecuted(_)))
    ));
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn test_cancel_before_checkpoint_leaves_workspace_unchanged() {
    let ctx = context();
    let workspace = shared_workspace(Ledger::with_cells(&[7]));
    let mut sink = EventSink::new();
    let events = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&events);
    sink.listen(move |event| seen.borrow_mut().push(event.clone()));
    let result = slot();

    let (mut function, reached, resume) = gated_write(ctx, 99, ActionFlags::CANCELLABLE);
    function.begin_execute(&mut sink, Arc::clone(&workspace), store_into(&result)).unwrap();
    reached.recv().unwrap();
    function.request_cancel().unwrap();
    resume.send(()).unwrap();

    sink.dispatch_blocking();
    function.wait();

    let finished = result.borrow_mut().take().unwrap();
    assert!(finished.was_cancelled());
    assert_eq!(finished.status(), FinishStatus::Cancelled);
    assert!(matches!(finished.result, Ok(None)));
    assert_eq!(workspace.lock().cells, [7]);

    let execution = function.execution();
    assert_eq!(
        *events.borrow(),
        vec![
            FunctionEvent::CancelRequested { execution },
            FunctionEvent::Finished {
                execution,
                status: FinishStatus::Cancelled
            },
        ]
    );
}

#[test]
fn test_cancel_inside_critical_region_is_ignored() {
    let ctx = context();
    let workspace = shared_workspace(Ledger::with_cells(&[0]));
    let mut sink = EventSink::new();
    let result = slot();
    let (reached_tx, reached_rx) = mpsc::channel();
    let (resume_tx, resume_rx) = mpsc::channel::<()>();

    let mut function = HistoryFunction::from_fn(
        "Commit",
        ActionFlags::CANCELLABLE,
        move |cx: &ExecutionContext<Ledger>, ledger: &mut Ledger| {
            cx.enter_critical_region();
            reached_tx.send(()).ok();
            resume_rx.recv().ok();
            assert!(!cx.please_cancel());
            assert!(cx.cancellation_token().is_cancelled());
            Ok(Some(set_cell(&ctx, ledger, 0, 5, "Commit")))
        },
    );
    function.begin_execute(&mut sink, Arc::clone(&workspace), store_into(&result)).unwrap();
    reached_rx.recv().unwrap();
    function.request_cancel().unwrap();
    assert!(function.is_cancel_requested());
    resume_tx.send(()).unwrap();
    sink.dispatch_blocking();

    let finished = result.borrow_mut().take().unwrap();
    assert!(finished.cancel_requested);
    assert!(!finished.was_cancelled());
    assert_eq!(finished.status(), FinishStatus::Completed);
    assert_eq!(workspace.lock().cells, [5]);
}

#[test]
fn test_cancel_rules() {
    let ctx = context();
    let (plain, _, _) = gated_write(Arc::clone(&ctx), 1, ActionFlags::empty());
    assert!(matches!(plain.request_cancel(), Err(UsageError::NotCancellable(_))));

    let (not_started, _, _) = gated_write(ctx, 1, ActionFlags::CANCELLABLE);
    assert!(matches!(not_started.request_cancel(), Err(UsageError::NotExecutingAsync(_))));
}

// ============================================================================
// Faults
// ============================================================================

fn failing(critical_first: bool) -> HistoryFunction<Ledger> {
    HistoryFunction::from_fn(
        "Resize",
        ActionFlags::empty(),
        move |cx: &ExecutionContext<Ledger>, ledger: &mut Ledger| {
            if critical_first {
                cx.enter_critical_region();
                ledger.cells[0] = -1;
            }
            Err(FunctionFault::OutOfMemory { requested: 1 << 40 })
        },
    )
}

#[test]
fn test_out_of_memory_before_critical_region_is_non_fatal() {
    let workspace = shared_workspace(Ledger::with_cells(&[3]));
    let mut sink = EventSink::new();
    let result = slot();

    let mut function = failing(false);
    function.begin_execute(&mut sink, Arc::clone(&workspace), store_into(&result)).unwrap();
    sink.dispatch_blocking();

    let finished = result.borrow_mut().take().unwrap();
    assert_eq!(finished.status(), FinishStatus::NonFatal);
    let err = finished.result.unwrap_err();
    let non_fatal = err.as_non_fatal().unwrap();
    assert!(matches!(non_fatal.cause(), Some(FunctionFault::OutOfMemory { .. })));
    assert_eq!(non_fatal.message(), pigment_history::GENERIC_FAILURE_MESSAGE);
    assert_eq!(workspace.lock().cells, [3]);
}

#[test]
fn test_out_of_memory_inside_critical_region_is_fatal() {
    let workspace = shared_workspace(Ledger::with_cells(&[3]));
    let mut sink = EventSink::new();
    let result = slot();

    let mut function = failing(true);
    function.begin_execute(&mut sink, Arc::clone(&workspace), store_into(&result)).unwrap();
    sink.dispatch_blocking();

    let finished = result.borrow_mut().take().unwrap();
    assert_eq!(finished.status(), FinishStatus::Fatal);
    assert!(matches!(
        finished.result,
        Err(ExecuteError::Fatal(FunctionFault::OutOfMemory { .. }))
    ));
}

#[test]
fn test_synchronous_fault_classification_matches_async() {
    let mut ledger = Ledger::with_cells(&[3]);
    assert!(matches!(failing(false).execute(&mut ledger), Err(ExecuteError::NonFatal(_))));
    assert!(matches!(failing(true).execute(&mut ledger), Err(ExecuteError::Fatal(_))));
}

#[test]
fn test_worker_panic_is_fatal() {
    let workspace = shared_workspace(Ledger::with_cells(&[0]));
    let mut sink = EventSink::new();
    let result = slot();

    let mut function = HistoryFunction::from_fn(
        "Explode",
        ActionFlags::empty(),
        |_cx: &ExecutionContext<Ledger>, _ledger: &mut Ledger| panic!("kaboom"),
    );
    function.begin_execute(&mut sink, Arc::clone(&workspace), store_into(&result)).unwrap();
    sink.dispatch_blocking();
    function.wait();

    let finished = result.borrow_mut().take().unwrap();
    match finished.result {
        Err(ExecuteError::Fatal(FunctionFault::Panicked(message))) => assert_eq!(message, "kaboom"),
        other => panic!("expected a panic fault, got {:?}", other.map(|m| m.map(|m| m.id()))),
    }
    // parking_lot mutexes do not poison.
    assert_eq!(workspace.lock().cells, [0]);
}

// ============================================================================
// Progress
// ============================================================================

#[test]
fn test_progress_is_forwarded_raw_and_in_order() {
    let workspace = shared_workspace(Ledger::with_cells(&[0]));
    let mut sink = EventSink::new();
    let progress = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&progress);
    sink.listen(move |event| {
        if let FunctionEvent::Progress { percent, .. } = event {
            seen.borrow_mut().push(*percent);
        }
    });

    let mut function = HistoryFunction::from_fn(
        "Blur",
        ActionFlags::REPORTS_PROGRESS,
        |cx: &ExecutionContext<Ledger>, _ledger: &mut Ledger| {
            for percent in [10.0, 55.0, 40.0, 120.0] {
                cx.report_progress(percent);
            }
            Ok(None)
        },
    );
    function.begin_execute(&mut sink, workspace, |_| {}).unwrap();
    sink.dispatch_blocking();

    assert_eq!(*progress.borrow(), [10.0, 55.0, 40.0, 120.0]);
    assert_eq!(sink.outstanding(), 0);
}
