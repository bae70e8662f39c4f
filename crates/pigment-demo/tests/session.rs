//! End-to-end sessions: scripted steps against a real canvas and payload store.

use pigment_demo::{Session, Step, StepOutcome, Tool};
use pigment_history::HistoryConfig;

const WHITE: u32 = 0xffffff;

fn session(width: u32, height: u32) -> Session {
    Session::new(HistoryConfig::default(), width, height, WHITE).unwrap()
}

fn run(session: &mut Session, step: &str) -> StepOutcome {
    session.run(&step.parse::<Step>().unwrap()).unwrap()
}

fn pixel(session: &Session, x: u32, y: u32) -> u32 {
    session.canvas().lock().pixel(x, y).unwrap()
}

#[test]
fn test_fill_undo_redo() {
    let mut s = session(4, 4);

    let outcome = run(&mut s, "fill:1,1,2,2:ff0000");
    assert_eq!(
        outcome,
        StepOutcome::Recorded {
            name: "Fill".into(),
            entries: 1
        }
    );
    assert_eq!(pixel(&s, 1, 1), 0xff0000);
    assert_eq!(pixel(&s, 0, 0), WHITE);

    run(&mut s, "undo");
    assert_eq!(pixel(&s, 1, 1), WHITE);
    assert!(s.stack().can_redo());

    run(&mut s, "redo");
    assert_eq!(pixel(&s, 2, 2), 0xff0000);
    assert_eq!(s.stack().undo_stack().len(), 1);
    assert!(!s.stack().can_redo());
}

#[test]
fn test_fill_reports_progress_per_row() {
    let mut s = session(4, 4);
    run(&mut s, "fill:0,0,4,3:00ff00");
    assert_eq!(s.summary().progress_events, 3);
}

#[test]
fn test_cancelled_fill_leaves_canvas_alone() {
    let mut s = session(4, 4);

    let outcome = run(&mut s, "cancel-fill:0,0,4,4:0000ff");
    assert_eq!(outcome, StepOutcome::Cancelled);
    assert_eq!(pixel(&s, 0, 0), WHITE);
    assert!(!s.stack().can_undo());
}

#[test]
fn test_out_of_bounds_fill_fails_harmlessly() {
    let mut s = session(4, 4);
    run(&mut s, "fill:0,0,1,1:ff0000");

    let outcome = run(&mut s, "fill:3,3,2,2:00ff00");
    assert!(matches!(outcome, StepOutcome::Failed { .. }));
    assert_eq!(s.stack().undo_stack().len(), 1);
    assert_eq!(pixel(&s, 3, 3), WHITE);
}

#[test]
fn test_clear_regions_is_one_entry() {
    let mut s = session(4, 4);

    run(&mut s, "clear:0,0,1,1;3,3,1,1:000000");
    assert_eq!(pixel(&s, 0, 0), 0);
    assert_eq!(pixel(&s, 3, 3), 0);
    assert_eq!(s.stack().undo_stack().len(), 1);

    run(&mut s, "undo");
    assert_eq!(pixel(&s, 0, 0), WHITE);
    assert_eq!(pixel(&s, 3, 3), WHITE);
}

#[test]
fn test_stroke_records_series_of_tool_mementos() {
    let mut s = session(4, 4);

    let outcome = run(&mut s, "stroke:0,0;1,1;2,2:00ff00");
    assert_eq!(
        outcome,
        StepOutcome::Recorded {
            name: "Brush".into(),
            entries: 3
        }
    );

    let summary = s.summary();
    assert_eq!(summary.undo.len(), 3);
    assert!(summary.undo.iter().all(|e| e.series && e.tool.as_deref() == Some("brush")));
}

#[test]
fn test_undo_stroke_switches_back_to_brush() {
    let mut s = session(4, 4);
    run(&mut s, "stroke:0,0;1,1:00ff00");
    run(&mut s, "tool:eraser");

    run(&mut s, "undo");
    assert_eq!(s.canvas().lock().tool(), Some(Tool::Brush));
    assert_eq!(pixel(&s, 1, 1), WHITE);
    assert_eq!(pixel(&s, 0, 0), 0x00ff00);
}

#[test]
fn test_rewind_and_fast_forward() {
    let mut s = session(2, 2);
    run(&mut s, "fill:0,0,2,2:ff0000");
    run(&mut s, "fill:0,0,1,1:00ff00");
    run(&mut s, "fill:1,1,1,1:0000ff");

    let outcome = run(&mut s, "rewind");
    assert_eq!(
        outcome,
        StepOutcome::Stepped {
            direction: "backward".into(),
            count: 3
        }
    );
    assert!(s.summary().rows.iter().all(|row| row == "ffffff ffffff"));
    assert_eq!(s.stack().redo_stack().len(), 3);

    run(&mut s, "fast-forward");
    assert_eq!(s.summary().rows, vec!["00ff00 ff0000", "ff0000 0000ff"]);
    // Pushing records nothing here; rewind and fast-forward each close one group.
    assert_eq!(s.summary().step_groups, 2);
}

#[test]
fn test_new_edit_discards_redo() {
    let mut s = session(2, 2);
    run(&mut s, "fill:0,0,1,1:ff0000");
    run(&mut s, "fill:1,1,1,1:00ff00");
    run(&mut s, "undo");
    assert!(s.stack().can_redo());

    run(&mut s, "fill:0,1,1,1:0000ff");
    let summary = s.summary();
    assert!(summary.redo.is_empty());
    assert!(!summary.can_redo);
    assert_eq!(summary.undo.len(), 2);
}

#[test]
fn test_undo_with_empty_history_is_nothing() {
    let mut s = session(2, 2);
    assert_eq!(run(&mut s, "undo"), StepOutcome::Nothing);
    assert_eq!(run(&mut s, "redo"), StepOutcome::Nothing);
}

#[test]
fn test_payloads_live_in_configured_directory() {
    let dir = tempfile::tempdir().unwrap();
    let config = HistoryConfig::default().with_payload_dir(dir.path());
    let mut s = Session::new(config, 2, 2, WHITE).unwrap();

    run(&mut s, "fill:0,0,2,2:ff0000");
    assert!(s.summary().payloads >= 1);
    assert!(s.context().store().root().starts_with(dir.path()));
}

#[test]
fn test_summary_serializes() {
    let mut s = session(2, 1);
    run(&mut s, "fill:0,0,1,1:ff0000");

    let json = serde_json::to_value(s.summary()).unwrap();
    assert_eq!(json["undo"][0]["name"], "Fill");
    assert_eq!(json["rows"][0], "ff0000 ffffff");
    assert_eq!(json["can_undo"], true);
}

#[test]
fn test_stroke_leaving_canvas_changes_nothing() {
    let mut s = session(2, 1);

    let outcome = run(&mut s, "stroke:0,0;5,5:ff0000");
    assert!(matches!(outcome, StepOutcome::Failed { ref message } if message.contains("5,5,1,1")));
    assert_eq!(pixel(&s, 0, 0), WHITE);
    assert!(!s.stack().can_undo());
    assert_eq!(s.summary().payloads, 0);
}
