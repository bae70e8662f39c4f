//! Editing operations, each recorded as history.

use std::sync::Arc;

use pigment_history::{
    ActionFlags, CompoundMemento, ExecutionContext, FunctionBody, FunctionFault, FunctionResult, HistoryContext,
    HistoryFunction, Memento, NonFatalError,
};
use pigment_types::{ImageHandle, SeriesId};

use crate::canvas::{Canvas, CanvasError, Rect, Tool};
use crate::patch::{PatchError, PixelPatch};

/// Largest fill the demo will attempt, in pixels.
pub const MAX_FILL_PIXELS: u64 = 1 << 24;

// ============================================================================
// Fill
// ============================================================================

/// Fill `rect` with `color`. Cancellable until the pixels are written.
pub fn fill(ctx: Arc<HistoryContext>, rect: Rect, color: u32) -> HistoryFunction<Canvas> {
    HistoryFunction::new(
        "Fill",
        ActionFlags::CANCELLABLE | ActionFlags::REPORTS_PROGRESS,
        Fill { ctx, rect, color },
    )
}

struct Fill {
    ctx: Arc<HistoryContext>,
    rect: Rect,
    color: u32,
}

impl FunctionBody<Canvas> for Fill {
    fn on_execute(&mut self, cx: &ExecutionContext<Canvas>, canvas: &mut Canvas) -> FunctionResult<Canvas> {
        let pixels = prepare_fill(cx, canvas, self.rect, self.color)?;
        let Some(pixels) = pixels else {
            return Ok(None);
        };

        let memento = PixelPatch::capture(&self.ctx, canvas, self.rect, "Fill").map_err(patch_fault)?;

        cx.enter_critical_region();
        canvas
            .write(self.rect, &pixels)
            .map_err(|e| FunctionFault::Other(e.into()))?;
        Ok(Some(memento.with_image(ImageHandle::new("Icons.MenuEditFill.png"))))
    }
}

/// Build the fill buffer row by row, stopping early on cancel.
fn prepare_fill(
    cx: &ExecutionContext<Canvas>,
    canvas: &Canvas,
    rect: Rect,
    color: u32,
) -> Result<Option<Vec<u32>>, FunctionFault> {
    let area = rect.area();
    if area > MAX_FILL_PIXELS {
        return Err(FunctionFault::OutOfMemory {
            requested: (area as usize).saturating_mul(std::mem::size_of::<u32>()),
        });
    }
    if !canvas.contains(rect) {
        return Err(FunctionFault::OutOfRange(format!(
            "fill rectangle {rect} is outside the {}x{} canvas",
            canvas.width(),
            canvas.height()
        )));
    }
    if area == 0 {
        return Ok(None);
    }

    let row_len = rect.width as usize;
    let mut pixels = Vec::with_capacity(area as usize);
    for row in 0..rect.height {
        if cx.please_cancel() {
            tracing::info!(execution = %cx.execution(), rows_done = row, "fill cancelled");
            return Ok(None);
        }
        pixels.resize(pixels.len() + row_len, color);
        cx.report_progress(f64::from(row + 1) * 100.0 / f64::from(rect.height));
    }
    Ok(Some(pixels))
}

fn patch_fault(err: PatchError) -> FunctionFault {
    match err {
        PatchError::Canvas(e) => FunctionFault::OutOfRange(e.to_string()),
        PatchError::Store(e) => {
            NonFatalError::new("Not enough disk space to save undo data.")
                .with_cause(FunctionFault::Other(e.into()))
                .into()
        }
    }
}

// ============================================================================
// Clear regions
// ============================================================================

/// Paint several rectangles with `color`, recorded as a single history entry.
pub fn clear_regions(ctx: Arc<HistoryContext>, rects: Vec<Rect>, color: u32) -> HistoryFunction<Canvas> {
    HistoryFunction::from_fn(
        "Clear Regions",
        ActionFlags::empty(),
        move |cx: &ExecutionContext<Canvas>, canvas: &mut Canvas| {
            if rects.is_empty() {
                return Ok(None);
            }
            if let Some(bad) = rects.iter().find(|r| !canvas.contains(**r)) {
                return Err(FunctionFault::OutOfRange(format!("region {bad} is outside the canvas")));
            }

            let mut group = CompoundMemento::default();
            for rect in &rects {
                group.push(PixelPatch::capture(&ctx, canvas, *rect, "Clear").map_err(patch_fault)?);
            }

            cx.enter_critical_region();
            for rect in &rects {
                let pixels = vec![color; rect.area() as usize];
                canvas.write(*rect, &pixels).map_err(|e| FunctionFault::Other(e.into()))?;
            }
            Ok(Some(group.into_memento(&ctx, "Clear Regions")))
        },
    )
}

// ============================================================================
// Brush stroke
// ============================================================================

/// Paint a brush stroke dab by dab, the way an interactive brush records it:
/// one tool memento per dab, all in the same series.
///
/// Every point is checked first; if any lies outside the canvas nothing is
/// painted.
pub fn stroke(
    ctx: &HistoryContext,
    canvas: &mut Canvas,
    points: &[(u32, u32)],
    color: u32,
) -> Result<Vec<Memento<Canvas>>, PatchError> {
    if let Some(&(x, y)) = points.iter().find(|&&(x, y)| !canvas.contains(Rect::point(x, y))) {
        return Err(CanvasError::OutOfBounds {
            rect: Rect::point(x, y),
            width: canvas.width(),
            height: canvas.height(),
        }
        .into());
    }

    canvas.select_tool(Tool::Brush);
    let series = SeriesId::new();
    let mut dabs = Vec::with_capacity(points.len());
    for &(x, y) in points {
        let rect = Rect::point(x, y);
        let memento = PixelPatch::capture(ctx, canvas, rect, "Brush")?
            .in_series(series)
            .for_tool(Tool::Brush.tool_type());
        canvas.write(rect, &[color])?;
        dabs.push(memento);
    }
    tracing::debug!(series = %series.short(), dabs = dabs.len(), "stroke recorded");
    Ok(dabs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pigment_history::{ExecuteError, HistoryStack};

    fn ctx() -> Arc<HistoryContext> {
        Arc::new(HistoryContext::temporary().unwrap())
    }

    #[test]
    fn test_fill_records_patch() {
        let ctx = ctx();
        let mut canvas = Canvas::new(4, 4, 0);
        let rect = Rect::new(1, 1, 2, 2);

        let memento = fill(Arc::clone(&ctx), rect, 0xff0000).execute(&mut canvas).unwrap().unwrap();
        assert_eq!(canvas.read(rect).unwrap(), [0xff0000; 4]);
        assert_eq!(memento.name(), "Fill");
        assert!(memento.image().is_some());

        let mut stack = HistoryStack::new();
        stack.push_new_memento(memento);
        stack.step_backward(&mut canvas).unwrap();
        assert_eq!(canvas.read(rect).unwrap(), [0; 4]);
    }

    #[test]
    fn test_fill_out_of_bounds_is_non_fatal() {
        let ctx = ctx();
        let mut canvas = Canvas::new(2, 2, 0);
        let err = fill(ctx, Rect::new(1, 1, 4, 4), 1).execute(&mut canvas).unwrap_err();
        assert!(matches!(err, ExecuteError::NonFatal(_)));
        assert!(canvas.read(canvas.bounds()).unwrap().iter().all(|p| *p == 0));
    }

    #[test]
    fn test_oversized_fill_is_out_of_memory() {
        let ctx = ctx();
        let mut canvas = Canvas::new(1, 1, 0);
        let err = fill(ctx, Rect::new(0, 0, 1 << 13, 1 << 12), 1).execute(&mut canvas).unwrap_err();
        let cause = err.as_non_fatal().and_then(|e| e.cause());
        assert!(matches!(cause, Some(FunctionFault::OutOfMemory { .. })));
        assert_eq!(canvas.pixel(0, 0), Some(0));
    }

    #[test]
    fn test_empty_fill_is_noop() {
        let ctx = ctx();
        let mut canvas = Canvas::new(2, 2, 0);
        assert!(fill(ctx, Rect::new(0, 0, 0, 2), 1).execute(&mut canvas).unwrap().is_none());
    }

    #[test]
    fn test_clear_regions_is_one_entry() {
        let ctx = ctx();
        let mut canvas = Canvas::new(4, 4, 9);
        let rects = vec![Rect::new(0, 0, 2, 2), Rect::new(1, 1, 2, 2)];
        let memento = clear_regions(Arc::clone(&ctx), rects, 0)
            .execute(&mut canvas)
            .unwrap()
            .unwrap();
        assert_eq!(canvas.pixel(1, 1), Some(0));
        assert_eq!(canvas.pixel(3, 3), Some(9));

        let mut stack = HistoryStack::new();
        stack.push_new_memento(memento);
        assert_eq!(stack.undo_stack().len(), 1);
        stack.step_backward(&mut canvas).unwrap();
        assert!(canvas.read(canvas.bounds()).unwrap().iter().all(|p| *p == 9));
    }

    #[test]
    fn test_stroke_dabs_share_a_series() {
        let ctx = ctx();
        let mut canvas = Canvas::new(4, 1, 0);
        let dabs = stroke(&ctx, &mut canvas, &[(0, 0), (1, 0), (2, 0)], 5).unwrap();
        assert_eq!(dabs.len(), 3);
        let series = dabs[0].series();
        assert!(series.is_some());
        assert!(dabs.iter().all(|d| d.series() == series));
        assert!(dabs.iter().all(|d| d.tool() == Some(&Tool::Brush.tool_type())));
        assert_eq!(canvas.read(canvas.bounds()).unwrap(), [5, 5, 5, 0]);
    }

    #[test]
    fn test_stroke_with_stray_point_paints_nothing() {
        let ctx = ctx();
        let mut canvas = Canvas::new(4, 1, 0);
        let err = stroke(&ctx, &mut canvas, &[(0, 0), (1, 0), (7, 3)], 5).unwrap_err();
        assert!(matches!(
            err,
            PatchError::Canvas(CanvasError::OutOfBounds { rect, .. }) if rect == Rect::point(7, 3)
        ));
        assert_eq!(canvas.read(canvas.bounds()).unwrap(), [0, 0, 0, 0]);
        assert_eq!(canvas.tool(), None);
        assert!(ctx.store().is_empty());
    }
}
