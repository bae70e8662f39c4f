//! Pixel-patch mementos: the saved contents of a rectangle.

use pigment_cas::CasError;
use pigment_history::{HistoryContext, Inverse, Memento, MementoBody, MementoData, MementoError};

use crate::canvas::{Canvas, CanvasError, Rect};

/// Undoes a change to one rectangle by writing back what it held before.
///
/// The saved pixels live in the memento's payload, so a deep history of large
/// patches costs disk, not memory.
pub struct PixelPatch {
    rect: Rect,
}

impl PixelPatch {
    /// Save what `rect` holds right now. Call before overwriting it.
    pub fn capture(
        ctx: &HistoryContext,
        canvas: &Canvas,
        rect: Rect,
        name: impl Into<String>,
    ) -> Result<Memento<Canvas>, PatchError> {
        let before = canvas.read(rect)?;
        let data = ctx.persist(before)?;
        Ok(Memento::new(ctx, name, PixelPatch { rect }).with_data(data))
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }
}

impl MementoBody<Canvas> for PixelPatch {
    fn on_undo(&mut self, data: &MementoData, canvas: &mut Canvas) -> Result<Inverse<Canvas>, MementoError> {
        let saved = data.require::<Vec<u32>>()?;
        let current = canvas.read(self.rect).map_err(anyhow::Error::from)?;
        canvas.write(self.rect, &saved).map_err(anyhow::Error::from)?;
        tracing::trace!(rect = %self.rect, "patch restored");
        Ok(Inverse::new(PixelPatch { rect: self.rect }).with_data(data.persist_inverse(current)?))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error(transparent)]
    Canvas(#[from] CanvasError),

    #[error("failed to save undo data: {0}")]
    Store(#[from] CasError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_then_undo_restores() {
        let ctx = HistoryContext::temporary().unwrap();
        let mut canvas = Canvas::new(3, 3, 0);
        let rect = Rect::new(0, 0, 2, 1);

        let mut memento = PixelPatch::capture(&ctx, &canvas, rect, "Paint").unwrap();
        canvas.write(rect, &[7, 7]).unwrap();
        memento.flush();

        let mut redo = memento.perform_undo(&mut canvas).unwrap();
        assert_eq!(canvas.read(rect).unwrap(), [0, 0]);
        redo.perform_undo(&mut canvas).unwrap();
        assert_eq!(canvas.read(rect).unwrap(), [7, 7]);
    }

    #[test]
    fn test_capture_out_of_bounds() {
        let ctx = HistoryContext::temporary().unwrap();
        let canvas = Canvas::new(2, 2, 0);
        let err = PixelPatch::capture(&ctx, &canvas, Rect::new(1, 1, 5, 5), "Paint").unwrap_err();
        assert!(matches!(err, PatchError::Canvas(CanvasError::OutOfBounds { .. })));
        assert!(ctx.store().is_empty());
    }
}
