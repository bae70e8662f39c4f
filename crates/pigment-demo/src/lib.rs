//! A toy raster canvas wired to the pigment history engine.
//!
//! The canvas is deliberately tiny (packed `0xRRGGBB` pixels, a current tool),
//! but every edit goes through the same machinery a real editor would use:
//!
//! - [`patch::PixelPatch`] captures the pixels under a rectangle into the
//!   payload store and swaps them back on undo.
//! - [`ops`] builds history functions (fill, clear regions) and tool
//!   mementos (brush strokes).
//! - [`session::Session`] owns the stack, the event sink, and the shared
//!   canvas, and runs scripted [`session::Step`]s against them.

pub mod canvas;
pub mod ops;
pub mod patch;
pub mod session;

pub use canvas::{Canvas, CanvasError, Rect, Tool};
pub use patch::{PatchError, PixelPatch};
pub use session::{Session, SessionError, Step, StepOutcome, StepParseError, Summary};
