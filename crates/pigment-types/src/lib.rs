//! Shared identifiers and flags for pigment's history engine.
//!
//! This crate has **no internal pigment dependencies**. It is a pure leaf crate that
//! the payload store and the history engine build on.
//!
//! # Key Types
//!
//! | Type              | Purpose                                      |
//! |-------------------|----------------------------------------------|
//! | [`MementoId`]     | Identity shared by a memento and its inverse |
//! | [`SeriesId`]      | Groups mementos from one continuous gesture  |
//! | [`ExecutionId`]   | One asynchronous function execution          |
//! | [`PayloadKey`]    | One persisted payload in the store           |
//! | [`ToolType`]      | Which tool a memento belongs to              |
//! | [`ImageHandle`]   | Preview image resource for history UIs       |
//! | [`ActionFlags`]   | What a history function promises             |

pub mod flags;
pub mod ids;
pub mod tool;

pub use flags::ActionFlags;
pub use ids::{ExecutionId, MementoId, PayloadKey, SeriesId};
pub use tool::{ImageHandle, ToolType};
