//! A tiny RGB canvas that the history engine edits.

use pigment_history::HistoryWorkspace;
use pigment_types::ToolType;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// A single pixel.
    pub const fn point(x: u32, y: u32) -> Self {
        Self::new(x, y, 1, 1)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Exclusive right edge, without overflow.
    pub fn right(&self) -> u64 {
        u64::from(self.x) + u64::from(self.width)
    }

    pub fn bottom(&self) -> u64 {
        u64::from(self.y) + u64::from(self.height)
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// Tools the demo canvas knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Tool {
    Brush,
    Eraser,
    MoveSelection,
    Fill,
}

impl Tool {
    pub fn tool_type(self) -> ToolType {
        ToolType::from_static(self.into())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CanvasError {
    #[error("rectangle {rect} is outside the {width}x{height} canvas")]
    OutOfBounds { rect: Rect, width: u32, height: u32 },

    #[error("expected {expected} pixels, got {actual}")]
    SizeMismatch { expected: u64, actual: usize },
}

/// Row-major 0xRRGGBB pixels plus the active tool.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
    tool: Option<Tool>,
    /// Nesting depth of null tools; tool input is suspended while non-zero.
    suspended: usize,
    tool_switches: usize,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: vec![background; len],
            tool: None,
            suspended: 0,
            tool_switches: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    pub fn contains(&self, rect: Rect) -> bool {
        rect.right() <= u64::from(self.width) && rect.bottom() <= u64::from(self.height)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(self.index(x, y)).copied()
    }

    /// Copy out the pixels under `rect`, row by row.
    pub fn read(&self, rect: Rect) -> Result<Vec<u32>, CanvasError> {
        self.check(rect)?;
        let mut out = Vec::with_capacity(rect.area() as usize);
        for y in rect.y..rect.y + rect.height {
            let start = self.index(rect.x, y);
            out.extend_from_slice(&self.pixels[start..start + rect.width as usize]);
        }
        Ok(out)
    }

    /// Overwrite `rect` with `pixels` (row-major, exactly `rect.area()` long).
    pub fn write(&mut self, rect: Rect, pixels: &[u32]) -> Result<(), CanvasError> {
        self.check(rect)?;
        if pixels.len() as u64 != rect.area() {
            return Err(CanvasError::SizeMismatch {
                expected: rect.area(),
                actual: pixels.len(),
            });
        }
        for (row, y) in (rect.y..rect.y + rect.height).enumerate() {
            let start = self.index(rect.x, y);
            let src = &pixels[row * rect.width as usize..(row + 1) * rect.width as usize];
            self.pixels[start..start + rect.width as usize].copy_from_slice(src);
        }
        Ok(())
    }

    pub fn tool(&self) -> Option<Tool> {
        self.tool
    }

    pub fn select_tool(&mut self, tool: Tool) {
        if self.tool != Some(tool) {
            self.tool = Some(tool);
            self.tool_switches += 1;
        }
    }

    /// How many times the active tool has changed.
    pub fn tool_switches(&self) -> usize {
        self.tool_switches
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended > 0
    }

    /// One hex string per row, for printing small canvases.
    pub fn rows_hex(&self) -> Vec<String> {
        self.pixels
            .chunks(self.width.max(1) as usize)
            .map(|row| row.iter().map(|p| format!("{p:06x}")).collect::<Vec<_>>().join(" "))
            .collect()
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn check(&self, rect: Rect) -> Result<(), CanvasError> {
        if self.contains(rect) {
            Ok(())
        } else {
            Err(CanvasError::OutOfBounds {
                rect,
                width: self.width,
                height: self.height,
            })
        }
    }
}

impl HistoryWorkspace for Canvas {
    fn active_tool(&self) -> Option<ToolType> {
        if self.is_suspended() {
            return None;
        }
        self.tool.map(Tool::tool_type)
    }

    fn set_tool(&mut self, tool: &ToolType) {
        match tool.name().parse::<Tool>() {
            Ok(tool) => self.select_tool(tool),
            Err(_) => tracing::warn!(tool = %tool, "canvas has no such tool"),
        }
    }

    fn push_null_tool(&mut self) {
        self.suspended += 1;
    }

    fn pop_null_tool(&mut self) {
        self.suspended = self.suspended.saturating_sub(1);
    }
}
