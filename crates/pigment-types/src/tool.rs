//! Tool identity and preview image handles.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Names a kind of tool ("brush", "move-selection").
///
/// Two tools are the same type when their names are equal.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolType(Cow<'static, str>);

impl ToolType {
    /// A tool type known at compile time.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ToolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ToolType({})", self.0)
    }
}

/// Opaque handle to a memento's preview image (a resource name).
///
/// Cheap to clone; the history engine never looks inside it.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageHandle(Arc<str>);

impl ImageHandle {
    pub fn new(resource: impl AsRef<str>) -> Self {
        Self(Arc::from(resource.as_ref()))
    }

    pub fn resource(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_and_owned_tool_types_compare_equal() {
        const BRUSH: ToolType = ToolType::from_static("brush");
        assert_eq!(BRUSH, ToolType::new("brush"));
        assert_ne!(BRUSH, ToolType::new("eraser"));
        assert_eq!(BRUSH.to_string(), "brush");
    }

    #[test]
    fn test_image_handle_clone_shares_resource() {
        let icon = ImageHandle::new("Icons.MenuEditUndo.png");
        let copy = icon.clone();
        assert_eq!(copy.resource(), "Icons.MenuEditUndo.png");
        assert_eq!(icon, copy);
    }

    #[test]
    fn test_image_handle_serializes_as_resource_name() {
        let handle = ImageHandle::new("Icons.MenuEditFill.png");
        let json = serde_json::to_string(&handle).unwrap();
        assert_eq!(json, "\"Icons.MenuEditFill.png\"");
        let back: ImageHandle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, handle);
        assert_eq!(back.resource(), "Icons.MenuEditFill.png");
    }
}
