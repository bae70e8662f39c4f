//! Typed identifiers for mementos, gesture series, executions, and payloads.
//!
//! `MementoId` is a plain counter value handed out by a history context; it is
//! never minted from a global. The UUID-backed IDs wrap UUIDv7 (time-ordered,
//! globally unique) and display as standard UUID text for logging. The
//! `short()` form (first 8 hex chars) is for human-facing output only and is never
//! used as a lookup key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one undoable action.
///
/// A memento and every inverse derived from it share the same `MementoId`.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MementoId(u64);

impl MementoId {
    /// Wrap a raw counter value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw counter value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MementoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Debug for MementoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MementoId({})", self.0)
    }
}

/// Correlates the mementos produced by one continuous gesture (e.g. a drag).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeriesId(uuid::Uuid);

/// Names one asynchronous history function execution.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(uuid::Uuid);

/// Names one persisted payload inside a payload store.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayloadKey(uuid::Uuid);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_typed_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Create a new time-ordered ID (UUIDv7).
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// First 8 hex characters. For human display only, not lookup.
            pub fn short(&self) -> String {
                self.0.as_simple().to_string()[..8].to_string()
            }

            /// Full 32-character hex string (no hyphens).
            pub fn to_hex(&self) -> String {
                self.0.as_simple().to_string()
            }

            /// The raw 16 bytes.
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            /// Reconstruct from 16 bytes.
            pub fn from_bytes(b: [u8; 16]) -> Self {
                Self(uuid::Uuid::from_bytes(b))
            }

            /// Parse from a hex string (32 chars, no hyphens) or standard UUID format.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }

        impl Default for $T {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<uuid::Uuid> for $T {
            fn from(u: uuid::Uuid) -> Self {
                Self(u)
            }
        }

        impl From<$T> for uuid::Uuid {
            fn from(id: $T) -> uuid::Uuid {
                id.0
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Full UUID with hyphens for log readability
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.short())
            }
        }
    };
}

impl_typed_id!(SeriesId, "SeriesId");
impl_typed_id!(ExecutionId, "ExecutionId");
impl_typed_id!(PayloadKey, "PayloadKey");

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memento_id_display() {
        let id = MementoId::from_raw(42);
        assert_eq!(id.to_string(), "#42");
        assert_eq!(format!("{:?}", id), "MementoId(42)");
        assert_eq!(id.get(), 42);
    }

    #[test]
    fn test_memento_id_serializes_as_number() {
        let json = serde_json::to_string(&MementoId::from_raw(7)).unwrap();
        assert_eq!(json, "7");
    }

    #[test]
    fn test_new_ids_are_unique() {
        let a = SeriesId::new();
        let b = SeriesId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_debug_shows_type_and_short() {
        let id = ExecutionId::new();
        let debug = format!("{:?}", id);
        assert!(debug.starts_with("ExecutionId("));
        assert!(debug.ends_with(')'));
        let inner = &debug["ExecutionId(".len()..debug.len() - 1];
        assert_eq!(inner.len(), 8);
    }

    #[test]
    fn test_display_is_full_uuid_with_hyphens() {
        let displayed = PayloadKey::new().to_string();
        assert_eq!(displayed.len(), 36);
        assert_eq!(displayed.chars().filter(|c| *c == '-').count(), 4);
    }

    #[test]
    fn test_parse_hex_roundtrip() {
        let key = PayloadKey::new();
        let parsed = PayloadKey::parse(&key.to_hex()).unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn test_from_uuid_preserves_identity() {
        let u = uuid::Uuid::now_v7();
        let id = SeriesId::from(u);
        let back: uuid::Uuid = id.into();
        assert_eq!(u, back);
    }
}
