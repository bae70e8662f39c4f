//! Disk-backed payload storage for history mementos.
//!
//! A memento's payload can be large (a patch of pixels, a whole layer). Holding
//! every payload of a deep undo history in memory does not scale, so payloads
//! are written to disk as soon as they are created and released from memory
//! once their memento has been pushed or popped.
//!
//! - [`PayloadStore`]: a directory of blobs addressed by [`PayloadKey`],
//!   integrity-checked with BLAKE3.
//! - [`Persisted`]: one typed value in a store, serialized with postcard,
//!   flushable and re-hydratable.

mod error;
mod persisted;
mod store;

pub use error::CasError;
pub use persisted::Persisted;
pub use pigment_types::PayloadKey;
pub use store::PayloadStore;

/// Result type for payload storage operations.
pub type Result<T> = std::result::Result<T, CasError>;
