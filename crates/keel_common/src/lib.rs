//! Shared foundational types used across the keel build engine.
//!
//! Content hashing for cache keys and change detection, and the internal
//! error type used when an engine invariant is violated.

#![warn(missing_docs)]

pub mod hash;
pub mod result;

pub use hash::{ContentHash, ParseHashError};
pub use result::{InternalError, KeelResult};

/// Version string baked into caches and fingerprints.
pub const KEEL_VERSION: &str = env!("CARGO_PKG_VERSION");
