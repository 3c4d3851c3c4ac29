//! Errors reported by the fallible container operations.
//!
//! Index preconditions on the panicking API (`set`, `insert`, `Index`) are
//! checked with assertions; the `try_*` variants return these errors
//! instead. No failed operation leaves a container partially modified.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// An index argument was outside `0..len` (or `0..=len` for insertion).
    #[error("index {index} out of bounds for length {len}")]
    OutOfBounds { index: usize, len: usize },

    /// A required lookup missed. The string names the missing key or value.
    #[error("not found: {0}")]
    NotFound(String),

    /// A strict insert collided with an existing key holding a different
    /// value. The string names the key.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
}
