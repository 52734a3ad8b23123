//! Storage error shared by every persistence backend.

use std::error::Error as StdError;

/// Errors raised by a storage backend.
///
/// "Not found" is never a `StoreError`: lookups return `Option` so callers can
/// tell a missing record apart from a broken store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend failed while performing `operation`.
    #[error("storage operation '{operation}' failed: {source}")]
    Backend {
        /// Name of the store operation that failed.
        operation: &'static str,
        /// The underlying backend error.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// A lock guarding in-memory state was poisoned by a panicking writer.
    #[error("storage lock poisoned during '{0}'")]
    Poisoned(&'static str),
}

impl StoreError {
    /// Wraps a backend error, tagging it with the failing operation.
    pub fn backend<E>(operation: &'static str, source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self::Backend {
            operation,
            source: source.into(),
        }
    }
}
