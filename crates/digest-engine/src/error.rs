//! Engine error taxonomy.
//!
//! Key-shape violations are data-integrity bugs and abort the enclosing
//! Prepare; they are never silently dropped. Store failures pass through
//! unchanged so callers can see whether a retry is worthwhile.

use digest_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A state key did not tokenize into the expected number of parts for
    /// its domain.
    #[error("malformed state key {key:?}: expected {expected} parts, found {found}")]
    KeyShape {
        key: String,
        expected: usize,
        found: usize,
    },

    /// A state payload did not decode into the domain's typed value.
    #[error("malformed state value for {key:?}: {detail}")]
    MalformedValue { key: String, detail: String },

    /// An operation was present in the block but absent from the result
    /// tree.
    #[error("operation {fact_hash} not found in operations tree")]
    MissingOperationResult { fact_hash: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Commit was called before Prepare.
    #[error("session is not prepared")]
    NotPrepared,

    /// The session already committed or closed; sessions are single-use.
    #[error("session is closed")]
    SessionClosed,
}

impl EngineError {
    /// Whether the caller may retry the whole Commit.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Store(e) if e.is_retryable())
    }
}
