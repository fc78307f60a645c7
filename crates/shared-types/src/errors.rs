//! Entity-level error types.

use thiserror::Error;

/// Errors raised while parsing entity values from external input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityError {
    /// Not a 64-character hex string.
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    /// Not a valid address shape.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}
