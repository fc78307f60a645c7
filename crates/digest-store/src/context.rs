//! Deadline propagation for store calls.
//!
//! Every store operation carries an [`OpContext`] derived from the calling
//! context (an HTTP request timeout, a commit deadline). Expiry surfaces as
//! a retryable [`crate::StoreError::DeadlineExceeded`]; a long-running bulk
//! write or transaction aborts rather than partially committing.

use std::time::{Duration, Instant};

use crate::port::StoreError;

#[derive(Debug, Clone, Copy, Default)]
pub struct OpContext {
    deadline: Option<Instant>,
}

impl OpContext {
    /// Context with no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Errors once the deadline has passed.
    pub fn check(&self) -> Result<(), StoreError> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(StoreError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_never_expires() {
        assert!(OpContext::background().check().is_ok());
    }

    #[test]
    fn test_expired_deadline_errors() {
        let ctx = OpContext::with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(matches!(ctx.check(), Err(StoreError::DeadlineExceeded)));
    }
}
