//! Error types surfaced to callers of the matching pipeline

use thiserror::Error;

/// Errors that stop a batch before or instead of producing an outcome.
///
/// Per-candidate scoring failures never show up here; they are recorded in
/// the batch outcome instead.
#[derive(Debug, Error)]
pub enum MatchError {
    /// Request rejected before any scoring began.
    #[error("invalid request: {reason}")]
    Validation { reason: String },

    /// A limiter needs between 1 and `ConcurrencyLimiter::MAX_SLOTS` slots.
    #[error("concurrency limit out of range, got {0}")]
    InvalidConcurrency(usize),

    /// The delegated candidate lookup failed.
    #[error("candidate source failed: {0:#}")]
    CandidateSource(#[source] anyhow::Error),
}

impl MatchError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// Returned by the limiter when its batch was canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("batch canceled")]
pub struct Canceled;
