// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for the progression engine.

use thiserror::Error;

use progression_store::StoreError;

/// Engine error type.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EngineError {
    /// Idempotency key collision on a non-manual ledger entry. The event
    /// was already applied; callers should treat this as success and move
    /// on.
    #[error("duplicate activity: {0}")]
    DuplicateActivity(String),

    /// Malformed or disallowed XP amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Challenge evaluated outside its validity window or while inactive.
    #[error("challenge {0} is not active")]
    ChallengeNotActive(u64),

    /// Per-student serialization detected a conflicting concurrent write.
    /// Callers retry the whole logical operation with the same idempotency
    /// key.
    #[error("concurrent update in flight for student {0}")]
    ConcurrencyConflict(String),

    /// The data-access collaborator failed or timed out. Not retried here;
    /// retry policy belongs to the caller.
    #[error("store error: {0}")]
    Store(String),

    /// A bounded recomputation ran past its deadline. Nothing partial was
    /// written.
    #[error("deadline exceeded: {0}")]
    Timeout(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey(key) => Self::DuplicateActivity(key),
            StoreError::NotFound(what) => Self::Store(format!("not found: {what}")),
            StoreError::Unavailable(msg) => Self::Store(msg),
            // `StoreError` is `#[non_exhaustive]`; map any future variants
            // to the generic store error.
            err => Self::Store(err.to_string()),
        }
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
