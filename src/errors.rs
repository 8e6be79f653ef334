use std::io;

use thiserror::Error;

use crate::ledger::PoolStatus;

/// Crate-wide error type for pool creation, allocation and claiming.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Invalid pool parameter `{field}`: {reason}")]
    InvalidPoolParameters { field: &'static str, reason: String },

    #[error("Invalid allocation input: {0}")]
    InvalidAllocationInput(String),

    #[error("Pool not found: {0}")]
    PoolNotFound(String),

    #[error("Pool {pool_id} is no longer open ({status})")]
    PoolNotOpen { pool_id: String, status: PoolStatus },

    #[error("Pool {pool_id} is full ({slots} slots taken)")]
    PoolFull { pool_id: String, slots: u32 },

    #[error("Claimant has already claimed from this pool")]
    AlreadyClaimed,

    #[error("Claimant has already claimed from another pool")]
    AlreadyClaimedElsewhere,

    #[error("Owners cannot claim from their own pool")]
    CannotClaimOwnPool,

    #[error("Pool state has changed, please try again")]
    ConcurrentModification,

    #[error("All {total} slots are already filled")]
    SlotsExhausted { total: u32 },

    /// Ledger-level conditional write failure.
    #[error("Version conflict on pool {pool_id}: expected {expected} claims, found {actual}")]
    VersionConflict {
        pool_id: String,
        expected: usize,
        actual: usize,
    },

    /// Conditional status write found the pool in a different state.
    #[error("Status conflict on pool {pool_id}: expected {expected}, found {actual}")]
    StatusConflict {
        pool_id: String,
        expected: PoolStatus,
        actual: PoolStatus,
    },

    #[error("Pool cannot move from {from} to {to}")]
    InvalidStatusTransition { from: PoolStatus, to: PoolStatus },

    #[error("No unused pool token found after {attempts} attempts")]
    TokenSpaceExhausted { attempts: usize },

    #[error("Pool already exists: {0}")]
    DuplicatePool(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PoolError {
    /// Stable machine-readable code for callers that surface errors over a wire.
    pub fn code(&self) -> &'static str {
        match self {
            PoolError::InvalidPoolParameters { .. } => "INVALID_POOL_PARAMETERS",
            PoolError::InvalidAllocationInput(_) => "INVALID_ALLOCATION_INPUT",
            PoolError::PoolNotFound(_) => "POOL_NOT_FOUND",
            PoolError::PoolNotOpen { .. } => "POOL_NOT_OPEN",
            PoolError::PoolFull { .. } => "POOL_FULL",
            PoolError::AlreadyClaimed => "ALREADY_CLAIMED",
            PoolError::AlreadyClaimedElsewhere => "ALREADY_CLAIMED_ELSEWHERE",
            PoolError::CannotClaimOwnPool => "CANNOT_CLAIM_OWN_POOL",
            PoolError::ConcurrentModification => "CONCURRENT_MODIFICATION",
            PoolError::SlotsExhausted { .. } => "SLOTS_EXHAUSTED",
            PoolError::VersionConflict { .. } => "VERSION_CONFLICT",
            PoolError::StatusConflict { .. } => "STATUS_CONFLICT",
            PoolError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            PoolError::TokenSpaceExhausted { .. } => "TOKEN_SPACE_EXHAUSTED",
            PoolError::DuplicatePool(_) => "DUPLICATE_POOL",
            PoolError::Storage(_) => "STORAGE_ERROR",
            PoolError::Serialization(_) => "SERIALIZATION_ERROR",
            PoolError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Whether resubmitting the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PoolError::ConcurrentModification
                | PoolError::VersionConflict { .. }
                | PoolError::StatusConflict { .. }
                | PoolError::Storage(_)
        )
    }
}

impl From<serde_json::Error> for PoolError {
    fn from(err: serde_json::Error) -> Self {
        PoolError::Serialization(err.to_string())
    }
}

impl From<io::Error> for PoolError {
    fn from(err: io::Error) -> Self {
        PoolError::Storage(err.to_string())
    }
}

#[cfg(feature = "sled-store")]
impl From<sled::Error> for PoolError {
    fn from(err: sled::Error) -> Self {
        PoolError::Storage(err.to_string())
    }
}

impl From<config::ConfigError> for PoolError {
    fn from(err: config::ConfigError) -> Self {
        PoolError::Config(err.to_string())
    }
}

pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(PoolError::AlreadyClaimed.code(), "ALREADY_CLAIMED");
        assert_eq!(PoolError::ConcurrentModification.code(), "CONCURRENT_MODIFICATION");
        assert_eq!(
            PoolError::PoolNotOpen {
                pool_id: "p".into(),
                status: PoolStatus::Exhausted
            }
            .code(),
            "POOL_NOT_OPEN"
        );
    }

    #[test]
    fn test_conflicts_and_outages_are_retryable() {
        assert!(PoolError::ConcurrentModification.is_retryable());
        assert!(PoolError::Storage("disk".into()).is_retryable());
        assert!(!PoolError::AlreadyClaimed.is_retryable());
        assert!(!PoolError::PoolFull { pool_id: "p".into(), slots: 3 }.is_retryable());
    }

    #[test]
    fn test_message_names_offending_field() {
        let err = PoolError::InvalidPoolParameters {
            field: "budget",
            reason: "must be at least 1000".into(),
        };
        assert!(err.to_string().contains("budget"));
    }
}
