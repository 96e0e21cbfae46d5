//! Domain error model.

use thiserror::Error;

/// Result type used across the domain and service layers.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Authentication and capability failures live in `campus-auth`; this enum
/// covers everything that can go wrong once a request has been authorized.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The entity does not exist within the caller's tenant.
    ///
    /// Existence in another tenant is reported the same way.
    #[error("not found")]
    NotFound,

    /// A uniqueness or state conflict (duplicate roll number, already inactive, ...).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A pre-delete guard found active dependents.
    #[error("cascade blocked: {reason}")]
    CascadeBlocked { count: u64, reason: String },

    /// Unexpected failure in the business mutation itself.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn cascade_blocked(count: u64, reason: impl Into<String>) -> Self {
        Self::CascadeBlocked {
            count,
            reason: reason.into(),
        }
    }
}
