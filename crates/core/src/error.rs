//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Only deterministic business failures live here (bad input, broken
/// invariants, stale writes). Storage and transport errors belong to infra.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
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
}

/// Reject blank strings with a field-specific message.
pub fn require_non_blank(field: &str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Minimal email shape check used by users, employees and tenants.
pub fn require_email(field: &str, value: &str) -> DomainResult<()> {
    let v = value.trim();
    match v.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') => Ok(()),
        _ => Err(DomainError::validation(format!("{field} is not a valid email address"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(require_email("email", "hr@acme.io").is_ok());
        assert!(require_email("email", "  hr@acme.io ").is_ok());
        assert!(require_email("email", "hr@acme").is_err());
        assert!(require_email("email", "@acme.io").is_err());
        assert!(require_email("email", "nope").is_err());
    }

    #[test]
    fn blank_is_rejected() {
        let err = require_non_blank("name", "   ").unwrap_err();
        assert_eq!(err, DomainError::validation("name cannot be empty"));
    }
}
