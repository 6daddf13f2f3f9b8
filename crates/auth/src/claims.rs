use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use aura_core::{AggregateId, TenantId, UserId};

use crate::Role;

/// Claims carried in an Aura access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Authenticated user.
    pub sub: UserId,

    /// Tenant the login belongs to (`TenantId::system()` for platform operators).
    pub tenant_id: TenantId,

    pub roles: Vec<Role>,

    /// Employee record linked to the login; drives self-service scoping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<AggregateId>,

    pub issued_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Check the time window of already-decoded claims.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(issued: DateTime<Utc>, ttl: Duration) -> JwtClaims {
        JwtClaims {
            sub: UserId::new(),
            tenant_id: TenantId::new(),
            roles: vec![Role::EMPLOYEE],
            employee_id: None,
            issued_at: issued,
            expires_at: issued + ttl,
        }
    }

    #[test]
    fn window_checks() {
        let now = Utc::now();
        assert!(validate_claims(&claims(now, Duration::minutes(5)), now).is_ok());
        assert_eq!(
            validate_claims(&claims(now, Duration::minutes(5)), now + Duration::minutes(5)),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&claims(now + Duration::minutes(1), Duration::minutes(5)), now),
            Err(TokenValidationError::NotYetValid)
        );
        assert_eq!(
            validate_claims(&claims(now, Duration::zero()), now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }
}
