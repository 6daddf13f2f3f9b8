//! HS256 token encoding/decoding.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use aura_core::{AggregateId, TenantId, UserId};

use crate::{JwtClaims, Role, TokenValidationError, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JwtError {
    #[error("malformed or badly signed token: {0}")]
    Decode(String),

    #[error("failed to encode token: {0}")]
    Encode(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Turns a bearer token into verified claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError>;
}

pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry lives in `expires_at` (RFC 3339) and is checked by `validate_claims`.
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|e| JwtError::Decode(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

/// Mints access tokens after a successful login.
pub struct Hs256JwtIssuer {
    key: EncodingKey,
    ttl: Duration,
}

impl Hs256JwtIssuer {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_ref()),
            ttl,
        }
    }

    pub fn issue(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
        roles: Vec<Role>,
        employee_id: Option<AggregateId>,
        now: DateTime<Utc>,
    ) -> Result<(String, JwtClaims), JwtError> {
        let claims = JwtClaims {
            sub: user_id,
            tenant_id,
            roles,
            employee_id,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| JwtError::Encode(e.to_string()))?;
        Ok((token, claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_validates() {
        let issuer = Hs256JwtIssuer::new("s3cret", Duration::minutes(30));
        let validator = Hs256JwtValidator::new("s3cret");
        let now = Utc::now();
        let emp = AggregateId::new();

        let (token, issued) = issuer
            .issue(UserId::new(), TenantId::new(), vec![Role::EMPLOYEE], Some(emp), now)
            .unwrap();
        let decoded = validator.validate(&token, now).unwrap();
        assert_eq!(decoded, issued);
        assert_eq!(decoded.employee_id, Some(emp));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issuer = Hs256JwtIssuer::new("one", Duration::minutes(30));
        let validator = Hs256JwtValidator::new("two");
        let now = Utc::now();
        let (token, _) = issuer
            .issue(UserId::new(), TenantId::new(), vec![], None, now)
            .unwrap();
        assert!(matches!(validator.validate(&token, now), Err(JwtError::Decode(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = Hs256JwtIssuer::new("k", Duration::minutes(1));
        let validator = Hs256JwtValidator::new("k");
        let now = Utc::now();
        let (token, _) = issuer
            .issue(UserId::new(), TenantId::new(), vec![], None, now)
            .unwrap();
        assert_eq!(
            validator.validate(&token, now + Duration::minutes(2)),
            Err(JwtError::Claims(TokenValidationError::Expired))
        );
    }
}
