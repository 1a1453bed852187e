use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_core::AccountId;

use crate::Role;

/// JWT claims model (transport-agnostic).
///
/// This is the minimal set of claims the storefront expects once a token has
/// been decoded/verified. Timestamps use the registered `iat`/`exp` names and
/// are encoded as seconds since the epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account the token was issued to.
    #[serde(rename = "user_id")]
    pub account_id: AccountId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub role: Role,

    /// Issued-at timestamp.
    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
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

    #[error("malformed or unsigned token: {0}")]
    Malformed(String),
}

/// Deterministically validate JWT claims.
///
/// Note: this validates the *claims* only. Signature verification lives in
/// [`crate::jwt`].
pub fn validate_claims(claims: &Claims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
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
    use chrono::{Duration, TimeZone};

    fn claims_at(issued: DateTime<Utc>, ttl: Duration) -> Claims {
        Claims {
            account_id: AccountId::new(),
            email: None,
            role: Role::Customer,
            issued_at: issued,
            expires_at: issued + ttl,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn accepts_inside_window() {
        let c = claims_at(t0(), Duration::hours(24));
        assert_eq!(validate_claims(&c, t0() + Duration::minutes(5)), Ok(()));
    }

    #[test]
    fn rejects_expired_and_future_tokens() {
        let c = claims_at(t0(), Duration::hours(1));
        assert_eq!(
            validate_claims(&c, t0() + Duration::hours(1)),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&c, t0() - Duration::seconds(1)),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn rejects_inverted_window() {
        let c = claims_at(t0(), Duration::zero());
        assert_eq!(validate_claims(&c, t0()), Err(TokenValidationError::InvalidTimeWindow));
    }

    #[test]
    fn uses_registered_claim_names_on_the_wire() {
        let c = claims_at(t0(), Duration::hours(1));
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["role"], "customer");
        assert_eq!(v["iat"], t0().timestamp());
        assert_eq!(v["exp"], (t0() + Duration::hours(1)).timestamp());
        assert!(v.get("email").is_none());
    }
}
