/// Stateless session credentials
///
/// A session is an HS256 JWT carrying the account id. Nothing is stored
/// server-side: verification depends only on the secret, the token and
/// the current time, so a credential stays valid until its `exp`.
use crate::error::{NoteError, NoteResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a bearer credential is rejected
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("No token")]
    Missing,
    #[error("Invalid token")]
    Invalid,
    #[error("Token has expired")]
    Expired,
}

/// Claims embedded in a session credential
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// Account id
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies session credentials with a shared secret
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl SessionKeys {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // A token is still good at exactly `exp`, and not a second later.
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Mint a credential for `account_id` valid for `ttl` from now
    pub fn issue(&self, account_id: &str, email: Option<&str>, ttl: Duration) -> NoteResult<String> {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: account_id.to_string(),
            email: email.map(str::to_string),
            iat: now,
            exp: now + ttl.num_seconds(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| NoteError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Check signature and expiry, returning the embedded claims
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Session verification failed: {}", e);
                match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Invalid,
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-for-testing-only";

    #[test]
    fn test_issue_and_verify() {
        let keys = SessionKeys::new(SECRET);
        let token = keys.issue("acc-1", None, Duration::hours(2)).unwrap();

        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, "acc-1");
        assert_eq!(claims.email, None);
        assert_eq!(claims.exp - claims.iat, 7200);
    }

    #[test]
    fn test_email_claim_round_trips() {
        let keys = SessionKeys::new(SECRET);
        let token = keys
            .issue("acc-2", Some("b@x.com"), Duration::hours(1))
            .unwrap();

        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.email.as_deref(), Some("b@x.com"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = SessionKeys::new(SECRET);
        let token = keys.issue("acc-1", None, Duration::seconds(-5)).unwrap();

        assert_eq!(keys.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let keys = SessionKeys::new(SECRET);
        let token = keys.issue("acc-1", None, Duration::hours(2)).unwrap();

        let (rest, sig) = token.rsplit_once('.').unwrap();
        let flipped = if sig.starts_with('A') { "B" } else { "A" };
        let tampered = format!("{}.{}{}", rest, flipped, &sig[1..]);

        assert_eq!(keys.verify(&tampered), Err(TokenError::Invalid));
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let ours = SessionKeys::new(SECRET);
        let theirs = SessionKeys::new("another-secret-key-that-is-long-enough");
        let token = theirs.issue("acc-1", None, Duration::hours(2)).unwrap();

        assert_eq!(ours.verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_malformed_token_rejected() {
        let keys = SessionKeys::new(SECRET);
        assert_eq!(keys.verify("not-a-jwt"), Err(TokenError::Invalid));
        assert_eq!(keys.verify(""), Err(TokenError::Invalid));
    }
}
