//! Activation token issuance and verification.
//!
//! Both ends of the protocol share one HMAC key, injected at construction
//! time so tests can run with deterministic keys.

pub mod secret;
pub mod token;

pub use secret::derive_password_secret;
pub use token::{ActivationClaims, Error, TOKEN_VERSION, sign_hs256, verify_hs256};

use secrecy::{ExposeSecret, SecretString};
use std::time::SystemTime;
use ulid::Ulid;

/// Signup data pending e-mail confirmation.
///
/// `secret` must already be the derived password secret; issuers never see
/// the raw password.
#[derive(Debug, Clone)]
pub struct PendingSignup {
    pub name: String,
    pub email: String,
    pub secret: String,
}

fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[derive(Debug, Clone)]
pub struct TokenIssuer {
    key: SecretString,
    issuer: String,
    ttl_seconds: i64,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(key: SecretString, issuer: String, ttl_seconds: i64) -> Self {
        Self {
            key,
            issuer,
            ttl_seconds,
        }
    }

    /// Issue a signed activation token for a pending signup.
    ///
    /// The token is self-contained: expiry is absolute (`now + ttl`) and the
    /// payload travels inside the signed region.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be encoded or signed.
    pub fn issue(&self, signup: &PendingSignup) -> Result<String, Error> {
        let now = now_unix_seconds();
        let claims = ActivationClaims {
            v: TOKEN_VERSION,
            iss: self.issuer.clone(),
            iat: now,
            exp: now.saturating_add(self.ttl_seconds),
            jti: Ulid::new().to_string(),
            name: signup.name.clone(),
            email: signup.email.clone(),
            secret: signup.secret.clone(),
        };
        sign_hs256(self.key.expose_secret().as_bytes(), &claims)
    }
}

#[derive(Debug, Clone)]
pub struct TokenVerifier {
    key: SecretString,
    issuer: String,
    leeway_seconds: i64,
}

impl TokenVerifier {
    #[must_use]
    pub fn new(key: SecretString, issuer: String, leeway_seconds: i64) -> Self {
        Self {
            key,
            issuer,
            leeway_seconds,
        }
    }

    /// Verify a presented token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature, issuer, version, or expiry check
    /// fails; expiry respects the configured clock-skew leeway.
    pub fn verify(&self, presented: &str) -> Result<ActivationClaims, Error> {
        verify_hs256(
            presented.trim(),
            self.key.expose_secret().as_bytes(),
            &self.issuer,
            now_unix_seconds(),
            self.leeway_seconds,
        )
    }
}
