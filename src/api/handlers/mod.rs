//! API handlers and shared signup state.
//!
//! This module organizes the service's route handlers and provides common
//! helpers for email normalization and activation-link construction.

pub mod activate;
pub mod health;
pub mod signup;

pub use activate::activate;
pub use health::health;
pub use signup::signup;

use regex::Regex;

use crate::activation::{TokenIssuer, TokenVerifier};

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Lightweight email sanity check on normalized input. Full field validation
/// is the upstream validator's contract; this only keeps garbage out of the
/// store and the token payload.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Build the activation link included in outbound emails.
#[must_use]
pub fn build_activation_url(base_url: &str, token: &str) -> String {
    let base = base_url.trim_end_matches('/');
    format!("{base}/account-activation#token={token}")
}

/// Shared state for the signup endpoints: the activation-link base plus the
/// issuer/verifier pair built around the process-wide signing key.
#[derive(Debug, Clone)]
pub struct SignupState {
    base_url: String,
    issuer: TokenIssuer,
    verifier: TokenVerifier,
}

impl SignupState {
    #[must_use]
    pub fn new(base_url: String, issuer: TokenIssuer, verifier: TokenVerifier) -> Self {
        Self {
            base_url,
            issuer,
            verifier,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    #[must_use]
    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn build_activation_url_trims_trailing_slash() {
        let url = build_activation_url("https://registro.dev/", "token");
        assert_eq!(url, "https://registro.dev/account-activation#token=token");
    }
}
