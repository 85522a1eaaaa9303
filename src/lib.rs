//! # Registro (Email-Confirmation Signup)
//!
//! `registro` implements deferred account creation gated by e-mail
//! confirmation. A signup submission never writes to the database: it issues
//! a signed, expiring activation token carrying the pending account data
//! (with a derived password secret, never the raw password) and mails the
//! activation link. The account materializes only when the token is presented
//! back, and at most once per email no matter how often a token is replayed.
//!
//! ## Token model
//!
//! Activation tokens are self-contained HS256 structures signed with a
//! process-wide secret key injected at startup. Any verifier holding the same
//! key can validate them offline; no per-token server state exists. Replay of
//! an already-consumed token is answered by the existence re-check at
//! activation time rather than a consumption ledger.
//!
//! ## Delivery model
//!
//! Confirmation mail is dispatched by a background worker fed through a
//! queue. The signup response completes as soon as the token is issued;
//! delivery failures are retried with backoff and logged, and can never
//! produce a second response for the originating request.

pub mod activation;
pub mod api;
pub mod cli;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
