//! Derived password secrets embedded in activation tokens.
//!
//! The raw password never leaves the signup request: tokens carry a salted
//! one-way digest, and activation stores that digest verbatim.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;

/// Derive the secret stored for an account from the submitted password.
///
/// # Errors
///
/// Returns an error if the system RNG fails to produce a salt.
pub fn derive_password_secret(password: &str) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .context("failed to generate password salt")?;
    Ok(encode_with_salt(&salt, password))
}

fn encode_with_salt(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    format!(
        "{}.{}",
        Base64UrlUnpadded::encode_string(salt),
        Base64UrlUnpadded::encode_string(&digest)
    )
}
