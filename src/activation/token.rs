use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_VERSION: u8 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivationTokenHeader {
    pub alg: String,
    pub typ: String,
}

impl ActivationTokenHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Claims carried by an activation token.
///
/// `secret` is the derived password secret, never the raw password. The token
/// is self-contained: a verifier holding the same key needs no state lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivationClaims {
    pub v: u8,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub name: String,
    pub email: String,
    pub secret: String,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signing key")]
    Key,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("invalid token version")]
    InvalidVersion,
}

impl Error {
    /// Expiry is the only verification failure callers are allowed to
    /// distinguish; everything else collapses into "invalid token".
    #[must_use]
    pub const fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Create an HS256 signed activation token.
///
/// # Errors
///
/// Returns an error if the key is rejected by HMAC or claims/header JSON
/// cannot be encoded.
pub fn sign_hs256(key: &[u8], claims: &ActivationClaims) -> Result<String, Error> {
    let header_b64 = b64e_json(&ActivationTokenHeader::hs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| Error::Key)?;
    mac.update(signing_input.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify an HS256 activation token and return its decoded claims.
///
/// Signature is checked before any claim is trusted; expiry uses the given
/// `now` with `leeway_seconds` of clock-skew tolerance.
///
/// # Errors
///
/// Returns an error if:
/// - the token is malformed or contains invalid base64/json,
/// - the signature does not match the key,
/// - the claims fail validation (`v`, `iss`, `exp`).
pub fn verify_hs256(
    token: &str,
    key: &[u8],
    expected_issuer: &str,
    now_unix_seconds: i64,
    leeway_seconds: i64,
) -> Result<ActivationClaims, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    let header: ActivationTokenHeader = b64d_json(header_b64)?;
    if header.alg != "HS256" {
        return Err(Error::UnsupportedAlg(header.alg));
    }

    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| Error::Key)?;
    mac.update(signing_input.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: ActivationClaims = b64d_json(claims_b64)?;
    if claims.v != TOKEN_VERSION {
        return Err(Error::InvalidVersion);
    }
    if claims.iss != expected_issuer {
        return Err(Error::InvalidIssuer);
    }
    if claims.exp + leeway_seconds <= now_unix_seconds {
        return Err(Error::Expired);
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &[u8] = b"registro-test-signing-key-0123456789";

    // Fixed claims for stable vectors.
    const NOW: i64 = 1_700_000_000;

    fn test_claims(jti: &str) -> ActivationClaims {
        ActivationClaims {
            v: TOKEN_VERSION,
            iss: "https://registro.example.test".to_string(),
            iat: NOW,
            exp: NOW + 600,
            jti: jti.to_string(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            secret: "c2FsdA.aGFzaA".to_string(),
        }
    }

    #[test]
    fn sign_and_verify_round_trip() -> Result<(), Error> {
        let token = sign_hs256(TEST_KEY, &test_claims("jti-1"))?;
        let verified = verify_hs256(&token, TEST_KEY, "https://registro.example.test", NOW, 0)?;
        assert_eq!(verified, test_claims("jti-1"));
        Ok(())
    }

    #[test]
    fn signing_is_deterministic() -> Result<(), Error> {
        // HS256 over fixed claims must always produce the same token, so any
        // verifier holding the same key accepts it.
        let first = sign_hs256(TEST_KEY, &test_claims("jti-2"))?;
        let second = sign_hs256(TEST_KEY, &test_claims("jti-2"))?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn rejects_tampered_signed_region() -> Result<(), Error> {
        let token = sign_hs256(TEST_KEY, &test_claims("jti-3"))?;

        // Flip one byte at a time across the signed region; every mutation
        // must fail verification with a non-expiry error.
        for index in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[index] ^= 0x01;
            let Ok(tampered) = String::from_utf8(bytes) else {
                continue;
            };
            let result = verify_hs256(
                &tampered,
                TEST_KEY,
                "https://registro.example.test",
                NOW,
                0,
            );
            assert!(result.is_err(), "tampered byte {index} was accepted");
            if let Err(err) = result {
                assert!(!err.is_expired());
            }
        }
        Ok(())
    }

    #[test]
    fn rejects_wrong_key() -> Result<(), Error> {
        let token = sign_hs256(TEST_KEY, &test_claims("jti-4"))?;
        let result = verify_hs256(
            &token,
            b"another-key-entirely",
            "https://registro.example.test",
            NOW,
            0,
        );
        assert!(matches!(result, Err(Error::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn rejects_expired_or_wrong_issuer() -> Result<(), Error> {
        let token = sign_hs256(TEST_KEY, &test_claims("jti-5"))?;

        let result = verify_hs256(&token, TEST_KEY, "https://other.example.test", NOW, 0);
        assert!(matches!(result, Err(Error::InvalidIssuer)));

        let result = verify_hs256(
            &token,
            TEST_KEY,
            "https://registro.example.test",
            NOW + 601,
            0,
        );
        assert!(matches!(result, Err(Error::Expired)));

        Ok(())
    }

    #[test]
    fn leeway_tolerates_skewed_clocks() -> Result<(), Error> {
        let token = sign_hs256(TEST_KEY, &test_claims("jti-6"))?;

        // exp + leeway must stay strictly ahead of now.
        let at_boundary = verify_hs256(
            &token,
            TEST_KEY,
            "https://registro.example.test",
            NOW + 600 + 30,
            30,
        );
        assert!(matches!(at_boundary, Err(Error::Expired)));

        let within_leeway = verify_hs256(
            &token,
            TEST_KEY,
            "https://registro.example.test",
            NOW + 600 + 29,
            30,
        );
        assert!(within_leeway.is_ok());
        Ok(())
    }

    #[test]
    fn rejects_foreign_algorithms() -> Result<(), Error> {
        let token = sign_hs256(TEST_KEY, &test_claims("jti-7"))?;
        let claims_and_sig = token
            .split_once('.')
            .map(|(_, rest)| rest.to_string())
            .ok_or(Error::TokenFormat)?;

        let header = ActivationTokenHeader {
            alg: "none".to_string(),
            typ: "JWT".to_string(),
        };
        let forged = format!("{}.{claims_and_sig}", b64e_json(&header)?);
        let result = verify_hs256(
            &forged,
            TEST_KEY,
            "https://registro.example.test",
            NOW,
            0,
        );
        // Either the alg check or the signature check must reject it.
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn rejects_wrong_version() -> Result<(), Error> {
        let mut claims = test_claims("jti-8");
        claims.v = 2;
        let token = sign_hs256(TEST_KEY, &claims)?;
        let result = verify_hs256(&token, TEST_KEY, "https://registro.example.test", NOW, 0);
        assert!(matches!(result, Err(Error::InvalidVersion)));
        Ok(())
    }

    #[test]
    fn rejects_trailing_parts() -> Result<(), Error> {
        let token = sign_hs256(TEST_KEY, &test_claims("jti-9"))?;
        let result = verify_hs256(
            &format!("{token}.extra"),
            TEST_KEY,
            "https://registro.example.test",
            NOW,
            0,
        );
        assert!(matches!(result, Err(Error::TokenFormat)));
        Ok(())
    }
}
