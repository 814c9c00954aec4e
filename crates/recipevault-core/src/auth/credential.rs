//! Local interpretation of bearer credentials.
//!
//! A credential is three dot-separated base64url segments; the middle one
//! carries a JSON object of claims with an `exp` timestamp in seconds.
//!
//! Expiry is checked here only so the client can prompt for login before
//! sending requests that are bound to fail. It is NOT a security boundary:
//! nothing here verifies the signature, so a tampered credential with a
//! future `exp` still looks valid locally. The backend must reject expired
//! or forged credentials on its own.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

/// Base64url engine that accepts segments with or without `=` padding.
const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Name of the expiry claim (seconds since the Unix epoch)
const EXPIRY_CLAIM: &str = "exp";

/// Decoded claims of a credential payload
pub type Claims = Map<String, Value>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Malformed credential: {0}")]
    MalformedCredential(String),

    #[error("Credential has no expiry claim")]
    MissingExpiryClaim,
}

/// Decode the claims segment of a credential without verifying it.
pub fn decode_claims(credential: &str) -> Result<Claims, CredentialError> {
    let payload = credential
        .split('.')
        .nth(1)
        .ok_or_else(|| CredentialError::MalformedCredential("expected dot-separated segments".into()))?;

    let bytes = BASE64_URL
        .decode(payload)
        .map_err(|e| CredentialError::MalformedCredential(format!("payload is not base64url: {}", e)))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(_) => Err(CredentialError::MalformedCredential(
            "payload is not a JSON object".into(),
        )),
        Err(e) => Err(CredentialError::MalformedCredential(format!(
            "payload is not JSON: {}",
            e
        ))),
    }
}

/// Read the `exp` claim as a point in time.
pub fn expiry(credential: &str) -> Result<DateTime<Utc>, CredentialError> {
    let claims = decode_claims(credential)?;
    let exp = claims.get(EXPIRY_CLAIM).ok_or(CredentialError::MissingExpiryClaim)?;

    let millis = match exp {
        Value::Number(n) => {
            if let Some(secs) = n.as_i64() {
                secs.checked_mul(1000)
            } else {
                n.as_f64()
                    .filter(|secs| secs.is_finite())
                    .map(|secs| (secs * 1000.0) as i64)
            }
        }
        _ => None,
    }
    .ok_or(CredentialError::MissingExpiryClaim)?;

    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or(CredentialError::MissingExpiryClaim)
}

/// Expiry time of a credential, if it can be determined
pub fn expires_at(credential: &str) -> Option<DateTime<Utc>> {
    expiry(credential).ok()
}

/// Whether the credential is expired at `now`.
///
/// Anything that cannot be decoded or has no usable `exp` counts as expired.
pub fn is_expired_at(credential: &str, now: DateTime<Utc>) -> bool {
    match expiry(credential) {
        Ok(expires) => now >= expires,
        Err(_) => true,
    }
}

/// Whether the credential is expired right now
pub fn is_expired(credential: &str) -> bool {
    is_expired_at(credential, Utc::now())
}

/// Time left before the credential expires, zero if already expired or unreadable
pub fn time_until_expiry(credential: &str) -> Duration {
    expires_at(credential)
        .map(|expires| (expires - Utc::now()).max(Duration::zero()))
        .unwrap_or_else(Duration::zero)
}
