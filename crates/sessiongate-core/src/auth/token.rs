//! Bearer token inspection.
//!
//! Tokens are JWT-shaped: `header.claims.signature`, with the claims segment
//! base64url-encoded JSON carrying an `exp` claim in seconds since the epoch.
//! Signatures are not verified here; the auth service is the authority on
//! validity. This module only answers "has this token run out", and answers
//! "yes" for anything it cannot read.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Token has no claims segment")]
    MissingClaims,

    #[error("Claims segment is not base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Claims are not a JSON object with a numeric exp: {0}")]
    Claims(#[from] serde_json::Error),
}

/// The claims this crate cares about. Everything else in the payload is
/// ignored, whatever its type.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Claims {
    /// Expiry, seconds since the epoch
    pub exp: f64,
}

/// Decode the claims segment of a token
pub fn decode_claims(token: &str) -> Result<Claims, TokenError> {
    let segment = token
        .split('.')
        .nth(1)
        .filter(|s| !s.is_empty())
        .ok_or(TokenError::MissingClaims)?;

    // Accept padded segments too; some issuers keep the '=' tail
    let bytes = URL_SAFE_NO_PAD.decode(segment.trim_end_matches('='))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Expiry instant of a token, if it can be read
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    let claims = decode_claims(token).ok()?;
    if !claims.exp.is_finite() {
        return None;
    }
    DateTime::from_timestamp(claims.exp.floor() as i64, 0)
}

/// True when the token is expired at `now`, or cannot be decoded at all
pub fn is_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    match decode_claims(token) {
        Ok(claims) => {
            let now_secs = now.timestamp_millis() as f64 / 1000.0;
            !claims.exp.is_finite() || claims.exp < now_secs
        }
        Err(_) => true,
    }
}

/// True when the token is expired now, or cannot be decoded at all
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now())
}

/// Minutes remaining before the token expires (for display).
/// Zero for expired or unreadable tokens.
pub fn minutes_until_expiry(token: &str, now: DateTime<Utc>) -> i64 {
    expires_at(token)
        .map(|exp| (exp - now).num_minutes().max(0))
        .unwrap_or(0)
}
