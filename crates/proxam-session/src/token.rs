//! Opaque session token codec.
//!
//! A token is the base64 encoding of JSON [`Claims`]. Tokens carry no
//! signature; the identity service is the integrity authority, and the
//! client treats any token that fails to decode as no session at all.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use thiserror::Error;

use crate::claims::{Claims, SessionUser};

/// Fixed session lifetime: 24 hours.
pub const TOKEN_TTL_SECS: i64 = 86_400;

/// Why a token was rejected.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("malformed claims: {0}")]
    Claims(#[from] serde_json::Error),
    #[error("token expired")]
    Expired,
}

/// Serialize claims into a token string.
pub fn encode(claims: &Claims) -> Result<String, TokenError> {
    let body = serde_json::to_vec(claims)?;
    Ok(STANDARD.encode(body))
}

/// Decode and validate a token, mapping every failure to an absent session.
pub fn decode(token: &str) -> Option<Claims> {
    try_decode(token).ok()
}

/// Decode and validate a token, reporting why it was rejected.
pub fn try_decode(token: &str) -> Result<Claims, TokenError> {
    try_decode_at(token, Utc::now().timestamp())
}

fn try_decode_at(token: &str, now: i64) -> Result<Claims, TokenError> {
    let body = STANDARD.decode(token)?;
    let claims: Claims = serde_json::from_slice(&body)?;
    // Expiry is exact: a token whose exp equals the current second is
    // already expired, with no clock-skew allowance.
    if claims.exp <= now {
        return Err(TokenError::Expired);
    }
    Ok(claims)
}

/// Mint a token for a user, stamping the fixed lifetime from now.
pub fn issue(user: &SessionUser) -> Result<String, TokenError> {
    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role,
        organization_id: user.organization_id.clone(),
        exp: Utc::now().timestamp() + TOKEN_TTL_SECS,
    };
    encode(&claims)
}
