use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct JwtClaims {
    #[serde(default)]
    pub sub: Option<String>,
    pub exp: i64,
}

/// Decode JWT claims without validating the signature.
///
/// Only used to learn when an access token expires if the backend did not
/// say so explicitly; the backend remains the authority on validity.
pub fn decode_jwt_claims(token: &str) -> Result<JwtClaims> {
    let parts: Vec<&str> = token.split('.').collect();

    if parts.len() != 3 {
        return Err(anyhow::anyhow!("Invalid JWT format"));
    }

    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| anyhow::anyhow!("Failed to decode JWT payload: {}", e))?;

    let claims: JwtClaims = serde_json::from_slice(&payload)
        .map_err(|e| anyhow::anyhow!("Failed to parse JWT claims: {}", e))?;

    Ok(claims)
}

/// `exp` of `token` in epoch milliseconds, if it is a readable JWT.
pub fn token_expiry_millis(token: &str) -> Option<i64> {
    decode_jwt_claims(token)
        .ok()
        .map(|claims| claims.exp.saturating_mul(1000))
}
