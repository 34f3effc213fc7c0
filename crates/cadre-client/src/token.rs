//! Access-token inspection.
//!
//! Tokens are opaque credentials as far as validity goes; the server is the
//! authority and 401 handling is the backstop. Claims are still decoded
//! (without signature verification) for two local purposes: scheduling the
//! proactive refresh ahead of the `exp` instant, and deriving an identity
//! when a login response does not embed one.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeZone, Utc};

use cadre_api_models::TokenClaims;

/// Decode the claims segment of a JWT-shaped token.
///
/// Returns `None` for tokens that are not three-segment, not base64url, or
/// not JSON; such tokens simply have no readable claims.
pub(crate) fn decode_claims(token: &str) -> Option<TokenClaims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Expiry instant carried in the token's `exp` claim, when present.
pub(crate) fn decode_expiry(token: &str) -> Option<DateTime<Utc>> {
    let exp = decode_claims(token)?.exp?;
    Utc.timestamp_opt(exp, 0).single()
}

/// Resolve the expiry of a freshly issued token.
///
/// An explicit `expires_in` lifetime from the server wins over the `exp`
/// claim; with neither, the expiry is unknown and the 401 path remains the
/// only authority.
pub(crate) fn resolve_expiry(
    token: &str,
    expires_in: Option<u64>,
    issued_at: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    expires_in
        .and_then(|seconds| i64::try_from(seconds).ok())
        .map(|seconds| issued_at + chrono::Duration::seconds(seconds))
        .or_else(|| decode_expiry(token))
}
