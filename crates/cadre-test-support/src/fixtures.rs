//! Test fixtures: identities, bearer tokens, and canned wire bodies.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use cadre_api_models::{UserIdentity, UserRole};

/// Deterministic identity used across suites.
#[must_use]
pub fn sample_identity() -> UserIdentity {
    UserIdentity {
        id: Uuid::from_u128(1),
        display_name: "Alice".to_string(),
        email: "alice@cadre.test".to_string(),
        role: UserRole::Manager,
    }
}

/// Build an unsigned JWT-shaped bearer token carrying the identity's claims.
///
/// The signature segment is a fixed placeholder: the client never verifies
/// signatures, it only reads the payload segment.
#[must_use]
pub fn token_for(user: &UserIdentity, expires_at: Option<DateTime<Utc>>) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let mut claims = json!({
        "sub": user.id,
        "name": user.display_name,
        "email": user.email,
        "role": user.role,
    });
    if let Some(expires_at) = expires_at {
        claims["exp"] = json!(expires_at.timestamp());
    }
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    format!("{header}.{payload}.fixture-signature")
}

/// Token for [`sample_identity`] expiring the given number of seconds from
/// now (negative values produce an already-expired token).
#[must_use]
pub fn token_expiring_in(seconds: i64) -> String {
    token_for(
        &sample_identity(),
        Some(Utc::now() + Duration::seconds(seconds)),
    )
}

/// Canned success body for `POST /auth/login` with an embedded user.
#[must_use]
pub fn login_body(user: &UserIdentity, token: &str, refresh_token: &str) -> Value {
    json!({
        "token": token,
        "refresh_token": refresh_token,
        "user": {
            "id": user.id,
            "display_name": user.display_name,
            "email": user.email,
            "role": user.role,
        }
    })
}

/// Canned success body for `POST /auth/refresh`.
#[must_use]
pub fn refresh_body(token: &str) -> Value {
    json!({ "token": token })
}

/// Canned RFC9457 problem body.
#[must_use]
pub fn problem_body(status: u16, title: &str, detail: &str) -> Value {
    json!({
        "type": "about:blank",
        "title": title,
        "status": status,
        "detail": detail,
    })
}
