#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
//! Shared HTTP DTOs for the Cadre auth API.
//!
//! These types are re-used by the client session layer for request/response
//! encoding to keep the wire contract deterministic. Resource payloads
//! (employees, payroll, vacation, inventory, org units) are deliberately
//! absent: feature modules decode those themselves through
//! `fetch_json`, and this crate only owns the contract the session layer
//! depends on.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RFC9457-compatible problem document surfaced on validation/runtime errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    #[serde(rename = "type", default)]
    /// URI reference identifying the problem type.
    pub kind: Option<String>,
    /// Short, human-readable summary of the issue.
    pub title: String,
    /// HTTP status code associated with the error.
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Detailed diagnostic message when available.
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Parameters that failed validation, if applicable.
    pub invalid_params: Option<Vec<ProblemInvalidParam>>,
}

impl ProblemDetails {
    /// Best human-readable message for the problem, preferring `detail`.
    #[must_use]
    pub fn message(&self) -> &str {
        self.detail.as_deref().unwrap_or(&self.title)
    }
}

/// Invalid parameter pointer surfaced alongside a [`ProblemDetails`] payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemInvalidParam {
    /// JSON Pointer to the offending field.
    pub pointer: String,
    /// Human-readable description of the validation failure.
    pub message: String,
}

/// Coarse access role attached to an authenticated user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Full administrative access across the platform.
    Admin,
    /// People-manager access: approvals, reports, org edits.
    Manager,
    /// Self-service access to the user's own records.
    Employee,
}

impl UserRole {
    /// Machine-friendly label used in logs and storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Employee => "employee",
        }
    }
}

/// Minimal identity of the authenticated user, as surfaced to UI consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserIdentity {
    /// Stable identifier of the user record.
    pub id: Uuid,
    /// Name rendered in the UI shell.
    pub display_name: String,
    /// Primary email address, also the login name.
    pub email: String,
    /// Access role granted to the session.
    pub role: UserRole,
}

/// JSON body accepted by `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    /// Login name (email address).
    pub username: String,
    /// Plain-text password; only ever sent over the transport, never stored.
    pub password: String,
}

/// Response returned by `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    /// Bearer access token for subsequent calls.
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Long-lived credential accepted by `POST /auth/refresh`.
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Access-token lifetime in seconds, when the server states one.
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Identity of the logged-in user; absent when the server relies on
    /// token claims instead.
    pub user: Option<UserIdentity>,
}

/// JSON body accepted by `POST /auth/refresh`.
///
/// The refresh credential travels in the body; the current (possibly
/// expired) access token still rides the `Authorization` header so the
/// server can correlate the session being extended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RefreshRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Refresh token issued at login, when the session holds one.
    pub refresh_token: Option<String>,
}

/// Response returned by `POST /auth/refresh`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshResponse {
    /// Replacement bearer access token.
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Rotated refresh token, when the server rotates on use.
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Lifetime of the replacement token in seconds.
    pub expires_in: Option<u64>,
}

/// Claims carried in the payload segment of a Cadre access token.
///
/// Decoded without signature verification: the client treats the server as
/// the authority on validity and only reads claims for expiry scheduling and
/// identity fallback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TokenClaims {
    #[serde(default)]
    /// Subject: the user id as a UUID string.
    pub sub: Option<String>,
    #[serde(default)]
    /// Display name, when embedded.
    pub name: Option<String>,
    #[serde(default)]
    /// Email address, when embedded.
    pub email: Option<String>,
    #[serde(default)]
    /// Access role, when embedded.
    pub role: Option<UserRole>,
    #[serde(default)]
    /// Expiry as seconds since the Unix epoch.
    pub exp: Option<i64>,
}

impl TokenClaims {
    /// Build a [`UserIdentity`] from embedded claims.
    ///
    /// Requires a UUID subject and an email; the display name falls back to
    /// the email's local part and the role to [`UserRole::Employee`].
    #[must_use]
    pub fn to_identity(&self) -> Option<UserIdentity> {
        let id = self
            .sub
            .as_deref()
            .and_then(|value| Uuid::parse_str(value).ok())?;
        let email = self.email.clone()?;
        let display_name = self.name.clone().unwrap_or_else(|| {
            email
                .split_once('@')
                .map_or_else(|| email.clone(), |(local, _)| local.to_string())
        });
        Some(UserIdentity {
            id,
            display_name,
            email,
            role: self.role.unwrap_or(UserRole::Employee),
        })
    }
}
