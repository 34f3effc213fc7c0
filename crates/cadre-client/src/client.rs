//! Authenticated HTTP pipeline over the Cadre API.
//!
//! Every outbound call carries the current bearer token when one exists. A
//! call that fails solely because the token went stale is transparently
//! retried exactly once after a successful refresh; callers never see the
//! dance, only the final outcome. All session mutations triggered here
//! (token replacement, logout on unrecoverable failure) go through
//! [`SessionHandle`] so readers and subscribers stay consistent.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use cadre_api_models::{
    LoginRequest, LoginResponse, ProblemDetails, RefreshRequest, RefreshResponse, UserIdentity,
};
use cadre_config::ClientConfig;
use cadre_events::{EventId, EventStream, LogoutReason};

use crate::error::{ApiError, ApiResult};
use crate::refresh::{RefreshError, RefreshGate};
use crate::session::{SessionHandle, SessionSnapshot, TokenSet};
use crate::store::SessionStore;
use crate::token::{decode_claims, resolve_expiry};

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

/// Describes one outbound call through the authenticated pipeline.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<Value>,
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl ApiRequest {
    /// Start a request for the given method and relative API path.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: HeaderMap::new(),
            timeout: None,
        }
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] when the body cannot be encoded.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> ApiResult<Self> {
        let value = serde_json::to_value(body)
            .map_err(|err| ApiError::Validation(format!("failed to encode request body: {err}")))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Attach a per-call header.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] when the name or value is not a
    /// valid header.
    pub fn header(mut self, name: &str, value: &str) -> ApiResult<Self> {
        let name: HeaderName = name
            .parse()
            .map_err(|_| ApiError::Validation(format!("invalid header name '{name}'")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ApiError::Validation(format!("invalid value for header '{name}'")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Override the client-wide timeout for this call.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

struct ClientInner {
    http: Client,
    base_url: Url,
    session: SessionHandle,
    gate: RefreshGate,
    refresh_margin: chrono::Duration,
    maintenance_interval: Duration,
}

impl ClientInner {
    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        let absolute = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        absolute
            .parse()
            .map_err(|_| ApiError::Validation(format!("invalid request path '{path}'")))
    }
}

/// Authenticated API client owning the process-wide session.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    /// Build a client from resolved configuration, reviving any persisted
    /// session.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed or the
    /// session store directory cannot be opened.
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let store = config
            .session_dir
            .as_ref()
            .map(SessionStore::open)
            .transpose()
            .context("failed to open session store")?;

        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .context("failed to build HTTP client")?;

        let refresh_margin =
            chrono::Duration::from_std(config.refresh_margin()).unwrap_or(chrono::Duration::MAX);

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: config.base_url.clone(),
                session: SessionHandle::new(store),
                gate: RefreshGate::new(),
                refresh_margin,
                maintenance_interval: config.maintenance_interval(),
            }),
        })
    }

    /// Whether an access token is currently held. Does not imply the token
    /// is still valid server-side.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.session.is_authenticated()
    }

    /// Identity of the authenticated user, when resolved.
    #[must_use]
    pub fn current_user(&self) -> Option<UserIdentity> {
        self.inner.session.current_user()
    }

    /// One consistent read of user, expiry, and authentication flag.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.session.snapshot()
    }

    /// Whether the token should be treated as expired under the configured
    /// safety margin. Unknown expiry reads as valid.
    #[must_use]
    pub fn is_token_expired(&self) -> bool {
        self.inner.session.is_token_expired(self.inner.refresh_margin)
    }

    /// Subscribe to session transitions, replaying buffered events newer
    /// than `since_id`.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        self.inner.session.events().subscribe(since_id)
    }

    /// Authenticate against `POST /auth/login` and install the session.
    ///
    /// A failed login leaves any existing session untouched.
    ///
    /// # Errors
    ///
    /// [`ApiError::Validation`] for empty credentials,
    /// [`ApiError::InvalidCredentials`] when the server rejects them, and
    /// the usual transport/server classifications otherwise.
    pub async fn login(&self, credentials: &LoginRequest) -> ApiResult<UserIdentity> {
        if credentials.username.trim().is_empty() || credentials.password.is_empty() {
            return Err(ApiError::Validation(
                "username and password must be non-empty".to_string(),
            ));
        }

        let url = self.inner.endpoint("/auth/login")?;
        let response = self
            .inner
            .http
            .post(url)
            .json(credentials)
            .send()
            .await
            .map_err(ApiError::network)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::debug!(username = %credentials.username, "login rejected");
            return Err(ApiError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(classify_error(response).await);
        }

        let body: LoginResponse = response.json().await.map_err(|err| {
            tracing::debug!(error = %err, "login response body was not decodable");
            ApiError::Api {
                status: status.as_u16(),
                message: "login response body was not valid JSON".to_string(),
            }
        })?;

        let expires_at = resolve_expiry(&body.token, body.expires_in, Utc::now());
        let Some(user) = body
            .user
            .or_else(|| decode_claims(&body.token).and_then(|claims| claims.to_identity()))
        else {
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: "login response did not include a usable identity".to_string(),
            });
        };

        self.inner.session.install(
            TokenSet {
                access_token: body.token,
                refresh_token: body.refresh_token,
                expires_at,
            },
            user.clone(),
        );
        tracing::info!(user = %user.email, "login succeeded");
        Ok(user)
    }

    /// Clear the session unconditionally.
    ///
    /// The local session and persisted storage are gone before any network
    /// activity; the server-side invalidation is best-effort and its
    /// failure is only logged.
    pub async fn logout(&self) {
        let token = self.inner.session.access_token();
        let _ = self.inner.session.clear(LogoutReason::UserRequested);

        if let Some(token) = token {
            if let Ok(url) = self.inner.endpoint("/auth/logout") {
                if let Err(err) = self.inner.http.post(url).bearer_auth(token).send().await {
                    tracing::debug!(error = %err, "server-side logout failed; local session already cleared");
                }
            }
        }
    }

    /// Issue an authenticated call through the retry pipeline.
    ///
    /// # Errors
    ///
    /// Classified per the taxonomy on [`ApiError`]; at most one network
    /// retry happens per logical call, never more.
    pub async fn request(&self, request: ApiRequest) -> ApiResult<Response> {
        let request_id = Uuid::new_v4().to_string();
        let route = request.path.clone();
        cadre_telemetry::with_request_context(request_id.clone(), route, async move {
            self.execute(request, &request_id).await
        })
        .await
    }

    /// Issue a call and decode the success body as JSON.
    ///
    /// # Errors
    ///
    /// As [`ApiClient::request`]; a malformed success body becomes an
    /// [`ApiError::Api`] with a generic message.
    pub async fn fetch_json<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<T> {
        let response = self.request(request).await?;
        let status = response.status().as_u16();
        response.json().await.map_err(|err| {
            tracing::debug!(error = %err, "success body was not decodable");
            ApiError::Api {
                status,
                message: "response body was not valid JSON".to_string(),
            }
        })
    }

    /// `GET` convenience over [`ApiClient::request`].
    ///
    /// # Errors
    ///
    /// As [`ApiClient::request`].
    pub async fn get(&self, path: &str) -> ApiResult<Response> {
        self.request(ApiRequest::new(Method::GET, path)).await
    }

    /// `DELETE` convenience over [`ApiClient::request`].
    ///
    /// # Errors
    ///
    /// As [`ApiClient::request`].
    pub async fn delete(&self, path: &str) -> ApiResult<Response> {
        self.request(ApiRequest::new(Method::DELETE, path)).await
    }

    /// `POST` convenience over [`ApiClient::request`].
    ///
    /// # Errors
    ///
    /// As [`ApiClient::request`].
    pub async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> ApiResult<Response> {
        self.request(ApiRequest::new(Method::POST, path).json(body)?)
            .await
    }

    /// `PUT` convenience over [`ApiClient::request`].
    ///
    /// # Errors
    ///
    /// As [`ApiClient::request`].
    pub async fn put<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> ApiResult<Response> {
        self.request(ApiRequest::new(Method::PUT, path).json(body)?)
            .await
    }

    /// `PATCH` convenience over [`ApiClient::request`].
    ///
    /// # Errors
    ///
    /// As [`ApiClient::request`].
    pub async fn patch<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> ApiResult<Response> {
        self.request(ApiRequest::new(Method::PATCH, path).json(body)?)
            .await
    }

    /// Refresh the token ahead of expiry when the margin says it is due.
    ///
    /// Shares the single-flight gate with the reactive 401 path, so a
    /// maintenance tick never duplicates a refresh a 401 already started.
    /// Returns whether a refresh was performed.
    ///
    /// # Errors
    ///
    /// [`ApiError::Unauthorized`] when the refresh was rejected (the
    /// session is cleared), [`ApiError::Network`] on transport failure
    /// (the session is kept).
    pub async fn refresh_if_expiring(&self) -> ApiResult<bool> {
        let Some(token) = self.inner.session.access_token() else {
            return Ok(false);
        };
        if !self.inner.session.is_token_expired(self.inner.refresh_margin) {
            return Ok(false);
        }

        match self.refreshed_token(Some(&token)).await {
            Ok(_) => Ok(true),
            Err(RefreshError::Rejected { status, message }) => {
                tracing::info!(status, message = %message, "proactive refresh rejected; clearing session");
                let _ = self.inner.session.clear(LogoutReason::SessionExpired);
                Err(ApiError::Unauthorized)
            }
            Err(RefreshError::Network { detail }) => Err(ApiError::Network {
                detail,
                source: None,
            }),
        }
    }

    /// Spawn the periodic token maintenance loop.
    ///
    /// The task runs until aborted; transient failures are logged and the
    /// loop keeps going.
    #[must_use]
    pub fn spawn_token_maintenance(&self) -> tokio::task::JoinHandle<()> {
        let client = self.clone();
        let interval = self.inner.maintenance_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match client.refresh_if_expiring().await {
                    Ok(true) => tracing::debug!("access token refreshed ahead of expiry"),
                    Ok(false) => {}
                    Err(err) => tracing::warn!(error = %err, "token maintenance attempt failed"),
                }
            }
        })
    }

    async fn execute(&self, request: ApiRequest, request_id: &str) -> ApiResult<Response> {
        let token = self.inner.session.access_token();
        let response = self.dispatch(&request, token.as_deref(), request_id).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return finalize(response).await;
        }

        tracing::debug!(path = %request.path, "401 received; joining token refresh");
        match self.refreshed_token(token.as_deref()).await {
            Ok(fresh) => {
                let retry = self.dispatch(&request, Some(&fresh), request_id).await?;
                if retry.status() == StatusCode::UNAUTHORIZED {
                    // Retried exactly once; a second 401 ends the session.
                    let _ = self.inner.session.clear(LogoutReason::SessionExpired);
                    return Err(ApiError::Unauthorized);
                }
                finalize(retry).await
            }
            Err(RefreshError::Rejected { status, message }) => {
                tracing::info!(status, message = %message, "refresh rejected; clearing session");
                let _ = self.inner.session.clear(LogoutReason::SessionExpired);
                Err(ApiError::Unauthorized)
            }
            Err(RefreshError::Network { detail }) => Err(ApiError::Network {
                detail,
                source: None,
            }),
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
        request_id: &str,
    ) -> ApiResult<Response> {
        let url = self.inner.endpoint(&request.path)?;
        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), url)
            .headers(request.headers.clone())
            .header(HEADER_REQUEST_ID, request_id);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder.send().await.map_err(ApiError::network)
    }

    /// Obtain a token expected to be fresher than `stale`, joining the
    /// single-flight refresh when necessary.
    async fn refreshed_token(&self, stale: Option<&str>) -> Result<String, RefreshError> {
        if let Some(current) = self.inner.session.access_token() {
            if stale != Some(current.as_str()) {
                // A sibling already rotated the token underneath this call.
                return Ok(current);
            }
        }

        let inner = Arc::clone(&self.inner);
        let handle = self.inner.gate.join(move || refresh_once(inner));
        handle.await
    }
}

async fn finalize(response: Response) -> ApiResult<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(classify_error(response).await)
    }
}

/// Run the refresh to completion and release the gate regardless of outcome.
async fn refresh_once(inner: Arc<ClientInner>) -> Result<String, RefreshError> {
    let result = run_refresh(&inner).await;
    inner.gate.finish();
    if let Err(err) = &result {
        tracing::debug!(?err, "token refresh failed");
    }
    result
}

async fn run_refresh(inner: &ClientInner) -> Result<String, RefreshError> {
    let (access_token, refresh_token) = inner.session.credentials();
    if access_token.is_none() && refresh_token.is_none() {
        return Err(RefreshError::Rejected {
            status: 401,
            message: "no session to refresh".to_string(),
        });
    }

    let url = inner
        .endpoint("/auth/refresh")
        .map_err(|err| RefreshError::Network {
            detail: err.to_string(),
        })?;
    let mut builder = inner.http.post(url).json(&RefreshRequest { refresh_token });
    if let Some(access_token) = &access_token {
        builder = builder.bearer_auth(access_token);
    }

    let response = builder.send().await.map_err(|err| RefreshError::Network {
        detail: err.to_string(),
    })?;
    let status = response.status();
    if !status.is_success() {
        let message = error_message(response).await;
        return Err(RefreshError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    let body: RefreshResponse = response.json().await.map_err(|err| RefreshError::Network {
        detail: format!("refresh response body was not valid JSON: {err}"),
    })?;
    let expires_at = resolve_expiry(&body.token, body.expires_in, Utc::now());
    let applied = inner.session.replace_token(TokenSet {
        access_token: body.token.clone(),
        refresh_token: body.refresh_token,
        expires_at,
    });
    if !applied {
        tracing::debug!("session cleared while refresh was in flight; token not installed");
    }
    Ok(body.token)
}

async fn classify_error(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let message = error_message(response).await;
    ApiError::Api { status, message }
}

/// Best-effort extraction of a human-readable message from an error body.
async fn error_message(response: Response) -> String {
    let status = response.status();
    let bytes = response.bytes().await.unwrap_or_default();

    if let Ok(problem) = serde_json::from_slice::<ProblemDetails>(&bytes) {
        return problem.message().to_string();
    }
    if let Some(message) = serde_json::from_slice::<Value>(&bytes)
        .ok()
        .and_then(|value| value.get("message").and_then(Value::as_str).map(ToString::to_string))
    {
        return message;
    }

    let body_text = String::from_utf8_lossy(&bytes);
    let trimmed = body_text.trim();
    if trimmed.is_empty() {
        format!("request failed with status {status}")
    } else {
        trimmed.to_string()
    }
}
