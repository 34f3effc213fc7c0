//! Shared session state.
//!
//! The session is the one piece of mutable state in the client. Every paired
//! mutation (token + expiry + user) happens under a single mutex with no
//! suspension point while held, so a reader can never observe a token
//! without its user or vice versa. Observers learn about transitions through
//! the event bus rather than by polling.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use cadre_api_models::UserIdentity;
use cadre_events::{EventBus, LogoutReason, SessionEvent};

use crate::store::{PersistedToken, SessionStore};

/// Consistent read of the session exposed to UI consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Identity of the authenticated user, when resolved.
    pub user: Option<UserIdentity>,
    /// Known expiry of the access token.
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether an access token is currently held.
    pub authenticated: bool,
}

/// Replacement credential set produced by login or refresh.
#[derive(Debug, Clone)]
pub(crate) struct TokenSet {
    pub(crate) access_token: String,
    pub(crate) refresh_token: Option<String>,
    pub(crate) expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
struct SessionState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    token_expiry: Option<DateTime<Utc>>,
    current_user: Option<UserIdentity>,
}

/// Handle to the process-wide session, cheap to clone.
#[derive(Clone)]
pub(crate) struct SessionHandle {
    state: Arc<Mutex<SessionState>>,
    bus: EventBus,
    store: Option<SessionStore>,
}

impl SessionHandle {
    /// Create a handle, reviving any persisted session.
    ///
    /// A corrupt store entry is discarded (and removed) with a warning; it
    /// never prevents the client from starting logged-out.
    pub(crate) fn new(store: Option<SessionStore>) -> Self {
        let mut state = SessionState::default();
        if let Some(store) = &store {
            match store.load() {
                Ok(Some((token, user))) => {
                    state.access_token = Some(token.access_token);
                    state.refresh_token = token.refresh_token;
                    state.token_expiry = token.expires_at;
                    state.current_user = user;
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "discarding unreadable persisted session");
                    if let Err(err) = store.clear() {
                        tracing::warn!(error = %err, "failed to clear persisted session");
                    }
                }
            }
        }

        Self {
            state: Arc::new(Mutex::new(state)),
            bus: EventBus::new(),
            store,
        }
    }

    /// Bus carrying session transitions.
    pub(crate) const fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Install a fresh session after a successful login.
    pub(crate) fn install(&self, tokens: TokenSet, user: UserIdentity) {
        {
            let mut state = self.lock();
            state.access_token = Some(tokens.access_token.clone());
            state.refresh_token = tokens.refresh_token.clone();
            state.token_expiry = tokens.expires_at;
            state.current_user = Some(user.clone());
        }

        self.persist(
            &PersistedToken {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                expires_at: tokens.expires_at,
            },
            Some(&user),
        );
        let _ = self.bus.publish(SessionEvent::LoggedIn {
            user_id: user.id,
            display_name: user.display_name,
        });
    }

    /// Replace the token in place after a refresh; the user is unchanged.
    ///
    /// No-op (returning `false`) when the session was cleared concurrently:
    /// an explicit logout wins over a refresh that was still in flight.
    pub(crate) fn replace_token(&self, tokens: TokenSet) -> bool {
        let persisted = {
            let mut state = self.lock();
            if state.access_token.is_none() {
                return false;
            }
            state.access_token = Some(tokens.access_token.clone());
            if tokens.refresh_token.is_some() {
                state.refresh_token = tokens.refresh_token;
            }
            state.token_expiry = tokens.expires_at;
            (
                PersistedToken {
                    access_token: tokens.access_token,
                    refresh_token: state.refresh_token.clone(),
                    expires_at: tokens.expires_at,
                },
                state.current_user.clone(),
            )
        };

        self.persist(&persisted.0, persisted.1.as_ref());
        let _ = self.bus.publish(SessionEvent::TokenRefreshed {
            expires_at: persisted.0.expires_at,
        });
        true
    }

    /// Clear the session and persisted storage.
    ///
    /// Returns whether a session existed; `LoggedOut` is published only on
    /// an actual transition, so concurrent failure paths collapse into one
    /// observable logout.
    pub(crate) fn clear(&self, reason: LogoutReason) -> bool {
        let had_session = {
            let mut state = self.lock();
            let had_session = state.access_token.is_some() || state.current_user.is_some();
            *state = SessionState::default();
            had_session
        };

        if let Some(store) = &self.store {
            if let Err(err) = store.clear() {
                tracing::warn!(error = %err, "failed to clear persisted session");
            }
        }

        if had_session {
            let _ = self.bus.publish(SessionEvent::LoggedOut { reason });
        }
        had_session
    }

    /// Current access token, when held.
    pub(crate) fn access_token(&self) -> Option<String> {
        self.lock().access_token.clone()
    }

    /// Access and refresh credentials for the refresh endpoint.
    pub(crate) fn credentials(&self) -> (Option<String>, Option<String>) {
        let state = self.lock();
        (state.access_token.clone(), state.refresh_token.clone())
    }

    /// Whether an access token is currently held.
    pub(crate) fn is_authenticated(&self) -> bool {
        self.lock().access_token.is_some()
    }

    /// Identity of the authenticated user, when resolved.
    pub(crate) fn current_user(&self) -> Option<UserIdentity> {
        self.lock().current_user.clone()
    }

    /// One consistent read of user, expiry, and authentication flag.
    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            user: state.current_user.clone(),
            expires_at: state.token_expiry,
            authenticated: state.access_token.is_some(),
        }
    }

    /// Whether the token should be treated as expired under `margin`.
    pub(crate) fn is_token_expired(&self, margin: Duration) -> bool {
        let expiry = self.lock().token_expiry;
        treat_as_expired(expiry, margin, Utc::now())
    }

    fn persist(&self, token: &PersistedToken, user: Option<&UserIdentity>) {
        if let Some(store) = &self.store {
            if let Err(err) = store.save(token, user) {
                tracing::warn!(error = %err, "failed to persist session");
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().expect("session mutex poisoned")
    }
}

/// A token is treated as expired slightly before its literal expiry so a
/// request never races the deadline. Unknown expiry reads as valid; the
/// server remains the authority via the 401 path.
fn treat_as_expired(expiry: Option<DateTime<Utc>>, margin: Duration, now: DateTime<Utc>) -> bool {
    expiry.is_some_and(|instant| {
        now.checked_add_signed(margin)
            .is_none_or(|deadline| deadline >= instant)
    })
}
