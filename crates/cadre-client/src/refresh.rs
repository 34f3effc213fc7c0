//! Single-flight coordination for the token refresh flow.
//!
//! When several in-flight requests hit 401 at roughly the same time, only
//! one refresh call may reach the network; the rest attach to the same
//! outcome. The gate holds an explicit shared future rather than a boolean
//! flag, so the guarantee is structural: joining callers clone the handle,
//! and the refresh itself runs as a detached task that completes (and
//! applies its session mutation) even if every interested caller is
//! cancelled mid-await.

use std::future::Future;
use std::sync::Mutex;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};

/// Terminal outcome of a refresh attempt, cloned to every waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RefreshError {
    /// The server rejected the refresh credential; the session is gone.
    Rejected {
        /// HTTP status of the rejection.
        status: u16,
        /// Best-effort message from the error body.
        message: String,
    },
    /// No response was received; the session may still be valid.
    Network {
        /// Human-readable description of the transport failure.
        detail: String,
    },
}

type SharedRefresh = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

/// Gate guarding the refresh endpoint.
pub(crate) struct RefreshGate {
    inflight: Mutex<Option<SharedRefresh>>,
}

impl RefreshGate {
    pub(crate) const fn new() -> Self {
        Self {
            inflight: Mutex::new(None),
        }
    }

    /// Join the in-flight refresh, or start one with `start`.
    ///
    /// The started future is spawned onto the runtime so it always runs to
    /// completion; the returned handle only observes it.
    pub(crate) fn join<F>(&self, start: impl FnOnce() -> F) -> SharedRefresh
    where
        F: Future<Output = Result<String, RefreshError>> + Send + 'static,
    {
        let mut slot = self.inflight.lock().expect("refresh gate mutex poisoned");
        if let Some(inflight) = slot.as_ref() {
            return inflight.clone();
        }

        let task = tokio::spawn(start());
        let shared = async move {
            task.await.unwrap_or_else(|err| {
                Err(RefreshError::Network {
                    detail: format!("refresh task failed: {err}"),
                })
            })
        }
        .boxed()
        .shared();
        *slot = Some(shared.clone());
        shared
    }

    /// Clear the slot once the in-flight refresh has settled.
    ///
    /// Late joiners that already cloned the handle still observe the cached
    /// outcome; the next 401 after this point starts a fresh refresh.
    pub(crate) fn finish(&self) {
        *self.inflight.lock().expect("refresh gate mutex poisoned") = None;
    }
}
