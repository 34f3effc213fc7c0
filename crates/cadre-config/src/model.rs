//! Typed configuration model for the Cadre client.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Default per-request timeout in seconds.
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default safety margin subtracted from the token expiry instant.
pub(crate) const DEFAULT_REFRESH_MARGIN_SECS: u64 = 30;
/// Default cadence of the proactive token maintenance loop.
pub(crate) const DEFAULT_MAINTENANCE_INTERVAL_SECS: u64 = 120;
/// Default `User-Agent` header value.
pub(crate) const DEFAULT_USER_AGENT: &str = concat!("cadre-client/", env!("CARGO_PKG_VERSION"));
/// Default filter directive for logging.
pub(crate) const DEFAULT_LOG_LEVEL: &str = "info";

/// Resolved configuration consumed by the client session layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the Cadre API, e.g. `https://cadre.example.test/api`.
    pub base_url: Url,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// A token is treated as expired this many seconds before its literal
    /// expiry instant, so a request never races the deadline.
    pub refresh_margin_secs: u64,
    /// Cadence of the background token maintenance loop in seconds.
    pub maintenance_interval_secs: u64,
    /// Directory for the persisted session; `None` keeps the session
    /// in-memory only.
    pub session_dir: Option<PathBuf>,
    /// `User-Agent` header sent with every call.
    pub user_agent: String,
    /// Default logging filter directive.
    pub log_level: String,
    /// Logging output format label (`json`, `pretty`, or empty for the
    /// build default).
    pub log_format: String,
}

impl ClientConfig {
    /// Construct a configuration with defaults for everything but the base
    /// URL.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            refresh_margin_secs: DEFAULT_REFRESH_MARGIN_SECS,
            maintenance_interval_secs: DEFAULT_MAINTENANCE_INTERVAL_SECS,
            session_dir: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: String::new(),
        }
    }

    /// Per-request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Expiry safety margin as a [`Duration`].
    #[must_use]
    pub const fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.refresh_margin_secs)
    }

    /// Maintenance loop cadence as a [`Duration`].
    #[must_use]
    pub const fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }
}
