//! Environment and profile-file loading for [`ClientConfig`].
//!
//! Precedence: environment variables override profile-file values, which
//! override built-in defaults. Only the base URL is mandatory.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    ClientConfig, DEFAULT_LOG_LEVEL, DEFAULT_MAINTENANCE_INTERVAL_SECS, DEFAULT_REFRESH_MARGIN_SECS,
    DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};
use crate::validate::{parse_base_url, parse_margin_seconds, parse_seconds};

/// Environment variable naming the API base URL.
pub const ENV_API_URL: &str = "CADRE_API_URL";
/// Environment variable pointing at a JSON profile file.
pub const ENV_CONFIG_FILE: &str = "CADRE_CONFIG_FILE";

const ENV_TIMEOUT_SECS: &str = "CADRE_HTTP_TIMEOUT_SECS";
const ENV_REFRESH_MARGIN_SECS: &str = "CADRE_REFRESH_MARGIN_SECS";
const ENV_MAINTENANCE_INTERVAL_SECS: &str = "CADRE_MAINTENANCE_INTERVAL_SECS";
const ENV_SESSION_DIR: &str = "CADRE_SESSION_DIR";
const ENV_LOG_LEVEL: &str = "CADRE_LOG_LEVEL";
const ENV_LOG_FORMAT: &str = "CADRE_LOG_FORMAT";
const ENV_USER_AGENT: &str = "CADRE_USER_AGENT";

/// On-disk JSON profile. Every field is optional; missing fields fall back
/// to environment values or defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileFile {
    #[serde(default)]
    /// API base URL.
    pub base_url: Option<String>,
    #[serde(default)]
    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    /// Expiry safety margin in seconds.
    pub refresh_margin_secs: Option<u64>,
    #[serde(default)]
    /// Maintenance loop cadence in seconds.
    pub maintenance_interval_secs: Option<u64>,
    #[serde(default)]
    /// Directory for the persisted session.
    pub session_dir: Option<PathBuf>,
    #[serde(default)]
    /// Logging filter directive.
    pub log_level: Option<String>,
    #[serde(default)]
    /// Logging output format label.
    pub log_format: Option<String>,
    #[serde(default)]
    /// `User-Agent` header override.
    pub user_agent: Option<String>,
}

impl ProfileFile {
    /// Read and parse a profile file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn read(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            operation: "read_profile_file",
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse { source })
    }
}

/// Load configuration from the process environment, honouring
/// [`ENV_CONFIG_FILE`] when set.
///
/// # Errors
///
/// Returns an error if a profile file is named but unreadable, or if any
/// source fails validation.
pub fn load() -> ConfigResult<ClientConfig> {
    let lookup = |key: &str| std::env::var(key).ok();
    let file = lookup(ENV_CONFIG_FILE)
        .map(PathBuf::from)
        .map(|path| ProfileFile::read(&path))
        .transpose()?;
    resolve(file, &lookup)
}

/// Resolve a configuration from explicit sources.
///
/// Exposed separately from [`load`] so tests and embedders can inject their
/// own variable lookup instead of mutating the process environment.
///
/// # Errors
///
/// Returns an error when the base URL is missing or any value fails
/// validation.
pub fn resolve(
    file: Option<ProfileFile>,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> ConfigResult<ClientConfig> {
    let file = file.unwrap_or_default();

    let base_url = match lookup(ENV_API_URL).or(file.base_url) {
        Some(raw) => parse_base_url(&raw)?,
        None => return Err(ConfigError::MissingBaseUrl),
    };

    let timeout_secs = match lookup(ENV_TIMEOUT_SECS) {
        Some(raw) => parse_seconds("timeout_secs", &raw)?,
        None => match file.timeout_secs {
            Some(0) => {
                return Err(ConfigError::InvalidField {
                    field: "timeout_secs",
                    value: Some("0".to_string()),
                    reason: "must be positive",
                });
            }
            Some(value) => value,
            None => DEFAULT_TIMEOUT_SECS,
        },
    };

    let refresh_margin_secs = match lookup(ENV_REFRESH_MARGIN_SECS) {
        Some(raw) => parse_margin_seconds("refresh_margin_secs", &raw)?,
        None => file
            .refresh_margin_secs
            .unwrap_or(DEFAULT_REFRESH_MARGIN_SECS),
    };

    let maintenance_interval_secs = match lookup(ENV_MAINTENANCE_INTERVAL_SECS) {
        Some(raw) => parse_seconds("maintenance_interval_secs", &raw)?,
        None => match file.maintenance_interval_secs {
            Some(0) => {
                return Err(ConfigError::InvalidField {
                    field: "maintenance_interval_secs",
                    value: Some("0".to_string()),
                    reason: "must be positive",
                });
            }
            Some(value) => value,
            None => DEFAULT_MAINTENANCE_INTERVAL_SECS,
        },
    };

    let session_dir = lookup(ENV_SESSION_DIR).map(PathBuf::from).or(file.session_dir);

    let config = ClientConfig {
        base_url,
        timeout_secs,
        refresh_margin_secs,
        maintenance_interval_secs,
        session_dir,
        user_agent: lookup(ENV_USER_AGENT)
            .or(file.user_agent)
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        log_level: lookup(ENV_LOG_LEVEL)
            .or(file.log_level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        log_format: lookup(ENV_LOG_FORMAT).or(file.log_format).unwrap_or_default(),
    };

    tracing::debug!(
        base_url = %config.base_url,
        timeout_secs = config.timeout_secs,
        persisted = config.session_dir.is_some(),
        "client configuration resolved"
    );

    Ok(config)
}
