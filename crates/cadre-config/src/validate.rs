//! Validation helpers and parsing utilities for configuration sources.

use url::Url;

use crate::error::{ConfigError, ConfigResult};

/// Parse and validate an API base URL.
///
/// Accepts absolute `http`/`https` URLs without query or fragment; a
/// trailing slash is trimmed so path joining stays deterministic.
pub(crate) fn parse_base_url(value: &str) -> ConfigResult<Url> {
    let mut url: Url = value.parse().map_err(|_| ConfigError::InvalidBaseUrl {
        value: value.to_string(),
        reason: "must be an absolute URL",
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl {
            value: value.to_string(),
            reason: "scheme must be http or https",
        });
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidBaseUrl {
            value: value.to_string(),
            reason: "must include a host",
        });
    }

    if url.query().is_some() || url.fragment().is_some() {
        return Err(ConfigError::InvalidBaseUrl {
            value: value.to_string(),
            reason: "must not carry a query or fragment",
        });
    }

    let trimmed = url.path().trim_end_matches('/').to_string();
    url.set_path(&trimmed);
    Ok(url)
}

/// Parse a positive number of seconds.
pub(crate) fn parse_seconds(field: &'static str, value: &str) -> ConfigResult<u64> {
    let seconds: u64 = value.parse().map_err(|_| ConfigError::InvalidField {
        field,
        value: Some(value.to_string()),
        reason: "must be an integer number of seconds",
    })?;

    if seconds == 0 {
        return Err(ConfigError::InvalidField {
            field,
            value: Some(value.to_string()),
            reason: "must be positive",
        });
    }

    Ok(seconds)
}

/// Parse a non-negative number of seconds (zero disables the margin).
pub(crate) fn parse_margin_seconds(field: &'static str, value: &str) -> ConfigResult<u64> {
    value.parse().map_err(|_| ConfigError::InvalidField {
        field,
        value: Some(value.to_string()),
        reason: "must be an integer number of seconds",
    })
}
