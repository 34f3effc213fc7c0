//! Persisted session storage.
//!
//! Mirrors the browser-era layout of two entries — a token document and the
//! minimal user identity — as two JSON files inside a session directory.
//! Both are written together on login/refresh and removed together on
//! logout, so a revived process never sees one half of a session.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cadre_api_models::UserIdentity;

const TOKEN_FILE: &str = "token.json";
const USER_FILE: &str = "user.json";

/// Errors from the session store.
#[derive(Debug, Error)]
pub(crate) enum StoreError {
    /// Filesystem operation failed.
    #[error("session store {operation} failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Source IO error.
        source: io::Error,
    },
    /// A stored document was not valid JSON.
    #[error("session store entry was not valid JSON")]
    Corrupt {
        /// Source parse error.
        source: serde_json::Error,
    },
}

/// Token document persisted alongside the user identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct PersistedToken {
    /// Bearer access token.
    pub(crate) access_token: String,
    /// Refresh credential, when the server issued one.
    pub(crate) refresh_token: Option<String>,
    /// Known expiry of the access token.
    pub(crate) expires_at: Option<DateTime<Utc>>,
}

/// File-backed session store rooted at a directory.
#[derive(Debug, Clone)]
pub(crate) struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub(crate) fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            operation: "create_dir",
            source,
        })?;
        Ok(Self { dir })
    }

    /// Persist the token document and user identity together.
    pub(crate) fn save(
        &self,
        token: &PersistedToken,
        user: Option<&UserIdentity>,
    ) -> Result<(), StoreError> {
        write_json(&self.dir.join(TOKEN_FILE), token)?;
        match user {
            Some(user) => write_json(&self.dir.join(USER_FILE), user)?,
            None => remove_if_present(&self.dir.join(USER_FILE))?,
        }
        Ok(())
    }

    /// Load the persisted session, if one exists.
    ///
    /// A missing token document means no session. A missing user document
    /// alongside a present token is a valid intermediate state (token
    /// installed, identity never resolved).
    pub(crate) fn load(&self) -> Result<Option<(PersistedToken, Option<UserIdentity>)>, StoreError> {
        let Some(token) = read_json::<PersistedToken>(&self.dir.join(TOKEN_FILE))? else {
            return Ok(None);
        };
        let user = read_json::<UserIdentity>(&self.dir.join(USER_FILE))?;
        Ok(Some((token, user)))
    }

    /// Remove both entries. Missing files are not an error.
    pub(crate) fn clear(&self) -> Result<(), StoreError> {
        remove_if_present(&self.dir.join(TOKEN_FILE))?;
        remove_if_present(&self.dir.join(USER_FILE))
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Corrupt { source })?;
    std::fs::write(path, json).map_err(|source| StoreError::Io {
        operation: "write",
        source,
    })?;
    restrict_permissions(path)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, StoreError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                operation: "read",
                source,
            });
        }
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StoreError::Corrupt { source })
}

fn remove_if_present(path: &Path) -> Result<(), StoreError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StoreError::Io {
            operation: "remove",
            source,
        }),
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|source| {
        StoreError::Io {
            operation: "chmod",
            source,
        }
    })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}
