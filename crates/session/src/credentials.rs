//! Durable access token + cached user.
//!
//! Two keys, always cleared together. The only exception is a cached user that
//! no longer parses: that key alone is purged so the next read is clean.

use std::sync::Arc;

use articlehub_auth::User;

use crate::error::StorageError;
use crate::storage::KeyValueStorage;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "currentUser";

/// Opaque bearer credential.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Blank strings are not tokens.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "AccessToken(len={})", self.0.len())
    }
}

/// Reads and writes the persisted session.
///
/// Cheap to clone; clones share the underlying storage.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl core::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// Storage failures read as "no token".
    pub fn read_token(&self) -> Option<AccessToken> {
        match self.storage.get(TOKEN_KEY) {
            Ok(raw) => raw.and_then(AccessToken::new),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stored token");
                None
            }
        }
    }

    pub fn has_token(&self) -> bool {
        self.read_token().is_some()
    }

    /// Malformed data yields `None` and removes the user key.
    pub fn read_user(&self) -> Option<User> {
        let raw = match self.storage.get(USER_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stored user");
                return None;
            }
        };

        match serde_json::from_str::<User>(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error = %e, "stored user is malformed; purging it");
                if let Err(e) = self.storage.remove(USER_KEY) {
                    tracing::warn!(error = %e, "failed to purge malformed user");
                }
                None
            }
        }
    }

    /// Persist whichever parts are given; absent parts are left as they are.
    pub fn write(&self, token: Option<&AccessToken>, user: Option<&User>) -> Result<(), StorageError> {
        if let Some(token) = token {
            self.storage.set(TOKEN_KEY, token.expose())?;
        }
        if let Some(user) = user {
            let raw = serde_json::to_string(user).map_err(|e| StorageError::Io {
                key: USER_KEY.to_string(),
                message: e.to_string(),
            })?;
            self.storage.set(USER_KEY, &raw)?;
        }
        Ok(())
    }

    /// Drop the bearer token, keeping the user. A cookie session carries no
    /// token of its own.
    pub fn clear_token(&self) -> Result<(), StorageError> {
        self.storage.remove(TOKEN_KEY)
    }

    /// Remove both keys. Both removals are attempted even if the first fails.
    pub fn clear(&self) -> Result<(), StorageError> {
        let token = self.storage.remove(TOKEN_KEY);
        let user = self.storage.remove(USER_KEY);
        token.and(user)
    }
}
