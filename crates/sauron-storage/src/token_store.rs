//! Token store: the persisted session.
//!
//! The access token lives in the session scope; the refresh token and the
//! cached user profile live in the durable scope. Nothing here talks to the
//! network and nothing here returns an error: a storage failure is logged
//! and observed by callers as absent data.

use crate::{MemoryStorage, SessionStorage, StorageKeys};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cached user profile, as returned by the auth endpoints.
///
/// Advisory only: trust it for display right after login, signup or a
/// `/me` re-fetch. Unknown fields are kept so the cache round-trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserProfile {
    /// Profile with only a display name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: None,
            role: None,
            created_at: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}

/// Process-wide session state over two storage scopes.
pub struct TokenStore {
    session: Arc<dyn SessionStorage>,
    durable: Arc<dyn SessionStorage>,
}

impl TokenStore {
    pub fn new(session: Arc<dyn SessionStorage>, durable: Arc<dyn SessionStorage>) -> Self {
        Self { session, durable }
    }

    /// Both scopes in memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()), Arc::new(MemoryStorage::new()))
    }

    pub fn get_access_token(&self) -> Option<String> {
        read(self.session.as_ref(), StorageKeys::ACCESS_TOKEN)
    }

    pub fn get_refresh_token(&self) -> Option<String> {
        read(self.durable.as_ref(), StorageKeys::REFRESH_TOKEN)
    }

    /// Cached user profile. `None` when absent or unparsable.
    pub fn get_user(&self) -> Option<UserProfile> {
        let raw = read(self.durable.as_ref(), StorageKeys::USER)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Cached user profile is not valid JSON");
                None
            }
        }
    }

    /// True when either token is present. The access token may be expired;
    /// this only says a session might be resumable.
    pub fn is_authenticated(&self) -> bool {
        self.get_access_token().is_some() || self.get_refresh_token().is_some()
    }

    /// Write a full session. Each key is written independently; a failure on
    /// one does not roll back the others.
    pub fn set_session(&self, access_token: &str, refresh_token: &str, user: &UserProfile) {
        write(self.session.as_ref(), StorageKeys::ACCESS_TOKEN, access_token);
        write(self.durable.as_ref(), StorageKeys::REFRESH_TOKEN, refresh_token);
        self.set_user(user);
        debug!(user_name = %user.name, "Session stored");
    }

    /// Store a rotated token pair.
    pub fn set_tokens(&self, access_token: &str, refresh_token: &str) {
        write(self.session.as_ref(), StorageKeys::ACCESS_TOKEN, access_token);
        write(self.durable.as_ref(), StorageKeys::REFRESH_TOKEN, refresh_token);
    }

    /// Replace the cached user profile.
    pub fn set_user(&self, user: &UserProfile) {
        match serde_json::to_string(user) {
            Ok(json) => write(self.durable.as_ref(), StorageKeys::USER, &json),
            Err(e) => warn!(error = %e, "Failed to serialize user profile"),
        }
    }

    /// Remove all session data. Safe to call repeatedly.
    pub fn clear_session(&self) {
        remove(self.session.as_ref(), StorageKeys::ACCESS_TOKEN);
        remove(self.durable.as_ref(), StorageKeys::REFRESH_TOKEN);
        remove(self.durable.as_ref(), StorageKeys::USER);
        debug!("Session cleared");
    }
}

fn read(storage: &dyn SessionStorage, key: &str) -> Option<String> {
    match storage.get(key) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "Failed to read from storage");
            None
        }
    }
}

fn write(storage: &dyn SessionStorage, key: &str, value: &str) {
    if let Err(e) = storage.set(key, value) {
        warn!(key, error = %e, "Failed to write to storage");
    }
}

fn remove(storage: &dyn SessionStorage, key: &str) {
    if let Err(e) = storage.delete(key) {
        warn!(key, error = %e, "Failed to delete from storage");
    }
}
