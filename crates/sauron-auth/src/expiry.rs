//! Session termination.
//!
//! Every unrecoverable auth failure ends the same way: the token store is
//! cleared and the host's hook runs (a CLI prints a hint, a UI would route to
//! its login screen).

use parking_lot::Mutex;
use sauron_storage::TokenStore;
use std::sync::Arc;
use tracing::warn;

/// Callback fired when the session has been cleared involuntarily.
pub type SessionExpiredHook = Arc<dyn Fn() + Send + Sync>;

/// Shared handle to the session-expired hook.
#[derive(Clone, Default)]
pub struct SessionExpiry {
    hook: Arc<Mutex<Option<SessionExpiredHook>>>,
}

impl SessionExpiry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace the hook.
    pub fn set_hook(&self, hook: SessionExpiredHook) {
        *self.hook.lock() = Some(hook);
    }

    /// Run the hook without touching the store.
    pub fn notify(&self) {
        // Clone out so the hook may call back into set_hook.
        let hook = self.hook.lock().clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    /// Clear the session and run the hook.
    pub fn expire(&self, store: &TokenStore, reason: &str) {
        warn!(reason, "Session expired, clearing stored credentials");
        store.clear_session();
        self.notify();
    }
}
