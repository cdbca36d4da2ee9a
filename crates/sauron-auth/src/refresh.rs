//! Single-flight token refresh.
//!
//! At most one refresh exchange runs per refresh token. Callers that arrive
//! while an exchange is in flight await the same shared outcome. The exchange
//! runs on its own task, so it settles and empties the slot even if every
//! caller is cancelled. An outcome is only applied to the store while the
//! session it was started for is still the stored one.

use crate::{ApiEndpoints, ApiRequest, AuthError, AuthResult, HttpTransport, SessionExpiry};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use sauron_storage::TokenStore;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Refresh request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Refresh response body. Both tokens rotate.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
}

/// Outcome shared between concurrent callers. The error side is the failure
/// reason; `AuthError` is not `Clone`.
type SharedRefresh = Shared<BoxFuture<'static, Result<String, String>>>;

type FlightSlot = Arc<Mutex<Option<Flight>>>;

/// The exchange currently in flight.
struct Flight {
    id: u64,
    /// Refresh token the exchange was started with.
    refresh_token: String,
    outcome: SharedRefresh,
}

/// Exchanges the refresh token for a new token pair, one exchange at a time.
pub struct RefreshCoordinator {
    store: Arc<TokenStore>,
    transport: Arc<dyn HttpTransport>,
    endpoints: ApiEndpoints,
    expiry: SessionExpiry,
    in_flight: FlightSlot,
    next_flight: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<TokenStore>,
        transport: Arc<dyn HttpTransport>,
        endpoints: ApiEndpoints,
        expiry: SessionExpiry,
    ) -> Self {
        Self {
            store,
            transport,
            endpoints,
            expiry,
            in_flight: Arc::new(Mutex::new(None)),
            next_flight: AtomicU64::new(0),
        }
    }

    /// True while an exchange is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Forget the in-flight exchange, if any. Its outcome is discarded when
    /// it settles. Called whenever the stored session is replaced or ended.
    pub fn reset(&self) {
        if let Some(flight) = self.in_flight.lock().take() {
            debug!(flight = flight.id, "Abandoning in-flight token refresh");
        }
    }

    /// Obtain a new access token.
    ///
    /// - No refresh token stored: [`AuthError::NoRefreshToken`], store untouched.
    /// - Success: both tokens are rotated in the store; the new access token is returned.
    /// - Failure: the session is cleared, the session-expired hook runs, and
    ///   [`AuthError::RefreshFailed`] is returned.
    pub async fn refresh(&self) -> AuthResult<String> {
        let outcome = {
            let mut slot = self.in_flight.lock();
            let Some(refresh_token) = self.store.get_refresh_token() else {
                debug!("Refresh requested without a refresh token");
                return Err(AuthError::NoRefreshToken);
            };

            let joined = slot
                .as_ref()
                .filter(|flight| flight.refresh_token == refresh_token)
                .map(|flight| (flight.id, flight.outcome.clone()));

            match joined {
                Some((id, outcome)) => {
                    debug!(flight = id, "Joining in-flight token refresh");
                    outcome
                }
                None => {
                    if let Some(stale) = slot.as_ref() {
                        debug!(flight = stale.id, "Replacing refresh for a previous session");
                    }
                    let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
                    let outcome = self.spawn_exchange(id, refresh_token.clone());
                    *slot = Some(Flight {
                        id,
                        refresh_token,
                        outcome: outcome.clone(),
                    });
                    debug!(flight = id, "Starting token refresh");
                    outcome
                }
            }
        };

        outcome.await.map_err(AuthError::RefreshFailed)
    }

    fn spawn_exchange(&self, id: u64, refresh_token: String) -> SharedRefresh {
        let store = self.store.clone();
        let transport = self.transport.clone();
        let url = self.endpoints.refresh();
        let expiry = self.expiry.clone();
        let slot = self.in_flight.clone();

        let task = tokio::spawn({
            let slot = slot.clone();
            async move {
                let result = request_tokens(transport.as_ref(), url, &refresh_token).await;
                settle(id, &refresh_token, result, &slot, &store, &expiry)
            }
        });

        async move {
            task.await.unwrap_or_else(|e| {
                release(&slot, id);
                Err(format!("refresh task failed: {e}"))
            })
        }
        .boxed()
        .shared()
    }
}

/// Empty the slot if it still holds flight `id`. True if it did.
fn release(slot: &Mutex<Option<Flight>>, id: u64) -> bool {
    let mut slot = slot.lock();
    let owned = matches!(slot.as_ref(), Some(flight) if flight.id == id);
    if owned {
        *slot = None;
    }
    owned
}

/// Apply an exchange result to the store and release the slot.
///
/// The slot lock is held while the store is updated, so a caller never sees
/// the old refresh token next to an emptied slot.
fn settle(
    id: u64,
    refresh_token: &str,
    result: AuthResult<RefreshResponse>,
    slot: &Mutex<Option<Flight>>,
    store: &TokenStore,
    expiry: &SessionExpiry,
) -> Result<String, String> {
    let reason = {
        let mut guard = slot.lock();
        let owned = matches!(guard.as_ref(), Some(flight) if flight.id == id);
        if owned {
            *guard = None;
        }

        if !owned || store.get_refresh_token().as_deref() != Some(refresh_token) {
            debug!(flight = id, "Discarding refresh outcome for a replaced session");
            return Err("Session changed during refresh".to_string());
        }

        match result {
            Ok(tokens) => {
                store.set_tokens(&tokens.access_token, &tokens.refresh_token);
                info!("Access token refreshed");
                return Ok(tokens.access_token);
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing stored credentials");
                store.clear_session();
                e.to_string()
            }
        }
    };

    // Outside the lock; the hook may call back into the coordinator.
    expiry.notify();
    Err(reason)
}

async fn request_tokens(
    transport: &dyn HttpTransport,
    url: String,
    refresh_token: &str,
) -> AuthResult<RefreshResponse> {
    let request = ApiRequest::post(url).json(&RefreshRequest { refresh_token })?;
    let response = transport.send(request).await?.error_for_status()?;
    response.json()
}
