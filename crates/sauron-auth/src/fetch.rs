//! Authenticated requests with a single refresh-and-retry.

use crate::{
    ApiRequest, ApiResponse, AuthError, AuthResult, HttpTransport, RefreshCoordinator,
    SessionExpiry,
};
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use sauron_storage::TokenStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sends requests with the stored bearer token.
///
/// On a 401 the access token is refreshed once and the identical request is
/// reissued once. Any other response, including a first-attempt 403, is
/// returned unchanged.
#[derive(Clone)]
pub struct AuthenticatedClient {
    store: Arc<TokenStore>,
    transport: Arc<dyn HttpTransport>,
    coordinator: Arc<RefreshCoordinator>,
    expiry: SessionExpiry,
}

impl AuthenticatedClient {
    pub fn new(
        store: Arc<TokenStore>,
        transport: Arc<dyn HttpTransport>,
        coordinator: Arc<RefreshCoordinator>,
        expiry: SessionExpiry,
    ) -> Self {
        Self {
            store,
            transport,
            coordinator,
            expiry,
        }
    }

    /// Send `request` with authentication.
    ///
    /// Errors:
    /// - [`AuthError::Unauthenticated`]: no access token and no refresh possible;
    ///   nothing was sent to the target.
    /// - [`AuthError::SessionExpired`]: refresh after a 401 failed, or the retry
    ///   was still rejected with 401/403. The session has been cleared.
    pub async fn fetch(&self, request: ApiRequest) -> AuthResult<ApiResponse> {
        let token = match self.store.get_access_token() {
            Some(token) => token,
            None => {
                debug!("No access token, attempting refresh before request");
                self.coordinator.refresh().await.map_err(|e| {
                    debug!(error = %e, "Could not obtain an access token");
                    AuthError::Unauthenticated
                })?
            }
        };

        let response = self.transport.send(authorize(&request, &token)?).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        info!(url = %request.url, "Request unauthorized, refreshing access token");
        let token = match self.coordinator.refresh().await {
            Ok(token) => token,
            Err(AuthError::NoRefreshToken) => {
                // Nothing for the coordinator to clear; end the session here.
                self.expiry.expire(&self.store, "unauthorized without refresh token");
                return Err(AuthError::SessionExpired);
            }
            Err(e) => {
                // Coordinator already cleared the session and ran the hook.
                warn!(error = %e, "Refresh after 401 failed");
                return Err(AuthError::SessionExpired);
            }
        };

        let retried = self.transport.send(authorize(&request, &token)?).await?;
        if retried.status == StatusCode::UNAUTHORIZED || retried.status == StatusCode::FORBIDDEN {
            self.expiry.expire(
                &self.store,
                &format!("still rejected after refresh ({})", retried.status.as_u16()),
            );
            return Err(AuthError::SessionExpired);
        }

        Ok(retried)
    }
}

/// Copy of `request` with the bearer token attached and a JSON content type
/// unless the caller chose one.
fn authorize(request: &ApiRequest, token: &str) -> AuthResult<ApiRequest> {
    let mut request = request.clone();
    if !request.headers.contains_key(CONTENT_TYPE) {
        request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    request.bearer(token)
}
