//! High-level session API.
//!
//! `AuthClient` wires the token store, refresh coordinator, scheduler and
//! authenticated request wrapper together and exposes the account
//! operations of the REST API.

use crate::{
    inspector, ApiEndpoints, ApiRequest, ApiResponse, AuthError, AuthResult,
    AuthenticatedClient, HttpTransport, RefreshCoordinator, RefreshScheduler, ReqwestTransport,
    SchedulerConfig, SchedulerState, SessionExpiredHook, SessionExpiry,
};
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use sauron_config_and_utils::Config;
use sauron_storage::{TokenStore, UserProfile};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordChange<'a> {
    current_password: &'a str,
    new_password: &'a str,
}

/// Body of login and signup responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    access_token: String,
    refresh_token: String,
    user: UserProfile,
}

/// Body of `/me` and `/profile` responses.
#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: UserProfile,
}

/// Local view of the session. No network involved.
#[derive(Debug, Clone, Serialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub has_access_token: bool,
    pub has_refresh_token: bool,
    pub access_expires_at: Option<DateTime<Utc>>,
    pub access_expiring_soon: bool,
    pub user: Option<UserProfile>,
    pub scheduler: SchedulerState,
}

/// Client for the auth endpoints with automatic token management.
pub struct AuthClient {
    store: Arc<TokenStore>,
    transport: Arc<dyn HttpTransport>,
    endpoints: ApiEndpoints,
    expiry: SessionExpiry,
    coordinator: Arc<RefreshCoordinator>,
    scheduler: RefreshScheduler,
    fetcher: AuthenticatedClient,
}

impl AuthClient {
    pub fn new(
        store: Arc<TokenStore>,
        transport: Arc<dyn HttpTransport>,
        endpoints: ApiEndpoints,
        scheduler_config: SchedulerConfig,
    ) -> Self {
        let expiry = SessionExpiry::new();
        let coordinator = Arc::new(RefreshCoordinator::new(
            store.clone(),
            transport.clone(),
            endpoints.clone(),
            expiry.clone(),
        ));
        let scheduler = RefreshScheduler::new(store.clone(), coordinator.clone(), scheduler_config);
        let fetcher = AuthenticatedClient::new(
            store.clone(),
            transport.clone(),
            coordinator.clone(),
            expiry.clone(),
        );

        Self {
            store,
            transport,
            endpoints,
            expiry,
            coordinator,
            scheduler,
            fetcher,
        }
    }

    /// Client over HTTP for the configured API.
    pub fn from_config(config: &Config, store: Arc<TokenStore>) -> AuthResult<Self> {
        let endpoints = ApiEndpoints::from_config(config)?;
        let scheduler_config = SchedulerConfig {
            check_interval: config.refresh_check_interval(),
            expiry_horizon: config.expiry_horizon(),
        };
        Ok(Self::new(
            store,
            Arc::new(ReqwestTransport::new()),
            endpoints,
            scheduler_config,
        ))
    }

    /// Install the hook run whenever the session ends involuntarily.
    pub fn on_session_expired(&self, hook: SessionExpiredHook) {
        self.expiry.set_hook(hook);
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn endpoints(&self) -> &ApiEndpoints {
        &self.endpoints
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    /// Create an account and start a session.
    pub async fn signup(&self, email: &str, password: &str, name: &str) -> AuthResult<UserProfile> {
        debug!(email = %email, "Signing up");
        let body = Credentials {
            email,
            password,
            name: Some(name),
        };
        self.open_session(self.endpoints.signup(), &body).await
    }

    /// Log in and start a session.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<UserProfile> {
        debug!(email = %email, "Logging in");
        let body = Credentials {
            email,
            password,
            name: None,
        };
        self.open_session(self.endpoints.login(), &body).await
    }

    async fn open_session(&self, url: String, body: &Credentials<'_>) -> AuthResult<UserProfile> {
        let response = self.transport.send(ApiRequest::post(url).json(body)?).await?;

        if !response.is_success() {
            let status = response.status;
            let message = response.error_message();
            warn!(status = %status, message = %message, "Authentication rejected");
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::CONFLICT => {
                    AuthError::InvalidCredentials(message)
                }
                _ => AuthError::Api {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let session: SessionResponse = response.json()?;
        self.coordinator.reset();
        self.store
            .set_session(&session.access_token, &session.refresh_token, &session.user);
        self.scheduler.start();

        info!(user_name = %session.user.name, "Session started");
        Ok(session.user)
    }

    /// End the session: stop the scheduler, tell the server (best effort) and
    /// clear local state. Does not run the session-expired hook.
    pub async fn logout(&self) {
        self.scheduler.stop();
        self.coordinator.reset();

        if let Some(access_token) = self.store.get_access_token() {
            if let Err(e) = self.revoke(&access_token).await {
                warn!(error = %e, "Logout request failed");
            }
        }

        self.store.clear_session();
        info!("Logged out");
    }

    async fn revoke(&self, access_token: &str) -> AuthResult<()> {
        let request = ApiRequest::post(self.endpoints.logout()).bearer(access_token)?;
        self.transport.send(request).await?;
        Ok(())
    }

    /// Fetch the current user and refresh the cached profile.
    pub async fn current_user(&self) -> AuthResult<UserProfile> {
        let response = self
            .fetcher
            .fetch(ApiRequest::get(self.endpoints.me()))
            .await?
            .error_for_status()?;
        let envelope: UserEnvelope = response.json()?;
        self.store.set_user(&envelope.user);
        Ok(envelope.user)
    }

    /// Change the display name.
    pub async fn update_profile(&self, name: &str) -> AuthResult<UserProfile> {
        let request =
            ApiRequest::put(self.endpoints.profile()).json(&serde_json::json!({ "name": name }))?;
        let response = self.fetcher.fetch(request).await?.error_for_status()?;
        let envelope: UserEnvelope = response.json()?;
        self.store.set_user(&envelope.user);
        info!(user_name = %envelope.user.name, "Profile updated");
        Ok(envelope.user)
    }

    /// Change the password. Tokens are left as they are.
    pub async fn change_password(&self, current_password: &str, new_password: &str) -> AuthResult<()> {
        let request = ApiRequest::put(self.endpoints.change_password()).json(&PasswordChange {
            current_password,
            new_password,
        })?;
        self.fetcher.fetch(request).await?.error_for_status()?;
        info!("Password changed");
        Ok(())
    }

    /// Create an administrator account. The server requires an admin caller.
    pub async fn create_admin(&self, email: &str, password: &str, name: &str) -> AuthResult<()> {
        let request = ApiRequest::post(self.endpoints.create_admin()).json(&Credentials {
            email,
            password,
            name: Some(name),
        })?;
        self.fetcher.fetch(request).await?.error_for_status()?;
        info!(email = %email, "Admin account created");
        Ok(())
    }

    /// Authenticated request to any API path. Non-success responses are
    /// returned, not converted to errors.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> AuthResult<ApiResponse> {
        let mut request = ApiRequest::new(method, self.endpoints.url(path));
        if let Some(body) = body {
            request = request.json(body)?;
        }
        self.fetcher.fetch(request).await
    }

    /// Authenticated request, as built by the caller.
    pub async fn fetch(&self, request: ApiRequest) -> AuthResult<ApiResponse> {
        self.fetcher.fetch(request).await
    }

    /// Request without credentials. No token is attached and a 401 is
    /// returned as is.
    pub async fn send_public(&self, request: ApiRequest) -> AuthResult<ApiResponse> {
        self.transport.send(request).await
    }

    /// Unauthenticated health check. Returns the body as JSON, or as a JSON
    /// string when the server answers with plain text.
    pub async fn health(&self) -> AuthResult<serde_json::Value> {
        let response = self
            .send_public(ApiRequest::get(self.endpoints.health()))
            .await?
            .error_for_status()?;
        Ok(serde_json::from_slice(&response.body)
            .unwrap_or_else(|_| serde_json::Value::String(response.text())))
    }

    /// Gate for operations that need a session. Runs the session-expired hook
    /// when there is none.
    pub fn require_auth(&self) -> AuthResult<()> {
        if self.store.is_authenticated() {
            return Ok(());
        }
        self.expiry.notify();
        Err(AuthError::Unauthenticated)
    }

    /// Resume background refresh for a stored session, if there is one.
    pub fn resume(&self) -> bool {
        if self.store.get_refresh_token().is_none() {
            return false;
        }
        self.scheduler.start();
        true
    }

    pub fn status(&self) -> AuthStatus {
        let access_token = self.store.get_access_token();
        let horizon = self.scheduler.config().expiry_horizon;

        AuthStatus {
            authenticated: self.store.is_authenticated(),
            has_access_token: access_token.is_some(),
            has_refresh_token: self.store.get_refresh_token().is_some(),
            access_expires_at: access_token.as_deref().and_then(inspector::expires_at),
            access_expiring_soon: access_token
                .as_deref()
                .map(|token| inspector::is_expiring_soon(token, horizon))
                .unwrap_or(false),
            user: self.store.get_user(),
            scheduler: self.scheduler.state(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{endpoints, json_response, token_expiring_in, HookCounter, MockTransport};
    use reqwest::header::AUTHORIZATION;
    use sauron_storage::{MemoryStorage, SessionStorage, StorageKeys};
    use serde_json::json;

    fn client(transport: Arc<MockTransport>) -> (AuthClient, HookCounter) {
        let client = AuthClient::new(
            Arc::new(TokenStore::in_memory()),
            transport,
            endpoints(),
            SchedulerConfig::default(),
        );
        let hook = HookCounter::default();
        client.on_session_expired(hook.hook());
        (client, hook)
    }

    fn session_body(access: &str, refresh: &str) -> serde_json::Value {
        json!({
            "accessToken": access,
            "refreshToken": refresh,
            "user": { "name": "Ada" }
        })
    }

    #[tokio::test]
    async fn test_login_populates_store_and_starts_scheduler() {
        let transport = MockTransport::new(|_request| Ok(json_response(200, session_body("a1", "r1"))));
        let (client, _) = client(transport.clone());

        let user = client.login("ada@example.com", "secret").await.unwrap();

        assert_eq!(user.name, "Ada");
        assert_eq!(client.store().get_access_token(), Some("a1".to_string()));
        assert_eq!(client.store().get_refresh_token(), Some("r1".to_string()));
        assert_eq!(client.store().get_user().unwrap().name, "Ada");
        assert!(client.store().is_authenticated());
        assert!(client.scheduler().is_running());

        let sent = &transport.requests_to("/api/auth/login")[0];
        assert_eq!(
            sent.body.as_deref(),
            Some(r#"{"email":"ada@example.com","password":"secret"}"#)
        );
        assert!(sent.headers.get(AUTHORIZATION).is_none());

        client.logout().await;
    }

    #[tokio::test]
    async fn test_signup_sends_name() {
        let transport = MockTransport::new(|_request| Ok(json_response(201, session_body("a1", "r1"))));
        let (client, _) = client(transport.clone());

        client.signup("ada@example.com", "secret", "Ada").await.unwrap();

        let sent = &transport.requests_to("/api/auth/signup")[0];
        let body: serde_json::Value = serde_json::from_str(sent.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({ "email": "ada@example.com", "password": "secret", "name": "Ada" }));
        assert!(client.store().is_authenticated());
        client.logout().await;
    }

    #[tokio::test]
    async fn test_login_rejected_keeps_store_empty() {
        let transport = MockTransport::new(|_request| {
            Ok(json_response(401, json!({ "message": "Invalid email or password" })))
        });
        let (client, hook) = client(transport);

        let err = client.login("ada@example.com", "wrong").await.unwrap_err();

        match err {
            AuthError::InvalidCredentials(message) => assert_eq!(message, "Invalid email or password"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!client.store().is_authenticated());
        assert!(!client.scheduler().is_running());
        assert_eq!(hook.count(), 0);
    }

    #[tokio::test]
    async fn test_logout_calls_endpoint_and_clears() {
        let transport = MockTransport::new(|request| {
            if request.url.ends_with("/api/auth/logout") {
                return Ok(json_response(200, json!({})));
            }
            Ok(json_response(200, session_body("a1", "r1")))
        });
        let (client, hook) = client(transport.clone());
        client.login("ada@example.com", "secret").await.unwrap();

        client.logout().await;

        let sent = transport.requests_to("/api/auth/logout");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].bearer_token(), Some("a1"));
        assert!(sent[0].body.is_none());
        assert!(!client.store().is_authenticated());
        assert!(!client.scheduler().is_running());
        assert_eq!(hook.count(), 0);
    }

    #[tokio::test]
    async fn test_logout_survives_network_failure() {
        let transport = MockTransport::new(|request| {
            if request.url.ends_with("/api/auth/logout") {
                return Err(AuthError::NetworkUnavailable);
            }
            Ok(json_response(200, session_body("a1", "r1")))
        });
        let (client, _) = client(transport);
        client.login("ada@example.com", "secret").await.unwrap();

        client.logout().await;

        assert!(!client.store().is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_without_access_token_skips_endpoint() {
        let transport = MockTransport::new(|_request| Ok(json_response(200, json!({}))));
        let (client, _) = client(transport.clone());

        client.logout().await;
        client.logout().await;

        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_current_user_updates_cache() {
        let transport = MockTransport::new(|_request| {
            Ok(json_response(
                200,
                json!({ "user": { "_id": "u1", "name": "Ada Lovelace", "role": "admin" } }),
            ))
        });
        let (client, _) = client(transport.clone());
        client.store().set_session("a1", "r1", &UserProfile::named("Ada"));

        let user = client.current_user().await.unwrap();

        assert_eq!(user.name, "Ada Lovelace");
        assert!(user.is_admin());
        assert_eq!(client.store().get_user(), Some(user));
        assert_eq!(transport.requests()[0].method, Method::GET);
    }

    #[tokio::test]
    async fn test_update_profile_caches_user() {
        let transport = MockTransport::new(|_request| {
            Ok(json_response(200, json!({ "message": "ok", "user": { "name": "Grace" } })))
        });
        let (client, _) = client(transport.clone());
        client.store().set_session("a1", "r1", &UserProfile::named("Ada"));

        let user = client.update_profile("Grace").await.unwrap();

        assert_eq!(user.name, "Grace");
        assert_eq!(client.store().get_user().unwrap().name, "Grace");
        let sent = &transport.requests()[0];
        assert_eq!(sent.method, Method::PUT);
        assert_eq!(sent.body.as_deref(), Some(r#"{"name":"Grace"}"#));
    }

    #[tokio::test]
    async fn test_change_password_leaves_tokens() {
        let transport = MockTransport::new(|_request| Ok(json_response(200, json!({}))));
        let (client, _) = client(transport.clone());
        client.store().set_session("a1", "r1", &UserProfile::named("Ada"));

        client.change_password("old", "new").await.unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(
            sent.body.as_deref(),
            Some(r#"{"currentPassword":"old","newPassword":"new"}"#)
        );
        assert_eq!(client.store().get_access_token(), Some("a1".to_string()));
        assert_eq!(client.store().get_refresh_token(), Some("r1".to_string()));
    }

    #[tokio::test]
    async fn test_change_password_wrong_current_is_api_error() {
        let transport = MockTransport::new(|_request| {
            Ok(json_response(400, json!({ "message": "Current password is incorrect" })))
        });
        let (client, _) = client(transport);
        client.store().set_session("a1", "r1", &UserProfile::named("Ada"));

        let err = client.change_password("bad", "new").await.unwrap_err();

        assert!(matches!(err, AuthError::Api { status: 400, .. }));
        assert!(client.store().is_authenticated());
    }

    #[tokio::test]
    async fn test_create_admin_forbidden_for_non_admin() {
        let transport = MockTransport::new(|_request| {
            Ok(json_response(403, json!({ "message": "Admin access required" })))
        });
        let (client, hook) = client(transport);
        client.store().set_session("a1", "r1", &UserProfile::named("Ada"));

        let err = client
            .create_admin("root@example.com", "secret", "Root")
            .await
            .unwrap_err();

        match err {
            AuthError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Admin access required");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(client.store().is_authenticated());
        assert_eq!(hook.count(), 0);
    }

    #[tokio::test]
    async fn test_request_resumes_session_with_refresh_token() {
        let transport = MockTransport::new(|request| {
            if request.url.ends_with("/api/auth/refresh") {
                return Ok(json_response(200, json!({ "accessToken": "a2", "refreshToken": "r2" })));
            }
            Ok(json_response(200, json!({ "items": [] })))
        });
        // A new process: only the durable scope survived.
        let durable = Arc::new(MemoryStorage::new());
        durable.set(StorageKeys::REFRESH_TOKEN, "r1").unwrap();
        let store = Arc::new(TokenStore::new(Arc::new(MemoryStorage::new()), durable));
        let client = AuthClient::new(store, transport.clone(), endpoints(), SchedulerConfig::default());

        assert!(client.resume());
        assert!(client.scheduler().is_running());

        let response = client.request(Method::GET, "/api/dsa", None).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        let target = &transport.requests_to("/api/dsa")[0];
        assert_eq!(target.url, "http://api.test/api/dsa");
        assert_eq!(target.bearer_token(), Some("a2"));
        client.scheduler().stop();
    }

    #[tokio::test]
    async fn test_health_needs_no_session() {
        let transport = MockTransport::new(|_request| Ok(json_response(200, json!({ "status": "ok" }))));
        let (client, hook) = client(transport.clone());

        let body = client.health().await.unwrap();

        assert_eq!(body, json!({ "status": "ok" }));
        let sent = &transport.requests()[0];
        assert_eq!(sent.url, "http://api.test/health");
        assert_eq!(sent.method, Method::GET);
        assert!(sent.headers.get(AUTHORIZATION).is_none());
        assert_eq!(hook.count(), 0);
    }

    #[tokio::test]
    async fn test_health_plain_text_and_failure() {
        let transport = MockTransport::new(|_request| Ok(ApiResponse::new(StatusCode::OK, "OK")));
        let (client, _) = client(transport);
        assert_eq!(client.health().await.unwrap(), json!("OK"));

        let transport = MockTransport::new(|_request| {
            Ok(json_response(503, json!({ "message": "maintenance" })))
        });
        let (client, _) = self::client(transport);
        assert!(matches!(
            client.health().await,
            Err(AuthError::Api { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_send_public_skips_auth_and_refresh() {
        let transport = MockTransport::new(|_request| Ok(json_response(401, json!({}))));
        let (client, hook) = client(transport.clone());
        client
            .store()
            .set_session("a1", "r1", &UserProfile::named("Ada"));

        let response = client
            .send_public(ApiRequest::get(client.endpoints().dsa()))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(transport.requests().len(), 1);
        assert!(transport.requests()[0].headers.get(AUTHORIZATION).is_none());
        assert!(client.store().is_authenticated());
        assert_eq!(hook.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_during_refresh_stays_logged_out() {
        let transport = MockTransport::with_latency(std::time::Duration::from_secs(5), |_request| {
            Ok(json_response(200, json!({ "accessToken": "a2", "refreshToken": "r2" })))
        });
        let (client, hook) = client(transport.clone());
        client
            .store()
            .set_session("a1", "r1", &UserProfile::named("Ada"));

        let coordinator = client.coordinator().clone();
        let pending = tokio::spawn(async move { coordinator.refresh().await });
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;

        client.logout().await;
        let _ = pending.await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(10)).await;

        assert!(!client.store().is_authenticated());
        assert!(!client.coordinator().is_refreshing());
        assert_eq!(hook.count(), 0);
    }

    #[test]
    fn test_resume_without_session_does_nothing() {
        let transport = MockTransport::new(|_request| Ok(json_response(200, json!({}))));
        let (client, _) = client(transport);

        assert!(!client.resume());
        assert!(!client.scheduler().is_running());
    }

    #[test]
    fn test_require_auth_fires_hook_without_session() {
        let transport = MockTransport::new(|_request| Ok(json_response(200, json!({}))));
        let (client, hook) = client(transport);

        assert!(matches!(client.require_auth(), Err(AuthError::Unauthenticated)));
        assert_eq!(hook.count(), 1);

        client.store().set_session("a1", "r1", &UserProfile::named("Ada"));
        assert!(client.require_auth().is_ok());
        assert_eq!(hook.count(), 1);
    }

    #[test]
    fn test_status_snapshot() {
        let transport = MockTransport::new(|_request| Ok(json_response(200, json!({}))));
        let (client, _) = client(transport);

        let status = client.status();
        assert!(!status.authenticated);
        assert!(!status.access_expiring_soon);
        assert_eq!(status.scheduler, SchedulerState::Stopped);

        client
            .store()
            .set_session(&token_expiring_in(120), "r1", &UserProfile::named("Ada"));
        let status = client.status();
        assert!(status.authenticated);
        assert!(status.has_access_token && status.has_refresh_token);
        assert!(status.access_expires_at.is_some());
        assert!(status.access_expiring_soon);
        assert_eq!(status.user.unwrap().name, "Ada");
    }
}
