//! Token manager: owns the authentication state and the single refresh
//! that may be in flight at any time.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::store::CredentialStore;
use super::token::{
    refresh_from_cookies, resolve_expiry, AccessToken, AuthState, AuthStateKind, Credentials,
    TokenResponse,
};
use crate::client::ClientConfig;
use crate::error::{vendor_message, ErrorCode, ErrorSummary, AUTH_RUNBOOK};
use crate::models::ServiceKey;
use crate::{Error, Result};

/// Reason reported when the store holds no refresh token.
pub const MISSING_REFRESH_TOKEN: &str = "missing_refresh_token";

type PendingRefresh = Shared<BoxFuture<'static, std::result::Result<(), ErrorSummary>>>;

/// The vendor's token endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthEndpoints {
    /// API base the endpoints hang off
    pub auth_base: String,
    /// Username/password exchange
    pub token_url: String,
    /// Refresh-token exchange
    pub refresh_url: String,
}

impl AuthEndpoints {
    /// Derive the token endpoints from the backoffice API base.
    pub fn from_api_base(api_base: &Url) -> Self {
        let base = api_base.as_str().trim_end_matches('/').to_string();
        Self {
            token_url: format!("{}/token/", base),
            refresh_url: format!("{}/token/refresh/", base),
            auth_base: base,
        }
    }
}

/// Result of a successful bootstrap.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapReport {
    /// Always `true`; failures are returned as errors
    pub ok: bool,
    /// Endpoints used
    #[serde(flatten)]
    pub endpoints: AuthEndpoints,
    /// Whether a refresh token was issued and written to the store
    pub stored_refresh: bool,
    /// Expiry of the access token just issued
    pub expires_at: DateTime<Utc>,
    /// Operator-facing summary
    pub note: String,
}

/// Result of an `auth.status` probe.
#[derive(Debug, Clone, Serialize)]
pub struct AuthStatus {
    /// `true` when requests can be authenticated
    pub ok: bool,
    /// `AUTH_OK`, or the code of the failure
    pub status: &'static str,
    /// Token manager state after the probe
    pub state: AuthStateKind,
    /// Access token expiry, when holding one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Why the probe failed, or a note on an expired token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Recovery steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<&'static str>,
    /// Endpoints in use
    #[serde(flatten)]
    pub endpoints: AuthEndpoints,
    #[serde(skip)]
    code: Option<ErrorCode>,
}

impl AuthStatus {
    /// The failure class, if the probe failed.
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.code
    }

    fn from_state(endpoints: &AuthEndpoints, state: &AuthState) -> Self {
        let mut status = Self {
            ok: true,
            status: "AUTH_OK",
            state: state.kind(),
            expires_at: None,
            reason: None,
            fix: None,
            endpoints: endpoints.clone(),
            code: None,
        };
        match state {
            AuthState::Authenticated(token) => {
                status.expires_at = Some(token.expires_at());
                if token.is_expired() {
                    status.reason =
                        Some("access token expired; it is refreshed on the next request".into());
                }
            }
            AuthState::Failed(reason) => {
                status.fail(ErrorCode::AuthFailed, reason.clone());
            }
            AuthState::Unauthenticated => {
                status.fail(ErrorCode::AuthFailed, MISSING_REFRESH_TOKEN.into());
            }
        }
        status
    }

    fn from_error(endpoints: &AuthEndpoints, state: &AuthState, err: &Error) -> Self {
        let mut status = Self::from_state(endpoints, state);
        status.fail(err.code(), err.reason());
        status
    }

    fn fail(&mut self, code: ErrorCode, reason: String) {
        self.ok = false;
        self.status = code.as_str();
        self.reason = Some(reason);
        self.fix = (code == ErrorCode::AuthFailed).then_some(AUTH_RUNBOOK);
        self.code = Some(code);
    }
}

/// Owns the authentication state of one client.
///
/// Cheap to clone; clones share state. At most one refresh runs at a time:
/// concurrent callers that find the token expired (or rejected) await the
/// same refresh. The refresh itself runs on a spawned task, so a caller that
/// stops waiting never leaves the state half-updated.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    http: reqwest::Client,
    endpoints: AuthEndpoints,
    store: Arc<dyn CredentialStore>,
    service_key: ServiceKey,
    refresh_margin: Duration,
    default_lifetime: Duration,
    state: RwLock<AuthState>,
    generation: AtomicU64,
    inflight: Mutex<Option<PendingRefresh>>,
}

struct IssuedTokens {
    access: SecretString,
    refresh: Option<SecretString>,
    expires_in: Option<i64>,
}

impl TokenManager {
    /// Create a token manager in the `Unauthenticated` state.
    pub fn new(
        http: reqwest::Client,
        endpoints: AuthEndpoints,
        store: Arc<dyn CredentialStore>,
        service_key: ServiceKey,
        config: &ClientConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                http,
                endpoints,
                store,
                service_key,
                refresh_margin: Duration::seconds(config.refresh_buffer_secs),
                default_lifetime: Duration::seconds(config.default_token_lifetime_secs),
                state: RwLock::new(AuthState::Unauthenticated),
                generation: AtomicU64::new(0),
                inflight: Mutex::new(None),
            }),
        }
    }

    /// The token endpoints in use.
    pub fn endpoints(&self) -> &AuthEndpoints {
        &self.inner.endpoints
    }

    /// The credential store key.
    pub fn service_key(&self) -> &ServiceKey {
        &self.inner.service_key
    }

    /// Snapshot of the current state.
    pub async fn state(&self) -> AuthState {
        self.inner.state.read().await.clone()
    }

    /// Exchange username/password for tokens and persist the refresh token.
    ///
    /// Re-running replaces the stored refresh token. A successful bootstrap
    /// is the only way out of the `Failed` state.
    ///
    /// # Errors
    ///
    /// - [`Error::AuthFailed`] if the vendor rejects the credentials
    /// - [`Error::StoreUnavailable`] if the refresh token cannot be stored
    #[instrument(skip_all, fields(service = %self.inner.service_key))]
    pub async fn bootstrap(&self, credentials: &Credentials) -> Result<BootstrapReport> {
        // Let a running refresh land first, then hold the slot so no refresh
        // starts until the new token is stored.
        let _slot = loop {
            let slot = self.inner.inflight.lock().await;
            match (*slot).clone() {
                None => break slot,
                Some(pending) => {
                    drop(slot);
                    let _ = pending.await;
                }
            }
        };
        info!("bootstrapping refresh token");

        let issued = match self.inner.login(credentials).await {
            Ok(issued) => issued,
            Err(err) => {
                if let Error::AuthFailed(reason) = &err {
                    warn!(reason = %reason, "credentials rejected");
                    self.inner.set_state(AuthState::Failed(reason.clone())).await;
                }
                return Err(err);
            }
        };

        let stored_refresh = match &issued.refresh {
            Some(refresh) => {
                self.inner.store.store(&self.inner.service_key, refresh)?;
                true
            }
            None => {
                warn!("vendor issued no refresh token; the session ends with this process");
                false
            }
        };

        let token = self.inner.install(issued.access, issued.expires_in).await;
        info!(
            generation = token.generation(),
            expires_at = %token.expires_at(),
            stored_refresh,
            "bootstrap complete"
        );

        let note = if stored_refresh {
            format!(
                "Refresh token stored under service '{}'. Credentials are no longer needed.",
                self.inner.service_key
            )
        } else {
            "No refresh token was issued; only this process is authenticated.".to_string()
        };

        Ok(BootstrapReport {
            ok: true,
            endpoints: self.inner.endpoints.clone(),
            stored_refresh,
            expires_at: token.expires_at(),
            note,
        })
    }

    /// Report the authentication state.
    ///
    /// Answers from the cached state without network access. With no cached
    /// state, performs one silent refresh from the store to find out.
    pub async fn status(&self) -> AuthStatus {
        let state = self.state().await;
        if !matches!(state, AuthState::Unauthenticated) {
            return AuthStatus::from_state(&self.inner.endpoints, &state);
        }

        debug!("no cached token, probing with a refresh");
        match self.refresh_once(None).await {
            Ok(()) => AuthStatus::from_state(&self.inner.endpoints, &self.state().await),
            Err(err) => AuthStatus::from_error(&self.inner.endpoints, &self.state().await, &err),
        }
    }

    /// A token valid for at least the refresh margin, refreshing first if
    /// needed.
    ///
    /// # Errors
    ///
    /// - [`Error::AuthFailed`] in the `Failed` state (no network call), when
    ///   no refresh token is stored, or when the refresh is rejected
    /// - [`Error::StoreUnavailable`] if the store cannot be read or written
    pub async fn access_token(&self) -> Result<AccessToken> {
        if let Some(token) = self.inner.usable_token().await? {
            return Ok(token);
        }
        self.refresh_once(None).await?;
        self.inner.current_token().await
    }

    /// Replace a token the vendor rejected.
    ///
    /// `stale_generation` is the generation of the rejected token. If a newer
    /// token has been issued meanwhile it is returned without another
    /// refresh, so concurrent callers hitting the same 401 share one refresh.
    ///
    /// # Errors
    ///
    /// Same as [`access_token`](Self::access_token).
    pub async fn force_refresh(&self, stale_generation: u64) -> Result<AccessToken> {
        self.refresh_once(Some(stale_generation)).await?;
        self.inner.current_token().await
    }

    async fn refresh_once(&self, stale_generation: Option<u64>) -> Result<()> {
        let pending = {
            let mut slot = self.inner.inflight.lock().await;
            match slot.as_ref() {
                Some(pending) => pending.clone(),
                None => {
                    if !self.inner.needs_refresh(stale_generation).await {
                        return Ok(());
                    }
                    let pending = self.spawn_refresh();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };
        pending.await.map_err(Error::from)
    }

    /// Start a refresh on its own task. The task clears the slot once the
    /// new state is in place.
    fn spawn_refresh(&self) -> PendingRefresh {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let outcome = inner
                .refresh_from_store()
                .await
                .map_err(|err| ErrorSummary::from(&err));
            inner.inflight.lock().await.take();
            outcome
        });

        let owner = Arc::clone(&self.inner);
        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    owner.inflight.lock().await.take();
                    Err(ErrorSummary::from(&Error::AuthFailed(format!(
                        "token refresh task aborted: {}",
                        join_err
                    ))))
                }
            }
        }
        .boxed()
        .shared()
    }
}

impl ManagerInner {
    async fn set_state(&self, state: AuthState) {
        *self.state.write().await = state;
    }

    async fn usable_token(&self) -> Result<Option<AccessToken>> {
        match &*self.state.read().await {
            AuthState::Authenticated(token) if !token.expires_within(self.refresh_margin) => {
                Ok(Some(token.clone()))
            }
            AuthState::Failed(reason) => Err(Error::AuthFailed(reason.clone())),
            _ => Ok(None),
        }
    }

    async fn current_token(&self) -> Result<AccessToken> {
        match &*self.state.read().await {
            AuthState::Authenticated(token) if !token.is_expired() => Ok(token.clone()),
            AuthState::Failed(reason) => Err(Error::AuthFailed(reason.clone())),
            _ => Err(Error::AuthFailed(
                "no valid access token after refresh".to_string(),
            )),
        }
    }

    async fn needs_refresh(&self, stale_generation: Option<u64>) -> bool {
        match &*self.state.read().await {
            AuthState::Failed(_) => false,
            AuthState::Unauthenticated => true,
            AuthState::Authenticated(token) => match stale_generation {
                Some(stale) => token.generation() == stale || token.is_expired(),
                None => token.expires_within(self.refresh_margin),
            },
        }
    }

    async fn install(&self, access: SecretString, expires_in: Option<i64>) -> AccessToken {
        let expires_at = resolve_expiry(access.expose_secret(), expires_in, self.default_lifetime);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = AccessToken::new(access, expires_at, generation);
        self.set_state(AuthState::Authenticated(token.clone())).await;
        token
    }

    #[instrument(skip_all, fields(service = %self.service_key))]
    async fn refresh_from_store(&self) -> Result<()> {
        let Some(refresh) = self.store.load(&self.service_key)? else {
            debug!("no refresh token in store");
            return Err(Error::AuthFailed(format!(
                "{}: no refresh token stored under service '{}'",
                MISSING_REFRESH_TOKEN, self.service_key
            )));
        };

        let issued = match self.exchange_refresh(&refresh).await {
            Ok(issued) => issued,
            Err(err) => {
                let reason = match err {
                    Error::AuthFailed(reason) => reason,
                    other => format!("token refresh failed: {}", other),
                };
                warn!(reason = %reason, "token refresh failed, bootstrap required");
                self.set_state(AuthState::Failed(reason.clone())).await;
                return Err(Error::AuthFailed(reason));
            }
        };

        // Rotation revokes the stored token; persist before installing.
        let persisted = match &issued.refresh {
            Some(rotated) if rotated.expose_secret() != refresh.expose_secret() => {
                let persisted = self.store.store(&self.service_key, rotated);
                if persisted.is_ok() {
                    debug!("stored rotated refresh token");
                }
                persisted
            }
            _ => Ok(()),
        };

        let token = self.install(issued.access, issued.expires_in).await;
        info!(
            generation = token.generation(),
            expires_at = %token.expires_at(),
            "access token refreshed"
        );

        if let Err(err) = persisted {
            error!(
                error = %err,
                expires_at = %token.expires_at(),
                "rotated refresh token not stored, auth-bootstrap required once this token expires"
            );
            return Err(err);
        }
        Ok(())
    }

    async fn login(&self, credentials: &Credentials) -> Result<IssuedTokens> {
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .json(&serde_json::json!({
                "username": credentials.username(),
                "password": credentials.password().expose_secret(),
            }))
            .send()
            .await?;
        read_tokens(response, "credential login").await
    }

    async fn exchange_refresh(&self, refresh: &SecretString) -> Result<IssuedTokens> {
        let response = self
            .http
            .post(&self.endpoints.refresh_url)
            .json(&serde_json::json!({ "refresh": refresh.expose_secret() }))
            .send()
            .await?;
        read_tokens(response, "token refresh").await
    }
}

/// Read a token endpoint response. Error reasons carry only the vendor's
/// `detail`, never the body.
async fn read_tokens(response: reqwest::Response, action: &str) -> Result<IssuedTokens> {
    let status = response.status();
    let cookie_refresh = refresh_from_cookies(response.headers());
    let text = response.text().await?;

    if !status.is_success() {
        let detail = serde_json::from_str::<Value>(&text)
            .ok()
            .as_ref()
            .and_then(vendor_message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("no detail").to_string());
        let reason = format!("{} rejected (HTTP {}): {}", action, status.as_u16(), detail);
        return Err(if status.is_server_error() {
            Error::UpstreamUnavailable {
                attempts: 1,
                reason,
            }
        } else {
            Error::AuthFailed(reason)
        });
    }

    let body: TokenResponse = serde_json::from_str(&text).map_err(|_| {
        Error::AuthFailed(format!("{} returned an unreadable token response", action))
    })?;
    let access = body
        .access
        .filter(|access| !access.trim().is_empty())
        .ok_or_else(|| Error::AuthFailed(format!("{} response carried no access token", action)))?;
    let refresh = body
        .refresh
        .filter(|refresh| !refresh.trim().is_empty())
        .map(SecretString::from)
        .or(cookie_refresh);

    Ok(IssuedTokens {
        access: SecretString::from(access),
        refresh,
        expires_in: body.expires_in,
    })
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self
            .inner
            .state
            .try_read()
            .map(|state| format!("{:?}", state.kind()))
            .unwrap_or_else(|_| "<locked>".to_string());
        f.debug_struct("TokenManager")
            .field("service_key", &self.inner.service_key)
            .field("auth_base", &self.inner.endpoints.auth_base)
            .field("state", &state)
            .finish()
    }
}
