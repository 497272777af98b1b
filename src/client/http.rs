//! HTTP client implementation for the Local Line backoffice API.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::api::{AuthService, CustomersService, OrdersService, PicklistsService, VendorsService};
use crate::auth::{AuthEndpoints, CredentialStore, KeyringStore, TokenManager};
use crate::error::vendor_message;
use crate::{Error, Result};

use super::config::Settings;
use super::paginated::{PageCursor, PaginatedStream};

/// Body of an outgoing request.
#[derive(Debug, Clone, Default)]
pub enum Payload {
    /// No body
    #[default]
    None,
    /// JSON body
    Json(Value),
    /// `application/x-www-form-urlencoded` body
    Form(Vec<(String, String)>),
}

/// The main client for the Local Line backoffice API.
///
/// Every request carries a valid access token from the client's
/// [`TokenManager`], is retried on rate limits and transient failures, and
/// is replayed once after a token refresh if the vendor rejects the token.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use localline::{DateRange, LocalLineClient, Settings};
/// use localline::auth::KeyringStore;
///
/// # async fn example() -> localline::Result<()> {
/// let client = LocalLineClient::new(Settings::from_env()?, Arc::new(KeyringStore::new()))?;
///
/// let range = DateRange::parse("2026-10-16", "2026-10-22")?;
/// let export = client.orders().export(&range).await?;
/// println!("{} orders", export.records.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalLineClient {
    pub(crate) inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) http: reqwest::Client,
    pub(crate) tokens: TokenManager,
    pub(crate) settings: Settings,
}

impl LocalLineClient {
    /// Create a client that keeps its refresh token in `store`.
    ///
    /// No network call is made; authentication happens on first use.
    pub fn new(settings: Settings, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.client.timeout)
            .user_agent(&settings.client.user_agent)
            .build()?;

        let tokens = TokenManager::new(
            http.clone(),
            AuthEndpoints::from_api_base(&settings.api_base),
            store,
            settings.service_key.clone(),
            &settings.client,
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                tokens,
                settings,
            }),
        })
    }

    /// Create a client backed by the OS keyring.
    pub fn with_keyring(settings: Settings) -> Result<Self> {
        Self::new(settings, Arc::new(KeyringStore::new()))
    }

    /// Get the auth service.
    pub fn auth(&self) -> AuthService {
        AuthService::new(self.inner.clone())
    }

    /// Get the picklists service.
    pub fn picklists(&self) -> PicklistsService {
        PicklistsService::new(self.inner.clone())
    }

    /// Get the orders service.
    pub fn orders(&self) -> OrdersService {
        OrdersService::new(self.inner.clone())
    }

    /// Get the customers service.
    pub fn customers(&self) -> CustomersService {
        CustomersService::new(self.inner.clone())
    }

    /// Get the vendors service.
    pub fn vendors(&self) -> VendorsService {
        VendorsService::new(self.inner.clone())
    }

    /// The token manager shared by every request of this client.
    pub fn tokens(&self) -> &TokenManager {
        &self.inner.tokens
    }

    /// The settings this client was built with.
    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Send an authenticated request to `path` below the API base.
    ///
    /// Returns the decoded JSON body; a non-JSON body comes back as
    /// `{"raw": "<text>"}` and an empty one as `null`.
    ///
    /// # Errors
    ///
    /// - [`Error::AuthFailed`] if no token can be obtained, or the vendor
    ///   rejects a freshly refreshed one
    /// - [`Error::RateLimited`] / [`Error::UpstreamUnavailable`] once the
    ///   retry budget is spent
    /// - [`Error::RequestInvalid`] for any other 4xx
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        payload: Payload,
    ) -> Result<Value> {
        let url = self.inner.endpoint(path, query)?;
        self.inner.execute(method, url, &payload).await
    }

    /// Lazily page through a list endpoint.
    pub fn paginate<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<PaginatedStream<T>> {
        let url = self.inner.endpoint(path, query)?;
        Ok(self.inner.paginate(url))
    }

    /// Continue paging from a cursor taken from an earlier stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the cursor does not belong to this
    /// client's API origin.
    pub fn resume<T: DeserializeOwned>(&self, cursor: &PageCursor) -> Result<PaginatedStream<T>> {
        if cursor.url().origin() != self.inner.settings.api_base.origin() {
            return Err(Error::Validation(
                "page cursor belongs to a different API origin".into(),
            ));
        }
        Ok(self.inner.paginate(cursor.url().clone()))
    }
}

impl ClientInner {
    /// Resolve `path` against the API base and append `query`.
    pub(crate) fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = self.settings.api_base.join(path.trim_start_matches('/'))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    /// POST to `path`.
    pub(crate) async fn post(
        &self,
        path: &str,
        query: &[(&str, String)],
        payload: Payload,
    ) -> Result<Value> {
        let url = self.endpoint(path, query)?;
        self.execute(Method::POST, url, &payload).await
    }

    pub(crate) fn paginate<T: DeserializeOwned>(self: &Arc<Self>, first: Url) -> PaginatedStream<T> {
        let inner = Arc::clone(self);
        PaginatedStream::new(first, move |url: Url| {
            let inner = inner.clone();
            Box::pin(async move { inner.execute(Method::GET, url, &Payload::None).await })
        })
    }

    /// Send a request with authentication, retries and one auth replay.
    pub(crate) async fn execute(&self, method: Method, url: Url, payload: &Payload) -> Result<Value> {
        let retry = &self.settings.client.retry;
        let max_attempts = retry.max_attempts.max(1);
        let mut token = self.tokens.access_token().await?;
        let mut replayed_auth = false;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!(%method, path = url.path(), attempt, "sending request");

            let response = match self.send(&method, &url, payload, token.header_value()?).await {
                Ok(response) => response,
                Err(err) => {
                    if attempt >= max_attempts {
                        return Err(Error::UpstreamUnavailable {
                            attempts: attempt,
                            reason: err.without_url().to_string(),
                        });
                    }
                    let delay = retry.jittered_backoff(attempt - 1);
                    warn!(error = %err.without_url(), attempt, delay_ms = delay.as_millis() as u64, "request failed, retrying");
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                return read_body(response).await;
            }

            if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                if replayed_auth {
                    return Err(Error::AuthFailed(format!(
                        "vendor rejected a freshly refreshed access token (HTTP {})",
                        status.as_u16()
                    )));
                }
                replayed_auth = true;
                warn!(status = status.as_u16(), generation = token.generation(), "access token rejected, refreshing");
                token = self.tokens.force_refresh(token.generation()).await?;
                continue;
            }

            let retry_after = retry_after_secs(response.headers());
            let body = read_body(response).await.unwrap_or(Value::Null);

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt >= max_attempts {
                    return Err(Error::RateLimited {
                        attempts: attempt,
                        retry_after_secs: retry_after,
                    });
                }
                let delay = retry_after
                    .map(|secs| retry.retry_after_delay(secs))
                    .unwrap_or_else(|| retry.jittered_backoff(attempt - 1));
                warn!(attempt, retry_after, delay_ms = delay.as_millis() as u64, "rate limited, backing off");
                tokio::time::sleep(delay).await;
                continue;
            }

            if status.is_server_error() || retry.should_retry_status(status.as_u16()) {
                let reason = match vendor_message(&body) {
                    Some(detail) => format!("HTTP {}: {}", status.as_u16(), detail),
                    None => format!("HTTP {}", status.as_u16()),
                };
                if attempt >= max_attempts {
                    return Err(Error::UpstreamUnavailable {
                        attempts: attempt,
                        reason,
                    });
                }
                let delay = retry.jittered_backoff(attempt - 1);
                warn!(%reason, attempt, delay_ms = delay.as_millis() as u64, "upstream error, retrying");
                tokio::time::sleep(delay).await;
                continue;
            }

            return Err(Error::from_api_response(status.as_u16(), body));
        }
    }

    async fn send(
        &self,
        method: &Method,
        url: &Url,
        payload: &Payload,
        authorization: HeaderValue,
    ) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(AUTHORIZATION, authorization);
        request = match payload {
            Payload::None => request,
            Payload::Json(body) => request.json(body),
            Payload::Form(fields) => request.form(fields),
        };
        request.send().await
    }
}

/// Decode a response body: JSON when possible, `{"raw": text}` otherwise,
/// `null` when empty.
async fn read_body(response: reqwest::Response) -> Result<Value> {
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text).unwrap_or_else(|_| serde_json::json!({ "raw": text })))
}

/// `Retry-After` in seconds. HTTP-date values are ignored.
fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
}

impl std::fmt::Debug for LocalLineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalLineClient")
            .field("api_base", &self.inner.settings.api_base.as_str())
            .field("tokens", &self.inner.tokens)
            .finish()
    }
}
