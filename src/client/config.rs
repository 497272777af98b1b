//! Client configuration options.

use std::time::Duration;

use chrono_tz::Tz;
use rand::Rng;
use url::Url;

use super::paginated::DEFAULT_PAGE_SIZE;
use crate::models::{CustomerId, ServiceKey};
use crate::{Error, Result};

/// Storefront base URL environment variable.
pub const BASE_URL_ENV: &str = "LOCAL_LINE_BASE_URL";
/// Backoffice API base environment variable.
pub const API_BASE_ENV: &str = "LOCAL_LINE_API_BASE";
/// Credential store key environment variable.
pub const SERVICE_KEY_ENV: &str = "LOCAL_LINE_KEYCHAIN_SERVICE";
/// Proof recipient environment variable.
pub const PROOF_CUSTOMER_ENV: &str = "LOCAL_LINE_PROOF_CUSTOMER_ID";
/// Fulfillment timezone environment variable.
pub const TIMEZONE_ENV: &str = "LOCAL_LINE_TIMEZONE";

/// Hub storefront used when none is configured.
pub const DEFAULT_BASE_URL: &str = "https://cfc.localline.ca";
/// Path of the backoffice API below the storefront.
pub const API_PATH: &str = "api/backoffice/v2/";
/// Timezone of the fulfillment week when none is configured.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Toronto;

/// Configuration for the HTTP client.
///
/// # Example
///
/// ```
/// use localline::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_timeout(Duration::from_secs(60))
///     .with_user_agent("hub-tools/1.0");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// User-Agent header value
    pub user_agent: String,
    /// Retry configuration
    pub retry: RetryConfig,
    /// Refresh the access token this many seconds before it expires
    pub refresh_buffer_secs: i64,
    /// Lifetime assumed for an access token that states none
    pub default_token_lifetime_secs: i64,
    /// `page_size` requested from list endpoints
    pub page_size: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("localline-rs/{} (Rust)", env!("CARGO_PKG_VERSION")),
            retry: RetryConfig::default(),
            refresh_buffer_secs: 60,
            default_token_lifetime_secs: 300,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the buffer time before expiry to refresh.
    pub fn with_refresh_buffer(mut self, secs: i64) -> Self {
        self.refresh_buffer_secs = secs;
        self
    }

    /// Set the lifetime assumed for tokens without an expiry.
    pub fn with_default_token_lifetime(mut self, secs: i64) -> Self {
        self.default_token_lifetime_secs = secs;
        self
    }

    /// Set the page size for list endpoints.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

/// Retry policy for rate limits and transient failures.
///
/// `max_attempts` counts every attempt including the first. Backoff doubles
/// from `initial_backoff` up to `max_backoff`, plus up to `jitter_factor`
/// of itself in random jitter. A `Retry-After` from the server replaces the
/// computed delay, capped at `max_retry_after`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Fraction of the backoff added as random jitter
    pub jitter_factor: f64,
    /// Longest server-requested delay that is honoured
    pub max_retry_after: Duration,
    /// HTTP status codes to retry on
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            jitter_factor: 0.3,
            max_retry_after: Duration::from_secs(60),
            retry_statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryConfig {
    /// Create a configuration that makes a single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Set the maximum number of attempts.
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max.max(1);
        self
    }

    /// Set the initial backoff duration.
    pub fn with_initial_backoff(mut self, duration: Duration) -> Self {
        self.initial_backoff = duration;
        self
    }

    /// Set the maximum backoff duration.
    pub fn with_max_backoff(mut self, duration: Duration) -> Self {
        self.max_backoff = duration;
        self
    }

    /// Set the jitter fraction; clamped to `0.0..=1.0`.
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Set the cap on server-requested delays.
    pub fn with_max_retry_after(mut self, duration: Duration) -> Self {
        self.max_retry_after = duration;
        self
    }

    /// Calculate the backoff duration for a given retry (0 for the first).
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let initial = self.initial_backoff.as_millis() as u64;
        let backoff_millis = initial.saturating_mul(2u64.saturating_pow(attempt));
        let max_millis = self.max_backoff.as_millis() as u64;
        Duration::from_millis(backoff_millis.min(max_millis))
    }

    /// Backoff for a given retry with jitter added. Never shorter than
    /// [`backoff_for_attempt`](Self::backoff_for_attempt).
    pub fn jittered_backoff(&self, attempt: u32) -> Duration {
        let base = self.backoff_for_attempt(attempt);
        if self.jitter_factor <= 0.0 {
            return base;
        }
        let spread: f64 = rand::thread_rng().gen_range(0.0..=self.jitter_factor);
        base + base.mul_f64(spread)
    }

    /// Delay for a server-supplied `Retry-After` in seconds.
    pub fn retry_after_delay(&self, secs: u64) -> Duration {
        Duration::from_secs(secs).min(self.max_retry_after)
    }

    /// Check if a status code should be retried.
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }
}

/// Deployment settings: where the hub lives and how this process talks to it.
///
/// # Example
///
/// ```
/// use localline::Settings;
///
/// let settings = Settings::from_lookup(|key| match key {
///     "LOCAL_LINE_BASE_URL" => Some("https://hub.localline.ca".to_string()),
///     _ => None,
/// })
/// .unwrap();
/// assert_eq!(
///     settings.api_base.as_str(),
///     "https://hub.localline.ca/api/backoffice/v2/"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Settings {
    /// Storefront base URL
    pub base_url: Url,
    /// Backoffice API base; always ends in `/`
    pub api_base: Url,
    /// Credential store key for the refresh token
    pub service_key: ServiceKey,
    /// Customer that receives proof emails
    pub proof_customer_id: Option<CustomerId>,
    /// Timezone the fulfillment week is computed in
    pub timezone: Tz,
    /// HTTP client configuration
    pub client: ClientConfig,
}

impl Settings {
    /// Settings for the hub at `base_url`, everything else default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `base_url` is not an http(s) URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = parse_base(BASE_URL_ENV, base_url)?;
        let api_base = base_url.join(API_PATH)?;
        Ok(Self {
            base_url,
            api_base,
            service_key: ServiceKey::default(),
            proof_customer_id: None,
            timezone: DEFAULT_TIMEZONE,
            client: ClientConfig::default(),
        })
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup. Blank values count as
    /// unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a malformed URL or unknown timezone.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut settings = Self::new(get(BASE_URL_ENV).as_deref().unwrap_or(DEFAULT_BASE_URL))?;
        if let Some(api_base) = get(API_BASE_ENV) {
            settings = settings.with_api_base(&api_base)?;
        }
        if let Some(service) = get(SERVICE_KEY_ENV) {
            settings.service_key = ServiceKey::new(service);
        }
        if let Some(customer) = get(PROOF_CUSTOMER_ENV) {
            settings.proof_customer_id = Some(CustomerId::new(customer));
        }
        if let Some(tz) = get(TIMEZONE_ENV) {
            settings.timezone = tz
                .parse::<Tz>()
                .map_err(|_| Error::Config(format!("{} is not a known timezone: {}", TIMEZONE_ENV, tz)))?;
        }
        Ok(settings)
    }

    /// Use a different backoffice API base.
    pub fn with_api_base(mut self, api_base: &str) -> Result<Self> {
        self.api_base = parse_base(API_BASE_ENV, api_base)?;
        Ok(self)
    }

    /// Set the credential store key.
    pub fn with_service_key(mut self, key: ServiceKey) -> Self {
        self.service_key = key;
        self
    }

    /// Set the proof email recipient.
    pub fn with_proof_customer(mut self, id: impl Into<CustomerId>) -> Self {
        self.proof_customer_id = Some(id.into());
        self
    }

    /// Set the fulfillment timezone.
    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.timezone = tz;
        self
    }

    /// Set the HTTP client configuration.
    pub fn with_client_config(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }
}

/// Parse a base URL, forcing a trailing slash so relative joins append.
fn parse_base(name: &str, raw: &str) -> Result<Url> {
    let mut raw = raw.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    let url = Url::parse(&raw)
        .map_err(|e| Error::Config(format!("{} is not a valid URL ({}): {}", name, e, raw)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!("{} must be an http(s) URL: {}", name, raw)));
    }
    Ok(url)
}
