//! Credentials, access tokens and the authentication state.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Environment variable holding the bootstrap username.
pub const USERNAME_ENV: &str = "LOCALLINE_USERNAME";

/// Environment variable holding the bootstrap password.
pub const PASSWORD_ENV: &str = "LOCALLINE_PASSWORD";

/// Cookie names the vendor has used to hand out the refresh token.
const REFRESH_COOKIE_NAMES: [&str; 5] = [
    "refresh",
    "refresh_token",
    "jwt_refresh_token",
    "ll_refresh",
    "token_refresh",
];

/// Username and password used once to bootstrap the refresh token.
///
/// Never persisted and never logged.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    /// Create credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if either value is blank.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let username = username.into().trim().to_string();
        let password = password.into();
        if username.is_empty() || password.trim().is_empty() {
            return Err(Error::Validation(format!(
                "{} and {} must both be set and non-empty",
                USERNAME_ENV, PASSWORD_ENV
            )));
        }
        Ok(Self {
            username,
            password: SecretString::from(password),
        })
    }

    /// Read credentials from `LOCALLINE_USERNAME` and `LOCALLINE_PASSWORD`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if either variable is missing or blank.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::new(
            lookup(USERNAME_ENV).unwrap_or_default(),
            lookup(PASSWORD_ENV).unwrap_or_default(),
        )
    }

    /// The username.
    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &SecretString {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// A short-lived bearer token.
#[derive(Clone)]
pub struct AccessToken {
    value: SecretString,
    expires_at: DateTime<Utc>,
    generation: u64,
}

impl AccessToken {
    pub(crate) fn new(value: SecretString, expires_at: DateTime<Utc>, generation: u64) -> Self {
        Self {
            value,
            expires_at,
            generation,
        }
    }

    /// When the vendor stops accepting this token.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Sequence number of this token within the process; each refresh or
    /// bootstrap issues the next one.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Check if the token has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Check if the token will expire within `margin`.
    pub fn expires_within(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_at
    }

    /// `Authorization` header value, marked sensitive so it is never
    /// printed by the HTTP stack.
    pub(crate) fn header_value(&self) -> Result<HeaderValue> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.value.expose_secret()))
            .map_err(|_| Error::AuthFailed("access token is not a valid header value".into()))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Where the token manager stands.
#[derive(Debug, Clone, Default)]
pub enum AuthState {
    /// No access token yet; the next request refreshes from the store.
    #[default]
    Unauthenticated,
    /// Holding an access token.
    Authenticated(AccessToken),
    /// A bootstrap or refresh was rejected; only a new bootstrap recovers.
    Failed(String),
}

impl AuthState {
    /// Short machine-readable name of the state.
    pub fn kind(&self) -> AuthStateKind {
        match self {
            AuthState::Unauthenticated => AuthStateKind::Unauthenticated,
            AuthState::Authenticated(token) if token.is_expired() => AuthStateKind::Expired,
            AuthState::Authenticated(_) => AuthStateKind::Authenticated,
            AuthState::Failed(_) => AuthStateKind::Failed,
        }
    }
}

/// Serializable summary of [`AuthState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStateKind {
    /// No access token
    Unauthenticated,
    /// Valid access token
    Authenticated,
    /// Access token past its expiry; refreshed on next use
    Expired,
    /// Requires bootstrap
    Failed,
}

/// Body returned by the token endpoints.
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default, alias = "access_token")]
    pub access: Option<String>,
    #[serde(default, alias = "refresh_token")]
    pub refresh: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Read the `exp` claim of a JWT without verifying it.
///
/// The signature is the vendor's business; the claim is only used to
/// schedule the refresh.
pub(crate) fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    #[derive(Deserialize)]
    struct Claims {
        exp: Option<i64>,
    }

    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp?, 0)
}

/// Expiry for a freshly issued token: the JWT claim, else `expires_in`,
/// else `default_lifetime` from now.
pub(crate) fn resolve_expiry(
    token: &str,
    expires_in: Option<i64>,
    default_lifetime: Duration,
) -> DateTime<Utc> {
    jwt_expiry(token)
        .or_else(|| expires_in.map(|secs| Utc::now() + Duration::seconds(secs)))
        .unwrap_or_else(|| Utc::now() + default_lifetime)
}

/// Find a refresh token in `Set-Cookie` headers.
pub(crate) fn refresh_from_cookies(headers: &HeaderMap) -> Option<SecretString> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, value)| {
            REFRESH_COOKIE_NAMES.contains(&name.trim()) && !value.trim().is_empty()
        })
        .map(|(_, value)| SecretString::from(value.trim().to_string()))
}
