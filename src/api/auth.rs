//! Auth service: bootstrap and status probes.

use std::sync::Arc;

use crate::auth::{AuthStatus, BootstrapReport, Credentials};
use crate::client::ClientInner;
use crate::Result;

/// Service for authentication operations.
///
/// # Example
///
/// ```no_run
/// # async fn example(client: localline::LocalLineClient) -> localline::Result<()> {
/// let status = client.auth().status().await;
/// if !status.ok {
///     // Reads LOCALLINE_USERNAME / LOCALLINE_PASSWORD.
///     client.auth().bootstrap_from_env().await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct AuthService {
    inner: Arc<ClientInner>,
}

impl AuthService {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// Report whether requests can be authenticated.
    pub async fn status(&self) -> AuthStatus {
        self.inner.tokens.status().await
    }

    /// Exchange credentials for tokens and store the refresh token.
    pub async fn bootstrap(&self, credentials: &Credentials) -> Result<BootstrapReport> {
        self.inner.tokens.bootstrap(credentials).await
    }

    /// Bootstrap with credentials from `LOCALLINE_USERNAME` and
    /// `LOCALLINE_PASSWORD`. Missing variables fail before any network call.
    pub async fn bootstrap_from_env(&self) -> Result<BootstrapReport> {
        let credentials = Credentials::from_env()?;
        self.bootstrap(&credentials).await
    }
}
