//! Authentication for the Local Line backoffice API.
//!
//! The vendor issues short-lived JWT access tokens and a long-lived refresh
//! token. Username and password are used exactly once, by
//! [`TokenManager::bootstrap`], after which only the refresh token is kept,
//! in a [`CredentialStore`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use localline::auth::{Credentials, KeyringStore};
//! use localline::{LocalLineClient, Settings};
//!
//! # async fn example() -> localline::Result<()> {
//! let client = LocalLineClient::new(Settings::from_env()?, Arc::new(KeyringStore::new()))?;
//! client.auth().bootstrap(&Credentials::from_env()?).await?;
//!
//! // Later runs authenticate from the stored refresh token.
//! let status = client.auth().status().await;
//! assert!(status.ok);
//! # Ok(())
//! # }
//! ```

mod manager;
mod store;
mod token;

pub use manager::{
    AuthEndpoints, AuthStatus, BootstrapReport, TokenManager, MISSING_REFRESH_TOKEN,
};
pub use store::{CredentialStore, KeyringStore, MemoryStore};
pub use token::{
    AccessToken, AuthState, AuthStateKind, Credentials, PASSWORD_ENV, USERNAME_ENV,
};
