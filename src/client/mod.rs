//! HTTP client and configuration for the Local Line backoffice API.
//!
//! [`LocalLineClient`] is the entry point. It is built from [`Settings`]
//! and a [`CredentialStore`](crate::auth::CredentialStore) holding the
//! refresh token.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use localline::auth::MemoryStore;
//! use localline::{LocalLineClient, Settings};
//!
//! # async fn example() -> localline::Result<()> {
//! let settings = Settings::new("https://cfc.localline.ca")?;
//! let client = LocalLineClient::new(settings, Arc::new(MemoryStore::new()))?;
//!
//! let vendors = client.vendors().list().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod http;
pub mod paginated;

pub use config::{
    ClientConfig, RetryConfig, Settings, API_BASE_ENV, API_PATH, BASE_URL_ENV, DEFAULT_BASE_URL,
    DEFAULT_TIMEZONE, PROOF_CUSTOMER_ENV, SERVICE_KEY_ENV, TIMEZONE_ENV,
};
pub use http::{LocalLineClient, Payload};
pub use paginated::{Page, PageCursor, PaginatedStream, DEFAULT_PAGE_SIZE};
pub(crate) use http::ClientInner;
