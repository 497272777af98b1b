//! # localline-rs
//!
//! A Rust client for the Local Line backoffice API, as used by a food hub to
//! run its weekly fulfillment cycle.
//!
//! The crate owns the whole vendor boundary: keeping the hub authenticated,
//! surviving rate limits and transient failures, walking paginated lists,
//! and turning vendor payloads into stable records for accounting.
//!
//! ## Features
//!
//! - **Authentication**: one-time bootstrap from environment credentials,
//!   refresh token kept in the OS keyring, access tokens refreshed on demand
//!   with a single refresh in flight per process
//! - **Resilience**: `Retry-After` aware backoff on 429, bounded retries on
//!   network errors and 5xx, one token refresh and replay on 401/403
//! - **Pagination**: lazy page streams that stop when the caller stops
//! - **Operations**: picklist creation, order export, customer email
//! - **Stable output**: every result renders to the same JSON envelope, and
//!   order exports are byte-deterministic JSON or CSV
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use localline::{DateRange, LocalLineClient, Settings};
//!
//! #[tokio::main]
//! async fn main() -> localline::Result<()> {
//!     // Reads LOCAL_LINE_* variables, refresh token from the OS keyring
//!     let client = LocalLineClient::with_keyring(Settings::from_env()?)?;
//!
//!     let status = client.auth().status().await;
//!     if !status.ok {
//!         // Needs LOCALLINE_USERNAME and LOCALLINE_PASSWORD
//!         client.auth().bootstrap_from_env().await?;
//!     }
//!
//!     let range = DateRange::parse("2026-10-16", "2026-10-22")?;
//!     let export = client.orders().export(&range).await?;
//!     print!("{}", export.to_csv()?);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Picklists
//!
//! ```rust,no_run
//! use localline::api::FulfillmentWeek;
//! use localline::{LocalLineClient, PicklistRequest, Settings};
//!
//! #[tokio::main]
//! async fn main() -> localline::Result<()> {
//!     let settings = Settings::from_env()?;
//!     let week = FulfillmentWeek::current(settings.timezone)?;
//!     let client = LocalLineClient::with_keyring(settings)?;
//!
//!     let created = client
//!         .picklists()
//!         .create(&PicklistRequest::new(week.range()))
//!         .await?;
//!     println!("created {} picklists", created.picklist_ids.len());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod api;
pub mod auth;
pub mod client;
pub mod error;
pub mod export;
pub mod models;
pub mod outcome;

// Re-export primary types at crate root for convenience
pub use error::{Error, ErrorCode, Result};
pub use models::{CustomerId, DateRange, OrderId, PicklistRequest, ServiceKey, VendorId};
pub use client::{ClientConfig, LocalLineClient, RetryConfig, Settings};
pub use outcome::Outcome;

/// Prelude module for convenient imports.
///
/// ```rust
/// use localline::prelude::*;
/// ```
pub mod prelude {
    pub use crate::api::{FulfillmentWeek, Operation};
    pub use crate::auth::{
        AuthStatus, CredentialStore, Credentials, KeyringStore, MemoryStore, TokenManager,
    };
    pub use crate::client::{ClientConfig, LocalLineClient, RetryConfig, Settings};
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::export::{ExportRecord, OrderExport};
    pub use crate::models::{
        // Primitives
        CustomerId, DateRange, OrderId, PicklistId, ServiceKey, VendorId,
        // Orders
        CustomerRef, LineItem, OrderRecord,
        // Customers and email
        BroadcastAbort, BroadcastReport, Customer, EmailBroadcastRequest, ProofReceipt,
        RecipientScope,
        // Picklists
        PicklistCreated, Vendor,
    };
    pub use crate::outcome::Outcome;
}
