//! Data models for the Local Line backoffice API.
//!
//! - [`primitives`] - Identifier newtypes, `ServiceKey`, `DateRange`
//! - [`order`] - Order records as the vendor returns them
//! - [`customer`] - Customers and email broadcast requests/reports
//! - [`picklist`] - Picklist requests and vendors

pub mod primitives;
pub mod order;
pub mod customer;
pub mod picklist;

// Re-export commonly used types
pub use primitives::*;
pub use order::*;
pub use customer::*;
pub use picklist::*;
