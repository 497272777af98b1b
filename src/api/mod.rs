//! Operation handlers for the Local Line backoffice API.
//!
//! Each service covers one area of the API and is obtained from
//! [`LocalLineClient`](crate::LocalLineClient).

mod auth;
mod customers;
mod operation;
mod orders;
mod picklists;
mod vendors;

pub use auth::AuthService;
pub use customers::CustomersService;
pub use operation::Operation;
pub use orders::OrdersService;
pub use picklists::{FulfillmentWeek, PicklistsService};
pub use vendors::VendorsService;
