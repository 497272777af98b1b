//! Primitive types and newtypes for type-safe API interactions.
//!
//! This module provides strongly-typed wrappers around the vendor's
//! identifiers so order, customer, vendor and picklist ids cannot be mixed
//! up at compile time.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Accepts an identifier encoded either as a JSON number or a string.
fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Int(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

macro_rules! vendor_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(#[serde(deserialize_with = "deserialize_id")] String);

        impl $name {
            /// Create a new identifier from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Get the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<i64> for $name {
            fn from(n: i64) -> Self {
                Self(n.to_string())
            }
        }
    };
}

vendor_id!(
    /// A strongly-typed order id.
    ///
    /// ```
    /// use localline::OrderId;
    ///
    /// let id = OrderId::new("90211");
    /// assert_eq!(id.to_string(), "90211");
    /// ```
    OrderId
);

vendor_id!(
    /// A strongly-typed customer id.
    CustomerId
);

vendor_id!(
    /// A strongly-typed vendor (producer) id.
    VendorId
);

vendor_id!(
    /// A vendor-assigned picklist id.
    PicklistId
);

/// Key under which the refresh token is kept in the credential store.
///
/// # Example
///
/// ```
/// use localline::ServiceKey;
///
/// assert_eq!(ServiceKey::default().as_str(), "mcp.localline");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey(String);

impl ServiceKey {
    /// The key used when none is configured.
    pub const DEFAULT: &'static str = "mcp.localline";

    /// Create a service key.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ServiceKey {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An inclusive range of calendar dates, validated so that
/// `start <= end`.
///
/// # Example
///
/// ```
/// use localline::DateRange;
///
/// let range = DateRange::parse("2026-10-16", "2026-10-22").unwrap();
/// assert_eq!(range.days(), 7);
/// assert!(DateRange::parse("2026-10-22", "2026-10-16").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a date range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::Validation(format!(
                "start_date {} is after end_date {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// The seven days starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the week runs past the last
    /// representable date.
    pub fn week_starting(start: NaiveDate) -> Result<Self> {
        let end = start
            .checked_add_days(Days::new(6))
            .ok_or_else(|| Error::Validation(format!("no seven-day week starts at {}", start)))?;
        Ok(Self { start, end })
    }

    /// Parse a range from two ISO-8601 (`YYYY-MM-DD`) dates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if either date is malformed or the
    /// range is inverted.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_date("start_date", start)?, parse_date("end_date", end)?)
    }

    /// First day of the range.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the range (inclusive).
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days covered, counting both ends.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        Error::Validation(format!(
            "{} must be an ISO date (YYYY-MM-DD), got {:?}",
            field, value
        ))
    })
}
