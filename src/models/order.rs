//! Order models as returned by the backoffice orders endpoint.
//!
//! The vendor owns this shape; only the fields the export needs are typed,
//! everything else is kept in `extra` so nothing is silently lost.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::primitives::{CustomerId, OrderId};

/// Customer reference embedded in an order.
///
/// Depending on the `expand` parameter the vendor sends either the bare id
/// or a nested object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomerRef {
    /// Expanded customer object
    Expanded {
        /// Customer id
        id: CustomerId,
        /// Display name
        #[serde(default)]
        name: Option<String>,
        /// Business name, used when there is no personal name
        #[serde(default)]
        business_name: Option<String>,
    },
    /// Bare customer id
    Id(CustomerId),
}

impl CustomerRef {
    /// The referenced customer's id.
    pub fn id(&self) -> &CustomerId {
        match self {
            CustomerRef::Expanded { id, .. } | CustomerRef::Id(id) => id,
        }
    }

    /// The customer's display name, when expanded.
    pub fn display_name(&self) -> Option<&str> {
        match self {
            CustomerRef::Expanded {
                name, business_name, ..
            } => name
                .as_deref()
                .filter(|n| !n.trim().is_empty())
                .or(business_name.as_deref()),
            CustomerRef::Id(_) => None,
        }
    }
}

/// A single line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Line id
    #[serde(default)]
    pub id: Option<Value>,
    /// Product name as shown to the customer
    #[serde(default)]
    pub product_name: Option<String>,
    /// Package name (e.g. "1 lb bag")
    #[serde(default)]
    pub package_name: Option<String>,
    /// Ordered quantity
    #[serde(default)]
    pub quantity: Option<Decimal>,
    /// Unit price
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    /// Line total
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Expanded price list entry, present with
    /// `expand=order_entries.package_price_list_entry`
    #[serde(default)]
    pub package_price_list_entry: Option<Value>,
}

/// An order record from the vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Order id
    pub id: OrderId,
    /// Ordering customer
    #[serde(default)]
    pub customer: Option<CustomerRef>,
    /// Order lines
    #[serde(default, alias = "line_items")]
    pub order_entries: Vec<LineItem>,
    /// Subtotal before tax
    #[serde(default)]
    pub subtotal: Option<Decimal>,
    /// Tax amount
    #[serde(default)]
    pub tax: Option<Decimal>,
    /// Grand total
    #[serde(default)]
    pub total: Option<Decimal>,
    /// When the order was placed
    #[serde(default, alias = "date_placed", deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    /// Fulfillment date
    #[serde(default, deserialize_with = "deserialize_date")]
    pub fulfillment_date: Option<NaiveDate>,
    /// Vendor status, e.g. `OPEN`
    #[serde(default)]
    pub status: Option<String>,
    /// Every field not modelled above
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl OrderRecord {
    /// Sum of line quantities.
    pub fn item_quantity(&self) -> Decimal {
        self.order_entries
            .iter()
            .filter_map(|line| line.quantity)
            .sum()
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    // Date-only values are taken as midnight UTC.
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map(|d| Some(d.and_time(NaiveTime::MIN).and_utc()))
        .map_err(serde::de::Error::custom)
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };

    if let Ok(date) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        return Ok(Some(date));
    }
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| Some(ts.date_naive()))
        .map_err(serde::de::Error::custom)
}
