//! Flat, deterministic rendering of order records for accounting.
//!
//! The vendor's order shape is nested and changes over time; the accounting
//! side only ever sees the fixed columns in [`COLUMNS`]. Rendering is pure: the
//! same orders always produce byte-identical JSON and CSV.

use chrono::{NaiveDate, SecondsFormat};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::models::{DateRange, OrderRecord};
use crate::Result;

/// Column order of every exported record.
pub const COLUMNS: [&str; 11] = [
    "order_id",
    "customer_id",
    "customer_name",
    "status",
    "date_placed",
    "fulfillment_date",
    "line_item_count",
    "item_quantity",
    "subtotal",
    "tax",
    "total",
];

/// One exported order. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRecord {
    /// Vendor order id
    pub order_id: String,
    /// Ordering customer's id
    pub customer_id: Option<String>,
    /// Ordering customer's name, when expanded
    pub customer_name: Option<String>,
    /// Vendor status
    pub status: Option<String>,
    /// RFC 3339, UTC
    pub date_placed: Option<String>,
    /// `YYYY-MM-DD`
    pub fulfillment_date: Option<String>,
    /// Number of order lines
    pub line_item_count: usize,
    /// Sum of line quantities
    pub item_quantity: String,
    /// Subtotal, two decimals
    pub subtotal: String,
    /// Tax, two decimals
    pub tax: String,
    /// Total, two decimals
    pub total: String,
}

impl From<&OrderRecord> for ExportRecord {
    fn from(order: &OrderRecord) -> Self {
        Self {
            order_id: order.id.to_string(),
            customer_id: order.customer.as_ref().map(|c| c.id().to_string()),
            customer_name: order
                .customer
                .as_ref()
                .and_then(|c| c.display_name())
                .map(str::to_string),
            status: order.status.clone(),
            date_placed: order
                .created_at
                .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
            fulfillment_date: order.fulfillment_date.map(|d| d.to_string()),
            line_item_count: order.order_entries.len(),
            item_quantity: order.item_quantity().normalize().to_string(),
            subtotal: money(order.subtotal),
            tax: money(order.tax),
            total: money(order.total),
        }
    }
}

/// Flatten orders into export records, keeping their order.
pub fn flatten(orders: &[OrderRecord]) -> Vec<ExportRecord> {
    orders.iter().map(ExportRecord::from).collect()
}

/// Render an amount with exactly two decimals. A missing amount is `0.00`.
pub fn money(amount: Option<Decimal>) -> String {
    let mut rounded = amount
        .unwrap_or(Decimal::ZERO)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

/// The structured result of an order export.
///
/// # Example
///
/// ```
/// use localline::export::OrderExport;
/// use localline::models::OrderRecord;
/// use localline::DateRange;
///
/// let order: OrderRecord = serde_json::from_value(serde_json::json!({
///     "id": 7, "total": "12.5", "status": "OPEN"
/// })).unwrap();
/// let range = DateRange::parse("2026-10-16", "2026-10-22").unwrap();
/// let export = OrderExport::new(&range, &[order]);
///
/// let csv = export.to_csv().unwrap();
/// assert!(csv.starts_with("order_id,customer_id,"));
/// assert!(csv.contains("7,,,OPEN,,,0,0,0.00,0.00,12.50"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderExport {
    /// First fulfillment date, inclusive
    pub start_date: NaiveDate,
    /// Last fulfillment date, inclusive
    pub end_date: NaiveDate,
    /// One record per order, in vendor order
    pub records: Vec<ExportRecord>,
}

impl OrderExport {
    /// Build an export for `range` from fetched orders.
    pub fn new(range: &DateRange, orders: &[OrderRecord]) -> Self {
        Self {
            start_date: range.start(),
            end_date: range.end(),
            records: flatten(orders),
        }
    }

    /// Number of exported records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no orders matched.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    /// CSV with a header row, even when there are no records.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record(COLUMNS)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| crate::Error::Config(format!("CSV buffer: {}", e.error())))?;
        String::from_utf8(bytes).map_err(|e| crate::Error::Config(format!("CSV encoding: {}", e)))
    }
}
