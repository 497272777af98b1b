//! Orders service for reading and exporting orders.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::client::paginated::PaginatedStream;
use crate::client::ClientInner;
use crate::export::OrderExport;
use crate::models::{DateRange, OrderRecord};
use crate::Result;

/// Related records expanded inline so the export needs no further calls.
const ORDER_EXPAND: &str = "order_entries.package_price_list_entry";

/// Service for order operations. Read-only; safe to re-run.
///
/// # Example
///
/// ```no_run
/// use localline::DateRange;
///
/// # async fn example(client: localline::LocalLineClient) -> localline::Result<()> {
/// let range = DateRange::parse("2026-10-16", "2026-10-22")?;
/// let export = client.orders().export(&range).await?;
/// print!("{}", export.to_csv()?);
/// # Ok(())
/// # }
/// ```
pub struct OrdersService {
    inner: Arc<ClientInner>,
}

impl OrdersService {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// Lazily page through the orders in `range`.
    pub fn pages(&self, range: &DateRange) -> Result<PaginatedStream<OrderRecord>> {
        let url = self.inner.endpoint(
            "orders/",
            &[
                ("start_date", range.start().to_string()),
                ("end_date", range.end().to_string()),
                ("expand", ORDER_EXPAND.to_string()),
                ("page_size", self.inner.settings.client.page_size.to_string()),
            ],
        )?;
        Ok(self.inner.paginate(url))
    }

    /// Every order in `range`, in vendor order.
    pub async fn list(&self, range: &DateRange) -> Result<Vec<OrderRecord>> {
        self.pages(range)?.collect_items().await
    }

    /// Fetch every order in `range` and flatten it for accounting.
    #[instrument(skip_all, fields(range = %range))]
    pub async fn export(&self, range: &DateRange) -> Result<OrderExport> {
        let orders = self.list(range).await?;
        info!(orders = orders.len(), "exporting orders");
        Ok(OrderExport::new(range, &orders))
    }
}
