//! Vendors service.

use std::sync::Arc;

use crate::client::paginated::PaginatedStream;
use crate::client::ClientInner;
use crate::models::{Vendor, VendorId};
use crate::Result;

/// Service for the hub's vendor list.
pub struct VendorsService {
    inner: Arc<ClientInner>,
}

impl VendorsService {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// Stream every vendor, page by page.
    pub fn stream(&self) -> Result<PaginatedStream<Vendor>> {
        let url = self.inner.endpoint(
            "vendors/",
            &[("page_size", self.inner.settings.client.page_size.to_string())],
        )?;
        Ok(self.inner.paginate(url))
    }

    /// List every vendor.
    pub async fn list(&self) -> Result<Vec<Vendor>> {
        self.stream()?.collect_items().await
    }

    /// Ids of the vendors the hub fulfils for, i.e. every vendor not merely
    /// connected through its own store.
    pub async fn managed_ids(&self) -> Result<Vec<VendorId>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(Vendor::is_managed)
            .map(|vendor| vendor.id)
            .collect())
    }
}
