//! Picklists service and the fulfillment-week guard.

use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{info, instrument};

use super::VendorsService;
use crate::client::{ClientInner, Payload};
use crate::models::{
    CreatePicklistsBody, DateRange, PicklistCreated, PicklistRequest, PICKLIST_ORDER_STATUSES,
};
use crate::{Error, Result};

/// Service for creating vendor picklists.
///
/// Creating picklists is not idempotent: every call creates a new batch.
///
/// # Example
///
/// ```no_run
/// use localline::{DateRange, PicklistRequest};
///
/// # async fn example(client: localline::LocalLineClient) -> localline::Result<()> {
/// let range = DateRange::parse("2026-10-16", "2026-10-22")?;
/// let created = client
///     .picklists()
///     .create(&PicklistRequest::new(range).with_note("Cooler 2 is out"))
///     .await?;
/// println!("{} -> {:?}", created.name, created.picklist_ids);
/// # Ok(())
/// # }
/// ```
pub struct PicklistsService {
    inner: Arc<ClientInner>,
}

impl PicklistsService {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// Create one picklist per managed vendor for the request's fulfillment
    /// dates.
    #[instrument(skip_all, fields(range = %request.range))]
    pub async fn create(&self, request: &PicklistRequest) -> Result<PicklistCreated> {
        let vendor_ids = VendorsService::new(self.inner.clone())
            .managed_ids()
            .await?;
        let name = request.resolved_name();

        let mut query = vec![
            ("fulfillment_date_start", request.range.start().to_string()),
            ("fulfillment_date_end", request.range.end().to_string()),
        ];
        query.extend(
            PICKLIST_ORDER_STATUSES
                .iter()
                .map(|status| ("status", status.to_string())),
        );

        let vendor_count = vendor_ids.len();
        let body = CreatePicklistsBody {
            name: name.clone(),
            hub_note: request.resolved_note(),
            send_to_all: true,
            vendor_ids,
            copy_on_emails: false,
        };

        let response = self
            .inner
            .post(
                "orders/create-vendor-picklists/",
                &query,
                Payload::Json(serde_json::to_value(&body)?),
            )
            .await?;

        let picklist_ids = PicklistCreated::ids_from_response(&response);
        info!(vendor_count, picklists = picklist_ids.len(), "created picklists");
        Ok(PicklistCreated {
            picklist_ids,
            name,
            vendor_count,
        })
    }
}

/// A Friday-to-Thursday fulfillment week.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use localline::api::FulfillmentWeek;
///
/// # fn main() -> localline::Result<()> {
/// let monday = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
/// let week = FulfillmentWeek::containing(monday)?;
/// assert_eq!(week.range().to_string(), "2026-10-16..2026-10-22");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FulfillmentWeek {
    range: DateRange,
}

impl FulfillmentWeek {
    /// The week that contains `date`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the week falls outside the
    /// representable dates.
    pub fn containing(date: NaiveDate) -> Result<Self> {
        let since_friday = (date.weekday().num_days_from_monday() + 7
            - Weekday::Fri.num_days_from_monday())
            % 7;
        let friday = date
            .checked_sub_days(Days::new(u64::from(since_friday)))
            .ok_or_else(|| Error::Validation(format!("no fulfillment week contains {}", date)))?;
        Ok(Self {
            range: DateRange::week_starting(friday)?,
        })
    }

    /// The week containing today in `tz`.
    ///
    /// # Errors
    ///
    /// See [`containing`](Self::containing).
    pub fn current(tz: Tz) -> Result<Self> {
        Self::containing(Utc::now().with_timezone(&tz).date_naive())
    }

    /// The week as a date range.
    pub fn range(&self) -> DateRange {
        self.range
    }

    /// Reject any range other than exactly this week.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the expected range.
    pub fn check(&self, range: &DateRange) -> Result<()> {
        if *range == self.range {
            return Ok(());
        }
        Err(Error::Validation(format!(
            "expected current-week range {}, got {}; pass --allow-outside-current-week to override",
            self.range, range
        )))
    }
}
