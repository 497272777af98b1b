//! Customers service: listing and email broadcasts.

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::client::paginated::PaginatedStream;
use crate::client::{ClientInner, Payload, PROOF_CUSTOMER_ENV};
use crate::models::{
    BroadcastReport, Customer, CustomerId, EmailBroadcastRequest, ProofReceipt, RecipientScope,
};
use crate::{Error, Result};

/// Service for customers and customer email.
///
/// # Example
///
/// ```no_run
/// # async fn example(client: localline::LocalLineClient) -> localline::Result<()> {
/// let subject = "Pickup moves to Friday";
/// let body = "<p>Same place, one day later.</p>";
///
/// // Check the rendering first, then send to everyone.
/// client.customers().send_proof(subject, body).await?;
/// let report = client.customers().send_all(subject, body).await?;
/// println!("sent {}, failed {}", report.sent, report.failed);
/// if let Some(abort) = &report.aborted {
///     eprintln!("stopped early: {}", abort.reason);
/// }
/// # Ok(())
/// # }
/// ```
pub struct CustomersService {
    inner: Arc<ClientInner>,
}

impl CustomersService {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// Lazily page through every customer.
    pub fn stream(&self) -> Result<PaginatedStream<Customer>> {
        let url = self.inner.endpoint(
            "customers/",
            &[("page_size", self.inner.settings.client.page_size.to_string())],
        )?;
        Ok(self.inner.paginate(url))
    }

    /// Send an email to the configured proof recipient only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the subject or body is blank or no
    /// proof recipient is configured.
    #[instrument(skip_all)]
    pub async fn send_proof(&self, subject: &str, body_html: &str) -> Result<ProofReceipt> {
        let email = EmailBroadcastRequest::new(subject, body_html, RecipientScope::Proof)?;
        let customer_id = self
            .inner
            .settings
            .proof_customer_id
            .clone()
            .ok_or_else(|| {
                Error::Validation(format!("{} is not set; no proof recipient", PROOF_CUSTOMER_ENV))
            })?;

        self.send_to(&customer_id, &email).await?;
        info!(customer = %customer_id, "sent proof email");
        Ok(ProofReceipt {
            customer_id,
            subject: email.subject,
        })
    }

    /// Send an email to every active customer, one at a time.
    ///
    /// A failed send is counted and the broadcast continues. An
    /// authentication failure or a failed customer page ends the broadcast;
    /// the report then carries the counts so far and the reason in
    /// [`BroadcastReport::aborted`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the subject or body is blank. Once
    /// sending has started, errors are reported in the returned report.
    #[instrument(skip_all)]
    pub async fn send_all(&self, subject: &str, body_html: &str) -> Result<BroadcastReport> {
        let email = EmailBroadcastRequest::new(subject, body_html, RecipientScope::All)?;
        let mut pages = self.stream()?;
        let mut report = BroadcastReport::default();

        'pages: while let Some(page) = pages.next().await {
            let page = match page {
                Ok(page) => page,
                Err(err) => {
                    error!(error = %err, sent = report.sent, "customer list failed, broadcast stopped");
                    report.record_abort(&err);
                    break;
                }
            };
            for customer in page.items {
                if !customer.is_active() {
                    report.skipped_inactive += 1;
                    continue;
                }
                match self.send_to(&customer.id, &email).await {
                    Ok(_) => report.record_sent(),
                    Err(err) if err.is_auth_error() => {
                        error!(error = %err, sent = report.sent, "authentication lost, broadcast stopped");
                        report.record_abort(&err);
                        break 'pages;
                    }
                    Err(err) => {
                        warn!(customer = %customer.id, error = %err, "email send failed");
                        report.record_failure(customer.id, &err);
                    }
                }
            }
        }

        info!(
            sent = report.sent,
            failed = report.failed,
            skipped_inactive = report.skipped_inactive,
            complete = report.is_complete(),
            "broadcast finished"
        );
        Ok(report)
    }

    async fn send_to(&self, customer_id: &CustomerId, email: &EmailBroadcastRequest) -> Result<Value> {
        self.inner
            .post(
                "customers/email",
                &[("id", customer_id.to_string())],
                Payload::Form(email.form_fields()),
            )
            .await
    }
}
