//! Customer and email broadcast models.

use serde::{Deserialize, Serialize};

use super::primitives::CustomerId;
use crate::error::ErrorCode;
use crate::{Error, Result};

/// A customer from the backoffice customer list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer id
    pub id: CustomerId,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Contact email
    #[serde(default)]
    pub email: Option<String>,
    /// Whether the customer is active; missing means active
    #[serde(default)]
    pub active: Option<bool>,
}

impl Customer {
    /// Returns `true` unless the vendor flagged this customer inactive.
    pub fn is_active(&self) -> bool {
        self.active != Some(false)
    }
}

/// Who receives a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientScope {
    /// Operator-only preview
    Proof,
    /// Every active customer
    All,
}

/// An email to send to customers.
///
/// # Example
///
/// ```
/// use localline::models::{EmailBroadcastRequest, RecipientScope};
///
/// let email = EmailBroadcastRequest::new(
///     "Pickup moved to Friday",
///     "<p>See you Friday!</p>",
///     RecipientScope::Proof,
/// ).unwrap();
/// assert_eq!(email.recipient_scope, RecipientScope::Proof);
/// assert!(EmailBroadcastRequest::new(" ", "<p>x</p>", RecipientScope::All).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailBroadcastRequest {
    /// Subject line
    pub subject: String,
    /// HTML body
    pub body_html: String,
    /// Recipients
    pub recipient_scope: RecipientScope,
}

impl EmailBroadcastRequest {
    /// Build a request, rejecting an empty subject or body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the subject or body is blank.
    pub fn new(
        subject: impl Into<String>,
        body_html: impl Into<String>,
        recipient_scope: RecipientScope,
    ) -> Result<Self> {
        let subject = subject.into();
        let body_html = body_html.into();
        if subject.trim().is_empty() {
            return Err(Error::Validation("email subject must not be empty".into()));
        }
        if body_html.trim().is_empty() {
            return Err(Error::Validation("email body must not be empty".into()));
        }
        Ok(Self {
            subject,
            body_html,
            recipient_scope,
        })
    }

    /// Form fields for one send through the vendor's email endpoint.
    pub(crate) fn form_fields(&self) -> Vec<(String, String)> {
        vec![
            ("subject".to_string(), self.subject.clone()),
            ("body".to_string(), self.body_html.clone()),
            ("send_to_all".to_string(), "false".to_string()),
        ]
    }
}

/// Confirmation of a proof send.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProofReceipt {
    /// Operator customer the proof went to
    pub customer_id: CustomerId,
    /// Subject that was sent
    pub subject: String,
}

/// A recipient whose send failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipientFailure {
    /// Recipient
    pub customer_id: CustomerId,
    /// Failure class
    pub code: ErrorCode,
    /// Human-readable reason
    pub reason: String,
}

/// Outcome of a broadcast to all customers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BroadcastReport {
    /// Sends the vendor accepted
    pub sent: usize,
    /// Sends that failed
    pub failed: usize,
    /// Customers skipped because they are inactive
    pub skipped_inactive: usize,
    /// Detail for each failed send
    pub failures: Vec<RecipientFailure>,
    /// Why the broadcast stopped before reaching every customer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<BroadcastAbort>,
}

/// The error that ended a broadcast early.
///
/// Customers counted in `sent` already have the email; a rerun would send it
/// to them again.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BroadcastAbort {
    /// Failure class
    pub code: ErrorCode,
    /// Human-readable reason
    pub reason: String,
    /// Recovery steps, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<&'static str>,
}

impl BroadcastReport {
    pub(crate) fn record_sent(&mut self) {
        self.sent += 1;
    }

    pub(crate) fn record_failure(&mut self, customer_id: CustomerId, err: &Error) {
        self.failed += 1;
        self.failures.push(RecipientFailure {
            customer_id,
            code: err.code(),
            reason: err.to_string(),
        });
    }

    pub(crate) fn record_abort(&mut self, err: &Error) {
        self.aborted = Some(BroadcastAbort {
            code: err.code(),
            reason: err.reason(),
            fix: err.fix(),
        });
    }

    /// `true` if every active customer was attempted.
    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_active_default() {
        let customer: Customer =
            serde_json::from_value(serde_json::json!({"id": 1, "email": "a@example.com"}))
                .unwrap();
        assert!(customer.is_active());

        let inactive: Customer =
            serde_json::from_value(serde_json::json!({"id": 2, "active": false})).unwrap();
        assert!(!inactive.is_active());
    }

    #[test]
    fn test_broadcast_report_counts() {
        let mut report = BroadcastReport::default();
        report.record_sent();
        report.record_sent();
        report.record_failure(
            CustomerId::new("9"),
            &Error::Validation("no email on file".into()),
        );

        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].code, ErrorCode::ValidationError);
        assert!(report.is_complete());
    }

    #[test]
    fn test_aborted_report_keeps_counts() {
        let mut report = BroadcastReport::default();
        report.record_sent();
        report.record_abort(&Error::AuthFailed("refresh token revoked".into()));

        assert!(!report.is_complete());
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["sent"], 1);
        assert_eq!(value["aborted"]["code"], "AUTH_FAILED");
        assert_eq!(value["aborted"]["reason"], "refresh token revoked");
        assert!(value["aborted"]["fix"].is_string());

        let untouched = serde_json::to_value(BroadcastReport::default()).unwrap();
        assert!(untouched.get("aborted").is_none());
    }

    #[test]
    fn test_form_fields_never_broadcast() {
        let email = EmailBroadcastRequest::new("s", "<p>b</p>", RecipientScope::All).unwrap();
        let fields = email.form_fields();
        assert!(fields.contains(&("send_to_all".to_string(), "false".to_string())));
    }
}
