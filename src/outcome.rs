//! Result envelope returned to callers of an operation.
//!
//! Every operation, whether it succeeds or fails, renders to one JSON object:
//!
//! ```json
//! {"ok": true, "operation": "orders.export", "data": {}}
//! {"ok": false, "operation": "auth.status", "status": "AUTH_FAILED", "reason": "...", "fix": "..."}
//! ```

use serde::Serialize;
use serde_json::Value;

use crate::api::Operation;
use crate::auth::AuthStatus;
use crate::error::ErrorCode;
use crate::models::BroadcastReport;
use crate::Error;

/// The envelope for one operation result.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    /// `true` on success
    pub ok: bool,
    /// Operation that ran
    pub operation: Operation,
    /// Operation output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Failure class
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ErrorCode>,
    /// Human-readable failure reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Recovery steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<&'static str>,
}

impl Outcome {
    /// A successful result carrying `data`.
    pub fn success<T: Serialize>(operation: Operation, data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self {
                ok: true,
                operation,
                data: Some(data),
                status: None,
                reason: None,
                fix: None,
            },
            Err(err) => Self::failure(operation, &Error::Json(err)),
        }
    }

    /// A failed result for `err`.
    pub fn failure(operation: Operation, err: &Error) -> Self {
        Self {
            ok: false,
            operation,
            data: None,
            status: Some(err.code()),
            reason: Some(err.reason()),
            fix: err.fix(),
        }
    }

    /// Envelope for any operation result.
    pub fn from_result<T: Serialize>(operation: Operation, result: &crate::Result<T>) -> Self {
        match result {
            Ok(data) => Self::success(operation, data),
            Err(err) => Self::failure(operation, err),
        }
    }

    /// Envelope for an auth probe. A failed probe keeps the probe details as
    /// `data` next to the failure fields.
    pub fn from_auth_status(status: &AuthStatus) -> Self {
        let mut outcome = Self::success(Operation::AuthStatus, status);
        if let Some(code) = status.error_code() {
            outcome.ok = false;
            outcome.status = Some(code);
            outcome.reason = status.reason.clone();
            outcome.fix = status.fix;
        }
        outcome
    }

    /// Envelope for a broadcast. A broadcast that stopped early is a failure
    /// that still carries the partial report as `data`.
    pub fn from_broadcast(result: &crate::Result<BroadcastReport>) -> Self {
        let report = match result {
            Ok(report) => report,
            Err(err) => return Self::failure(Operation::CustomersEmailSendAll, err),
        };
        let mut outcome = Self::success(Operation::CustomersEmailSendAll, report);
        if let Some(abort) = &report.aborted {
            outcome.ok = false;
            outcome.status = Some(abort.code);
            outcome.reason = Some(format!(
                "broadcast stopped after {} sent: {}",
                report.sent, abort.reason
            ));
            outcome.fix = abort.fix;
        }
        outcome
    }

    /// Process exit status: `0` on success, else the code's status.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            Some(code) if !self.ok => code.exit_code(),
            _ => 0,
        }
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json(&self) -> crate::Result<String> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }
}
