//! Operation names shared by the command line and tool hosts.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::Error;

/// An operation exposed to callers.
///
/// Each operation has a dotted tool name (`orders.export`) and a command
/// name (`orders-export`); both parse.
///
/// ```
/// use localline::api::Operation;
///
/// let op: Operation = "customers-email-send-all".parse().unwrap();
/// assert_eq!(op.tool_name(), "customers.email.send_all");
/// assert_eq!("auth.status".parse::<Operation>().unwrap(), Operation::AuthStatus);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Report whether requests can be authenticated
    AuthStatus,
    /// Exchange environment credentials for stored tokens
    AuthBootstrap,
    /// Create vendor picklists for a fulfillment range
    PicklistsCreate,
    /// Export orders for a date range
    OrdersExport,
    /// Send an email to the operator only
    CustomersEmailProof,
    /// Send an email to every active customer
    CustomersEmailSendAll,
}

impl Operation {
    /// Every operation, in display order.
    pub const ALL: [Operation; 6] = [
        Operation::AuthStatus,
        Operation::AuthBootstrap,
        Operation::PicklistsCreate,
        Operation::OrdersExport,
        Operation::CustomersEmailProof,
        Operation::CustomersEmailSendAll,
    ];

    /// Dotted tool name.
    pub fn tool_name(&self) -> &'static str {
        match self {
            Operation::AuthStatus => "auth.status",
            Operation::AuthBootstrap => "auth.bootstrap",
            Operation::PicklistsCreate => "picklists.create",
            Operation::OrdersExport => "orders.export",
            Operation::CustomersEmailProof => "customers.email.proof",
            Operation::CustomersEmailSendAll => "customers.email.send_all",
        }
    }

    /// Command-line subcommand name.
    pub fn command_name(&self) -> &'static str {
        match self {
            Operation::AuthStatus => "auth-status",
            Operation::AuthBootstrap => "auth-bootstrap",
            Operation::PicklistsCreate => "picklists-create",
            Operation::OrdersExport => "orders-export",
            Operation::CustomersEmailProof => "customers-email-proof",
            Operation::CustomersEmailSendAll => "customers-email-send-all",
        }
    }

    /// Returns `true` if the operation changes vendor-side state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Operation::PicklistsCreate
                | Operation::CustomersEmailProof
                | Operation::CustomersEmailSendAll
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tool_name())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.tool_name() == s || op.command_name() == s)
            .ok_or_else(|| Error::Validation(format!("unknown operation: {}", s)))
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tool_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(op.tool_name().parse::<Operation>().unwrap(), op);
            assert_eq!(op.command_name().parse::<Operation>().unwrap(), op);
            assert_eq!(op.command_name(), op.tool_name().replace(['.', '_'], "-"));
        }
    }

    #[test]
    fn test_unknown_operation() {
        let err = "orders.delete".parse::<Operation>().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_serializes_as_tool_name() {
        let json = serde_json::to_string(&Operation::OrdersExport).unwrap();
        assert_eq!(json, "\"orders.export\"");
    }
}
