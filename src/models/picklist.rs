//! Picklist and vendor models.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use super::primitives::{DateRange, PicklistId, VendorId};

/// Order statuses included when building picklists.
pub const PICKLIST_ORDER_STATUSES: [&str; 4] = ["OPEN", "NEEDS_APPROVAL", "CANCELLED", "CLOSED"];

/// A request to create vendor picklists for a fulfillment window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PicklistRequest {
    /// Fulfillment dates covered
    pub range: DateRange,
    /// Batch name; defaults to [`default_picklist_name`] of the end date
    pub name: Option<String>,
    /// Note shown to the hub
    pub note: Option<String>,
}

impl PicklistRequest {
    /// Request picklists for `range` with the default name and no note.
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            name: None,
            note: None,
        }
    }

    /// Set the batch name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the hub note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// The name that will be sent: the explicit one if non-blank, else the
    /// default derived from the end date.
    pub fn resolved_name(&self) -> String {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .unwrap_or_else(|| default_picklist_name(self.range.end()))
    }

    pub(crate) fn resolved_note(&self) -> Option<String> {
        self.note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
    }
}

/// Body of the create-vendor-picklists call.
#[derive(Debug, Serialize)]
pub(crate) struct CreatePicklistsBody {
    pub name: String,
    pub hub_note: Option<String>,
    pub send_to_all: bool,
    #[serde(serialize_with = "numeric_ids")]
    pub vendor_ids: Vec<VendorId>,
    pub copy_on_emails: bool,
}

/// The vendor expects integer ids; ids that are not integers pass as text.
fn numeric_ids<S: Serializer>(ids: &[VendorId], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(ids.iter().map(|id| match id.as_str().parse::<i64>() {
        Ok(n) => Value::from(n),
        Err(_) => Value::from(id.as_str()),
    }))
}

/// Result of creating picklists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PicklistCreated {
    /// Vendor-assigned ids of the created picklists
    pub picklist_ids: Vec<PicklistId>,
    /// Batch name used
    pub name: String,
    /// Number of managed vendors the batch was sent to
    pub vendor_count: usize,
}

impl PicklistCreated {
    /// Collect picklist ids from the vendor's response, which is either a
    /// list of picklists, a single picklist, or an object listing ids.
    pub(crate) fn ids_from_response(body: &Value) -> Vec<PicklistId> {
        fn id_of(value: &Value) -> Option<PicklistId> {
            match value {
                Value::Number(n) => Some(PicklistId::new(n.to_string())),
                Value::String(s) if !s.is_empty() => Some(PicklistId::new(s.clone())),
                Value::Object(map) => map.get("id").and_then(id_of),
                _ => None,
            }
        }

        match body {
            Value::Array(items) => items.iter().filter_map(id_of).collect(),
            Value::Object(map) => {
                for key in ["picklist_ids", "ids", "picklists", "results"] {
                    if let Some(Value::Array(items)) = map.get(key) {
                        return items.iter().filter_map(id_of).collect();
                    }
                }
                id_of(body).into_iter().collect()
            }
            _ => Vec::new(),
        }
    }
}

/// A vendor (producer) selling through the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    /// Vendor id
    pub id: VendorId,
    /// Vendor name
    #[serde(default)]
    pub name: Option<String>,
    /// `true` for vendors that run their own Local Line store and are only
    /// connected to the hub
    #[serde(default)]
    pub connected: Option<bool>,
}

impl Vendor {
    /// Managed vendors are the ones the hub fulfils for.
    pub fn is_managed(&self) -> bool {
        self.connected != Some(true)
    }
}

/// Default batch name, e.g. `Friday, Oct 23rd Deliveries`.
///
/// ```
/// use chrono::NaiveDate;
/// use localline::models::default_picklist_name;
///
/// let date = NaiveDate::from_ymd_opt(2026, 10, 22).unwrap();
/// assert_eq!(default_picklist_name(date), "Thursday, Oct 22nd Deliveries");
/// ```
pub fn default_picklist_name(date: NaiveDate) -> String {
    format!(
        "{}, {} {} Deliveries",
        date.format("%A"),
        date.format("%b"),
        ordinal(date.day())
    )
}

fn ordinal(n: u32) -> String {
    let suffix = if (10..=20).contains(&(n % 100)) {
        "th"
    } else {
        match n % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        }
    };
    format!("{}{}", n, suffix)
}
