//! Persisted records and extraction results.

use chrono::DateTime;
use chrono::Utc;
use derive_builder::Builder;
use serde::Deserialize;
use serde::Serialize;

/// A chat recipient that receives availability alerts.
///
/// Field names on the wire match the persisted `db.json` layout.
#[derive(Builder, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[builder(pattern = "immutable", setter(into))]
pub struct SubscriberRecord {
    /// Digits-only chat id used by the bot transport.
    #[serde(rename = "chatId")]
    pub recipient_id: String,
    #[builder(default, setter(into, strip_option))]
    #[serde(rename = "email", default, skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
    #[builder(default, setter(into, strip_option))]
    #[serde(rename = "name", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[builder(default, setter(into, strip_option))]
    #[serde(
        rename = "registeredAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub registered_at: Option<DateTime<Utc>>,
}

impl SubscriberRecord {
    /// Record created through the unauthenticated signup path.
    pub fn anonymous(recipient_id: impl Into<String>) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            owner_email: None,
            display_name: None,
            registered_at: Some(Utc::now()),
        }
    }
}

/// Full persisted state: subscribers plus the last reported availability.
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq, Eq)]
pub struct StateSnapshot {
    #[serde(default)]
    pub users: Vec<SubscriberRecord>,
    #[serde(rename = "lastStatus", default)]
    pub last_status: bool,
}

/// One calendar row offering seats for the target test.
///
/// Every field is the trimmed cell text; nothing is parsed further.
#[derive(Serialize, Default, Clone, Debug, PartialEq, Eq)]
pub struct SpotRecord {
    pub test_type: String,
    pub venue: String,
    pub region: String,
    pub city: String,
    pub deadline: String,
    pub seats_text: String,
    pub status: String,
    pub test_date: String,
}

/// Result of one extraction pass over the calendar page.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct AvailabilityVerdict {
    pub available: bool,
    pub spots: Vec<SpotRecord>,
}

impl AvailabilityVerdict {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn from_spots(spots: Vec<SpotRecord>) -> Self {
        Self {
            available: !spots.is_empty(),
            spots,
        }
    }
}
