//! Event and attendee-match records kept in the metadata store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Organizer-facing event record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub name: String,
    /// Pass/fail access rule: attendees must present this code, if set.
    pub access_code: Option<String>,
    /// Accumulated stored bytes across all upload batches.
    pub total_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl EventRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            access_code: None,
            total_bytes: 0,
            created_at: Utc::now(),
        }
    }
}

/// One attendee's resolved matches for one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendeeMatchRecord {
    pub user_id: String,
    pub event_id: String,
    pub selfie_key: String,
    pub matched_keys: Vec<String>,
    pub matched_at: DateTime<Utc>,
}
