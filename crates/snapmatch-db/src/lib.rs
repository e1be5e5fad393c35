//! Snapmatch DB Library
//!
//! Record-store abstraction for event and attendee-match metadata. The
//! pipeline only needs get/put by key; production deployments back this
//! with their document store of choice, tests use [`MemoryRecordStore`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use snapmatch_core::models::{AttendeeMatchRecord, EventRecord};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Record store error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type RecordResult<T> = Result<T, RecordError>;

/// Key/value record store for event and attendee metadata.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_event(&self, event_id: &str) -> RecordResult<Option<EventRecord>>;

    async fn put_event(&self, event: &EventRecord) -> RecordResult<()>;

    async fn get_attendee_match(
        &self,
        user_id: &str,
        event_id: &str,
    ) -> RecordResult<Option<AttendeeMatchRecord>>;

    async fn put_attendee_match(&self, record: &AttendeeMatchRecord) -> RecordResult<()>;
}

/// In-process record store for tests and local development.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    events: Arc<Mutex<HashMap<String, EventRecord>>>,
    matches: Arc<Mutex<HashMap<(String, String), AttendeeMatchRecord>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_event(&self, event_id: &str) -> RecordResult<Option<EventRecord>> {
        Ok(self.events.lock().unwrap().get(event_id).cloned())
    }

    async fn put_event(&self, event: &EventRecord) -> RecordResult<()> {
        self.events
            .lock()
            .unwrap()
            .insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn get_attendee_match(
        &self,
        user_id: &str,
        event_id: &str,
    ) -> RecordResult<Option<AttendeeMatchRecord>> {
        Ok(self
            .matches
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), event_id.to_string()))
            .cloned())
    }

    async fn put_attendee_match(&self, record: &AttendeeMatchRecord) -> RecordResult<()> {
        self.matches.lock().unwrap().insert(
            (record.user_id.clone(), record.event_id.clone()),
            record.clone(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_round_trip() {
        let store = MemoryRecordStore::new();
        let mut event = EventRecord::new("ev1", "Spring Gala");
        event.total_bytes = 1024;

        store.put_event(&event).await.unwrap();
        let loaded = store.get_event("ev1").await.unwrap().unwrap();

        assert_eq!(loaded.name, "Spring Gala");
        assert_eq!(loaded.total_bytes, 1024);
        assert!(store.get_event("ev2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn attendee_match_keyed_by_user_and_event() {
        let store = MemoryRecordStore::new();
        let record = AttendeeMatchRecord {
            user_id: "u1".into(),
            event_id: "ev1".into(),
            selfie_key: "users/u1/selfies/selfie-1-me.jpg".into(),
            matched_keys: vec!["events/shared/ev1/images/1-0-a.jpg".into()],
            matched_at: chrono::Utc::now(),
        };

        store.put_attendee_match(&record).await.unwrap();
        let loaded = store
            .get_attendee_match("u1", "ev1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.matched_keys.len(), 1);
        assert!(store
            .get_attendee_match("u1", "ev2")
            .await
            .unwrap()
            .is_none());
    }
}
