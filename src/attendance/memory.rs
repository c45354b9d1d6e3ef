//! In-process doubles for the attendance seams, used by unit and handler tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::clock::Clock;
use super::store::{AttendanceStore, EventKey, IdentityLookup, StoreError};
use crate::model::attendance::{AttendanceEvent, NewAttendanceEvent};
use crate::model::subject::Identity;

#[derive(Default)]
pub struct InMemoryDirectory {
    by_fingerprint: HashMap<String, Identity>,
}

impl InMemoryDirectory {
    pub fn with(mut self, fingerprint: &str, identity: Identity) -> Self {
        self.by_fingerprint.insert(fingerprint.to_string(), identity);
        self
    }
}

#[async_trait]
impl IdentityLookup for InMemoryDirectory {
    async fn find_subject(&self, fingerprint: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self.by_fingerprint.get(fingerprint).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    events: Mutex<Vec<AttendanceEvent>>,
    interleaved: Mutex<Option<NewAttendanceEvent>>,
    failing: AtomicBool,
}

impl InMemoryStore {
    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn snapshot(&self) -> Vec<AttendanceEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Stores `event` directly, as a row written outside the resolver would be.
    pub fn insert(&self, event: NewAttendanceEvent) -> AttendanceEvent {
        Self::push(&mut self.events.lock().unwrap(), event)
    }

    /// The next `append` first commits `event`, as a competing scan would.
    pub fn interleave_next_append(&self, event: NewAttendanceEvent) {
        *self.interleaved.lock().unwrap() = Some(event);
    }

    pub fn fail_with_closed_pool(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }

    fn push(events: &mut Vec<AttendanceEvent>, event: NewAttendanceEvent) -> AttendanceEvent {
        let created = event.into_event(events.len() as u64 + 1);
        events.push(created.clone());
        created
    }
}

#[async_trait]
impl AttendanceStore for InMemoryStore {
    async fn latest_event_for(
        &self,
        subject_id: &str,
    ) -> Result<Option<AttendanceEvent>, StoreError> {
        self.check_available()?;
        let events = self.events.lock().unwrap();
        Ok(events
            .iter()
            .filter(|e| e.subject_id == subject_id)
            .max_by_key(|e| e.key())
            .cloned())
    }

    async fn append(
        &self,
        event: NewAttendanceEvent,
        expected_latest: Option<EventKey>,
    ) -> Result<AttendanceEvent, StoreError> {
        self.check_available()?;
        let mut events = self.events.lock().unwrap();

        if let Some(competing) = self.interleaved.lock().unwrap().take() {
            Self::push(&mut events, competing);
        }

        let newer_exists = events
            .iter()
            .filter(|e| e.subject_id == event.subject_id)
            .any(|e| expected_latest.is_none_or(|seen| e.key() > seen));
        if newer_exists {
            return Err(StoreError::Conflict(event.subject_id));
        }

        Ok(Self::push(&mut events, event))
    }
}

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
