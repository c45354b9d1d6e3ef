use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{
    attendance::{AttendanceEvent, NewAttendanceEvent},
    subject::Identity,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Another event for the subject landed after the one the decision was based on.
    #[error("latest attendance of {0} changed before append")]
    Conflict(String),

    #[error("corrupt attendance row: {0}")]
    Corrupt(String),
}

/// Position of an event in a subject's history; later keys are newer.
pub type EventKey = (DateTime<Utc>, u64);

impl AttendanceEvent {
    pub fn key(&self) -> EventKey {
        (self.occurred_at, self.id)
    }
}

/// Resolves a scanner fingerprint to a person.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn find_subject(&self, fingerprint: &str) -> Result<Option<Identity>, StoreError>;
}

/// Append-only attendance log.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Most recent event by `occurred_at`, ties broken by id.
    async fn latest_event_for(
        &self,
        subject_id: &str,
    ) -> Result<Option<AttendanceEvent>, StoreError>;

    /// Appends only if no event of the subject is newer, by `(occurred_at, id)`,
    /// than `expected_latest` (`None` meaning the subject had no events). Fails
    /// with [`StoreError::Conflict`] otherwise.
    async fn append(
        &self,
        event: NewAttendanceEvent,
        expected_latest: Option<EventKey>,
    ) -> Result<AttendanceEvent, StoreError>;
}
