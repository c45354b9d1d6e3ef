use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::store::{AttendanceStore, IdentityLookup, StoreError};
use crate::model::attendance::{AttendanceEvent, Direction, NewAttendanceEvent};
use crate::model::subject::Identity;
use crate::utils::time::same_calendar_day;

#[derive(Debug, Error)]
pub enum RejectReason {
    #[error("Subject not found")]
    SubjectNotFound,

    #[error("Subject is not eligible for attendance")]
    SubjectNotEligible,

    #[error("Subject already checked out today")]
    AlreadyCheckedOutToday,

    #[error("Another scan for this subject was recorded at the same time")]
    ConcurrentScan,

    #[error("Attendance store unavailable")]
    StoreUnavailable(#[source] StoreError),
}

impl From<StoreError> for RejectReason {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => RejectReason::ConcurrentScan,
            other => RejectReason::StoreUnavailable(other),
        }
    }
}

/// Direction of the next event given the subject's latest one.
///
/// A new day always starts with a check-in, so a check-in left open on an
/// earlier day is abandoned rather than closed.
pub fn resolve_direction(
    latest: Option<&AttendanceEvent>,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<Direction, RejectReason> {
    let Some(latest) = latest else {
        return Ok(Direction::CheckIn);
    };

    if !same_calendar_day(latest.occurred_at, now, offset) {
        return Ok(Direction::CheckIn);
    }

    match latest.direction {
        Direction::CheckIn => Ok(Direction::CheckOut),
        Direction::CheckOut => Err(RejectReason::AlreadyCheckedOutToday),
    }
}

/// Turns scans into attendance events.
pub struct AttendanceResolver {
    identities: Arc<dyn IdentityLookup>,
    store: Arc<dyn AttendanceStore>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl AttendanceResolver {
    pub fn new(
        identities: Arc<dyn IdentityLookup>,
        store: Arc<dyn AttendanceStore>,
        clock: Arc<dyn Clock>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            identities,
            store,
            clock,
            offset,
        }
    }

    /// Look up the scanned fingerprint, then record the scan.
    pub async fn submit_scan(&self, fingerprint: &str) -> Result<AttendanceEvent, RejectReason> {
        let identity = self
            .identities
            .find_subject(fingerprint)
            .await?
            .ok_or(RejectReason::SubjectNotFound)?;

        self.resolve_scan(&identity).await
    }

    /// Record one scan for an already identified person.
    ///
    /// Rejected scans never touch the store.
    pub async fn resolve_scan(&self, identity: &Identity) -> Result<AttendanceEvent, RejectReason> {
        if !identity.eligible() {
            debug!(role = ?identity.role, "Scan rejected: not a student");
            return Err(RejectReason::SubjectNotEligible);
        }

        let subject_id = identity
            .subject_id
            .as_deref()
            .filter(|nim| !nim.trim().is_empty())
            .ok_or(RejectReason::SubjectNotFound)?;

        let latest = self.store.latest_event_for(subject_id).await?;
        let now = self.clock.now();
        let direction = resolve_direction(latest.as_ref(), now, self.offset).inspect_err(|_| {
            debug!(subject_id, "Scan rejected: already checked out today");
        })?;

        let event = NewAttendanceEvent {
            subject_id: subject_id.to_string(),
            direction,
            occurred_at: now,
        };

        let created = self
            .store
            .append(event, latest.as_ref().map(AttendanceEvent::key))
            .await
            .map_err(|e| {
                warn!(error = %e, subject_id, "Attendance append failed");
                RejectReason::from(e)
            })?;

        info!(
            subject_id,
            direction = %created.direction,
            event_id = created.id,
            "Attendance recorded"
        );

        Ok(created)
    }
}
