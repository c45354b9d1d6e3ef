use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stored in `attendances.type` as 0 (check-in) or 1 (check-out).
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Direction {
    CheckIn,
    CheckOut,
}

impl Direction {
    pub fn code(self) -> i8 {
        match self {
            Direction::CheckIn => 0,
            Direction::CheckOut => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Direction::CheckIn),
            1 => Some(Direction::CheckOut),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 42,
    "subject_id": "2201010001",
    "direction": "check_in",
    "occurred_at": "2026-10-19T01:05:00Z"
}))]
pub struct AttendanceEvent {
    pub id: u64,
    /// NIM of the student
    pub subject_id: String,
    pub direction: Direction,
    #[schema(value_type = String, format = DateTime)]
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttendanceEvent {
    pub subject_id: String,
    pub direction: Direction,
    pub occurred_at: DateTime<Utc>,
}

impl NewAttendanceEvent {
    pub fn into_event(self, id: u64) -> AttendanceEvent {
        AttendanceEvent {
            id,
            subject_id: self.subject_id,
            direction: self.direction,
            occurred_at: self.occurred_at,
        }
    }
}
