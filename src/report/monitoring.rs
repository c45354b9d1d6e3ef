use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

use super::{EventRow, RosterEntry, lateness_minutes};
use crate::model::attendance::Direction;
use crate::model::settings::WorkHours;

/// Today's status of one student.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MonitoringRow {
    pub nama: Option<String>,
    pub nim: String,
    pub kelas: Option<String>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub last_attendance: Option<NaiveDateTime>,
    /// 0 = check-in, 1 = check-out, null = no scan today
    pub last_type: Option<i8>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub checkin_time: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub checkout_time: Option<NaiveDateTime>,
    pub duration_seconds: Option<i64>,
    pub lateness_minutes: Option<i64>,
    pub expected_checkin: String,
    pub expected_checkout: String,
}

impl MonitoringRow {
    pub fn last_direction(&self) -> Option<Direction> {
        self.last_type.and_then(|t| Direction::from_code(t as i64))
    }

    pub fn is_present(&self) -> bool {
        self.last_type.is_some()
    }

    pub fn is_late(&self) -> bool {
        self.lateness_minutes.is_some_and(|m| m > 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct MonitoringSummary {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
}

impl MonitoringSummary {
    pub fn of(rows: &[MonitoringRow]) -> Self {
        let total = rows.len();
        let present = rows.iter().filter(|r| r.is_present()).count();
        let late = rows.iter().filter(|r| r.is_late()).count();

        Self {
            total,
            present,
            absent: total - present,
            late,
        }
    }
}

#[derive(Default)]
struct DayActivity {
    last: Option<(NaiveDateTime, Direction)>,
    first_checkin: Option<NaiveDateTime>,
    last_checkout: Option<NaiveDateTime>,
}

/// Build the monitoring board from the roster and today's events.
///
/// `now` closes the duration of students still on campus. Rows are ordered by
/// latest scan, students without a scan today last.
pub fn build_rows(
    roster: &[RosterEntry],
    events_today: &[EventRow],
    now: NaiveDateTime,
    hours: &WorkHours,
) -> Vec<MonitoringRow> {
    let mut activity: HashMap<&str, DayActivity> = HashMap::new();

    for event in events_today {
        let entry = activity.entry(event.nim.as_str()).or_default();
        let at = event.created_at;

        if entry.last.is_none_or(|(last_at, _)| at >= last_at) {
            entry.last = Some((at, event.direction));
        }
        match event.direction {
            Direction::CheckIn => {
                entry.first_checkin = Some(entry.first_checkin.map_or(at, |t| t.min(at)));
            }
            Direction::CheckOut => {
                entry.last_checkout = Some(entry.last_checkout.map_or(at, |t| t.max(at)));
            }
        }
    }

    let expected_checkin = hours.check_in_label();
    let expected_checkout = hours.check_out_label();

    let mut rows: Vec<MonitoringRow> = roster
        .iter()
        .map(|student| {
            let day = activity.get(student.nim.as_str());
            let last = day.and_then(|d| d.last);
            let checkout_time = day.and_then(|d| d.last_checkout);
            let checkin_time = day.and_then(|d| d.first_checkin).or(match last {
                Some((at, Direction::CheckIn)) => Some(at),
                _ => None,
            });

            let duration_seconds =
                checkin_time.map(|start| (checkout_time.unwrap_or(now) - start).num_seconds());
            let lateness = checkin_time.map(|start| lateness_minutes(start, hours.check_in));

            MonitoringRow {
                nama: student.nama.clone(),
                nim: student.nim.clone(),
                kelas: student.kelas.clone(),
                last_attendance: last.map(|(at, _)| at),
                last_type: last.map(|(_, direction)| direction.code()),
                checkin_time,
                checkout_time,
                duration_seconds,
                lateness_minutes: lateness,
                expected_checkin: expected_checkin.clone(),
                expected_checkout: expected_checkout.clone(),
            }
        })
        .collect();

    // None sorts below Some, so reversing the comparison puts idle students last
    rows.sort_by(|a, b| b.last_attendance.cmp(&a.last_attendance));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn student(nim: &str, nama: &str) -> RosterEntry {
        RosterEntry {
            nim: nim.into(),
            nama: Some(nama.into()),
            kelas: Some("TI-3A".into()),
        }
    }

    fn scan(nim: &str, direction: Direction, created_at: NaiveDateTime) -> EventRow {
        EventRow {
            nim: nim.into(),
            direction,
            created_at,
        }
    }

    fn hours() -> WorkHours {
        WorkHours {
            check_in: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            check_out: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        }
    }

    #[test]
    fn completed_day_has_duration_and_lateness() {
        let roster = [student("001", "Ani")];
        let events = [
            scan("001", Direction::CheckIn, at(8, 20)),
            scan("001", Direction::CheckOut, at(17, 5)),
        ];

        let rows = build_rows(&roster, &events, at(18, 0), &hours());
        let row = &rows[0];

        assert_eq!(row.last_type, Some(1));
        assert_eq!(row.last_attendance, Some(at(17, 5)));
        assert_eq!(row.checkin_time, Some(at(8, 20)));
        assert_eq!(row.checkout_time, Some(at(17, 5)));
        assert_eq!(row.duration_seconds, Some((8 * 60 + 45) * 60));
        assert_eq!(row.lateness_minutes, Some(20));
        assert_eq!(row.expected_checkin, "08:00");
        assert_eq!(row.expected_checkout, "17:00");
    }

    #[test]
    fn open_session_runs_until_now() {
        let roster = [student("001", "Ani")];
        let events = [scan("001", Direction::CheckIn, at(7, 50))];

        let rows = build_rows(&roster, &events, at(10, 0), &hours());

        assert_eq!(rows[0].last_type, Some(0));
        assert_eq!(rows[0].checkout_time, None);
        assert_eq!(rows[0].duration_seconds, Some(2 * 3600 + 600));
        assert_eq!(rows[0].lateness_minutes, Some(0));
    }

    #[test]
    fn absent_students_sort_last_and_have_no_figures() {
        let roster = [student("001", "Ani"), student("002", "Budi"), student("003", "Citra")];
        let events = [
            scan("003", Direction::CheckIn, at(8, 0)),
            scan("002", Direction::CheckIn, at(9, 0)),
        ];

        let rows = build_rows(&roster, &events, at(10, 0), &hours());
        let order: Vec<_> = rows.iter().map(|r| r.nim.as_str()).collect();
        assert_eq!(order, ["002", "003", "001"]);

        let absent = &rows[2];
        assert_eq!(absent.last_type, None);
        assert_eq!(absent.duration_seconds, None);
        assert_eq!(absent.lateness_minutes, None);
    }

    #[test]
    fn events_for_unknown_students_are_ignored() {
        let roster = [student("001", "Ani")];
        let events = [scan("999", Direction::CheckIn, at(8, 0))];

        let rows = build_rows(&roster, &events, at(10, 0), &hours());
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].is_present());
    }

    #[test]
    fn summary_counts_presence_and_lateness() {
        let roster = [student("001", "Ani"), student("002", "Budi"), student("003", "Citra")];
        let events = [
            scan("001", Direction::CheckIn, at(8, 30)),
            scan("002", Direction::CheckIn, at(7, 55)),
            scan("002", Direction::CheckOut, at(16, 0)),
        ];

        let rows = build_rows(&roster, &events, at(17, 0), &hours());
        assert_eq!(
            MonitoringSummary::of(&rows),
            MonitoringSummary {
                total: 3,
                present: 2,
                absent: 1,
                late: 1,
            }
        );
    }
}
