//! Read-side computations over the attendance log: today's monitoring board,
//! per-day summaries and the spreadsheet exports built from them.

pub mod daily;
pub mod monitoring;
pub mod workbook;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::FromRow;

use crate::model::attendance::Direction;

/// One attendance row as reporting sees it, in reference wall-clock time.
#[derive(Debug, Clone)]
pub struct EventRow {
    pub nim: String,
    pub direction: Direction,
    pub created_at: NaiveDateTime,
}

/// Scanner roster entry (`temp_users`).
#[derive(Debug, Clone, FromRow)]
pub struct RosterEntry {
    pub nim: String,
    pub nama: Option<String>,
    pub kelas: Option<String>,
}

/// Whole minutes `checkin` is past `expected` on the same day, never negative.
pub fn lateness_minutes(checkin: NaiveDateTime, expected: NaiveTime) -> i64 {
    let expected_at = checkin.date().and_time(expected);
    (checkin - expected_at).num_seconds().div_euclid(60).max(0)
}

const WEEKDAYS_ID: [&str; 7] = ["Senin", "Selasa", "Rabu", "Kamis", "Jumat", "Sabtu", "Minggu"];
const MONTHS_ID: [&str; 12] = [
    "Januari", "Februari", "Maret", "April", "Mei", "Juni", "Juli", "Agustus", "September",
    "Oktober", "November", "Desember",
];

/// `Senin, 19 Oktober 2026`
pub fn long_date_id(date: NaiveDate) -> String {
    format!(
        "{}, {} {} {}",
        WEEKDAYS_ID[date.weekday().num_days_from_monday() as usize],
        date.day(),
        MONTHS_ID[date.month0() as usize],
        date.year()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    #[test]
    fn early_and_on_time_are_zero_lateness() {
        let eight = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        assert_eq!(lateness_minutes(at(7, 45, 0), eight), 0);
        assert_eq!(lateness_minutes(at(8, 0, 59), eight), 0);
    }

    #[test]
    fn lateness_floors_to_whole_minutes() {
        let eight = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        assert_eq!(lateness_minutes(at(8, 5, 59), eight), 5);
        assert_eq!(lateness_minutes(at(9, 30, 0), eight), 90);
    }

    #[test]
    fn formats_indonesian_long_date() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(long_date_id(date), "Senin, 19 Oktober 2026");
    }
}
