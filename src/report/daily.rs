use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::{EventRow, RosterEntry, lateness_minutes};
use crate::model::attendance::Direction;

/// One student on one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub nim: String,
    pub nama: Option<String>,
    pub kelas: Option<String>,
    /// First check-in of the day
    pub check_in: Option<NaiveDateTime>,
    /// Last check-out of the day
    pub check_out: Option<NaiveDateTime>,
}

impl DailySummary {
    /// `Tepat Waktu`, `Terlambat 25m`, `Terlambat 1j 5m` or `-` without a check-in.
    pub fn lateness_status(&self, expected: NaiveTime) -> String {
        let Some(check_in) = self.check_in else {
            return "-".to_string();
        };

        let minutes = lateness_minutes(check_in, expected);
        if minutes == 0 {
            return "Tepat Waktu".to_string();
        }

        let (hours, mins) = (minutes / 60, minutes % 60);
        if hours > 0 {
            format!("Terlambat {}j {}m", hours, mins)
        } else {
            format!("Terlambat {}m", mins)
        }
    }

    /// `8j 45m`, `Belum pulang` while still checked in, `-` otherwise.
    pub fn duration_status(&self) -> String {
        match (self.check_in, self.check_out) {
            (Some(start), Some(end)) => {
                let seconds = (end - start).num_seconds();
                format!("{}j {}m", seconds / 3600, (seconds % 3600) / 60)
            }
            (Some(_), None) => "Belum pulang".to_string(),
            _ => "-".to_string(),
        }
    }
}

/// Group events per (student, day). Only roster students appear; days are
/// newest first, students ordered by NIM within a day.
pub fn summarize(roster: &[RosterEntry], events: &[EventRow]) -> Vec<DailySummary> {
    let students: BTreeMap<&str, &RosterEntry> =
        roster.iter().map(|s| (s.nim.as_str(), s)).collect();
    let mut days: BTreeMap<(NaiveDate, &str), (Option<NaiveDateTime>, Option<NaiveDateTime>)> =
        BTreeMap::new();

    for event in events {
        if !students.contains_key(event.nim.as_str()) {
            continue;
        }
        let key = (event.created_at.date(), event.nim.as_str());
        let (check_in, check_out) = days.entry(key).or_default();
        let at = event.created_at;

        match event.direction {
            Direction::CheckIn => *check_in = Some(check_in.map_or(at, |t| t.min(at))),
            Direction::CheckOut => *check_out = Some(check_out.map_or(at, |t| t.max(at))),
        }
    }

    let mut summaries: Vec<DailySummary> = days
        .into_iter()
        .map(|((date, nim), (check_in, check_out))| {
            let student = students[nim];
            DailySummary {
                date,
                nim: nim.to_string(),
                nama: student.nama.clone(),
                kelas: student.kelas.clone(),
                check_in,
                check_out,
            }
        })
        .collect();

    summaries.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.nim.cmp(&b.nim)));
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn scan(nim: &str, direction: Direction, created_at: NaiveDateTime) -> EventRow {
        EventRow {
            nim: nim.into(),
            direction,
            created_at,
        }
    }

    fn roster() -> Vec<RosterEntry> {
        vec![
            RosterEntry {
                nim: "001".into(),
                nama: Some("Ani".into()),
                kelas: Some("TI-3A".into()),
            },
            RosterEntry {
                nim: "002".into(),
                nama: None,
                kelas: None,
            },
        ]
    }

    fn eight() -> NaiveTime {
        NaiveTime::from_hms_opt(8, 0, 0).unwrap()
    }

    #[test]
    fn groups_per_student_and_day() {
        let events = [
            scan("001", Direction::CheckIn, at(18, 8, 10)),
            scan("001", Direction::CheckOut, at(18, 17, 0)),
            scan("002", Direction::CheckIn, at(19, 7, 55)),
            scan("001", Direction::CheckIn, at(19, 9, 5)),
            scan("999", Direction::CheckIn, at(19, 8, 0)),
        ];

        let days = summarize(&roster(), &events);
        let keys: Vec<_> = days.iter().map(|d| (d.date.to_string(), d.nim.as_str())).collect();
        assert_eq!(
            keys,
            [
                ("2026-10-19".to_string(), "001"),
                ("2026-10-19".to_string(), "002"),
                ("2026-10-18".to_string(), "001"),
            ]
        );
        assert_eq!(days[2].check_in, Some(at(18, 8, 10)));
        assert_eq!(days[2].check_out, Some(at(18, 17, 0)));
    }

    #[test]
    fn lateness_status_wording() {
        let mut day = DailySummary {
            date: at(19, 0, 0).date(),
            nim: "001".into(),
            nama: None,
            kelas: None,
            check_in: Some(at(19, 7, 59)),
            check_out: None,
        };
        assert_eq!(day.lateness_status(eight()), "Tepat Waktu");

        day.check_in = Some(at(19, 8, 25));
        assert_eq!(day.lateness_status(eight()), "Terlambat 25m");

        day.check_in = Some(at(19, 9, 5));
        assert_eq!(day.lateness_status(eight()), "Terlambat 1j 5m");

        day.check_in = None;
        assert_eq!(day.lateness_status(eight()), "-");
    }

    #[test]
    fn duration_status_wording() {
        let mut day = DailySummary {
            date: at(19, 0, 0).date(),
            nim: "001".into(),
            nama: None,
            kelas: None,
            check_in: Some(at(19, 8, 15)),
            check_out: Some(at(19, 17, 0)),
        };
        assert_eq!(day.duration_status(), "8j 45m");

        day.check_out = None;
        assert_eq!(day.duration_status(), "Belum pulang");

        day.check_in = None;
        assert_eq!(day.duration_status(), "-");
    }
}
