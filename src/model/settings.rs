use chrono::NaiveTime;
use serde::Serialize;

pub const CHECK_IN_KEY: &str = "jam_masuk";
pub const CHECK_OUT_KEY: &str = "jam_pulang";
pub const DEFAULT_CHECK_IN: &str = "08:00";
pub const DEFAULT_CHECK_OUT: &str = "17:00";

/// Expected check-in/out times, used by reporting only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkHours {
    pub check_in: NaiveTime,
    pub check_out: NaiveTime,
}

impl WorkHours {
    pub fn check_in_label(&self) -> String {
        self.check_in.format("%H:%M").to_string()
    }

    pub fn check_out_label(&self) -> String {
        self.check_out.format("%H:%M").to_string()
    }
}

impl Default for WorkHours {
    fn default() -> Self {
        Self {
            check_in: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            check_out: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default(),
        }
    }
}
