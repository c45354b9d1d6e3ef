use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Parse an offset like `+07:00`, `-03:30` or `Z`.
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Strict 24h `HH:MM`.
pub fn parse_hhmm(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    if raw.len() != 5 {
        return None;
    }
    NaiveTime::parse_from_str(raw, "%H:%M").ok()
}

/// Calendar date of an instant in the reference offset.
pub fn local_date(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

/// Compares year/month/day in the reference offset, never elapsed hours.
pub fn same_calendar_day(a: DateTime<Utc>, b: DateTime<Utc>, offset: FixedOffset) -> bool {
    local_date(a, offset) == local_date(b, offset)
}

/// Wall-clock representation used by the `createdAt` DATETIME column.
pub fn to_local_naive(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDateTime {
    instant.with_timezone(&offset).naive_local()
}

pub fn from_local_naive(local: NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    let shift = Duration::seconds(offset.local_minus_utc() as i64);
    Utc.from_utc_datetime(&(local - shift))
}

/// Half-open `[start, end)` wall-clock bounds of a calendar day.
pub fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = date.and_time(NaiveTime::default());
    (start, start + Duration::days(1))
}
