use chrono::{NaiveDate, NaiveDateTime};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};
use serde_json::{Map, Value};

use super::daily::DailySummary;
use super::long_date_id;
use super::monitoring::{MonitoringRow, MonitoringSummary};
use crate::model::attendance::Direction;
use crate::model::settings::WorkHours;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

// Excel caps sheet names at 31 characters
const MAX_SHEET_NAME: usize = 31;

fn header_format(background: u32) -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(background))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
}

fn write_header(
    sheet: &mut Worksheet,
    row: u32,
    columns: &[(&str, f64)],
    format: &Format,
) -> Result<(), XlsxError> {
    for (col, (title, width)) in columns.iter().enumerate() {
        let col = col as u16;
        sheet.set_column_width(col, *width)?;
        sheet.write_string_with_format(row, col, *title, format)?;
    }
    Ok(())
}

fn date_id(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn time_id(at: Option<NaiveDateTime>) -> String {
    at.map_or_else(|| "-".to_string(), |t| t.format("%H.%M.%S").to_string())
}

fn datetime_id(at: Option<NaiveDateTime>) -> String {
    at.map_or_else(|| "-".to_string(), |t| t.format("%d/%m/%Y %H.%M").to_string())
}

/// "Data Absensi" export: one row per student per day.
pub fn attendance_workbook(days: &[DailySummary], hours: &WorkHours) -> Result<Vec<u8>, XlsxError> {
    const COLUMNS: [(&str, f64); 8] = [
        ("Tanggal", 15.0),
        ("NIM", 15.0),
        ("Nama", 30.0),
        ("Kelas", 15.0),
        ("Waktu Masuk", 15.0),
        ("Waktu Keluar", 15.0),
        ("Durasi", 15.0),
        ("Keterlambatan", 20.0),
    ];

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Data Absensi")?;

    write_header(sheet, 0, &COLUMNS, &header_format(0x4472C4))?;
    sheet.autofilter(0, 0, 0, COLUMNS.len() as u16 - 1)?;

    for (i, day) in days.iter().enumerate() {
        let row = i as u32 + 1;
        let cells = [
            date_id(day.date),
            day.nim.clone(),
            day.nama.clone().unwrap_or_else(|| "-".into()),
            day.kelas.clone().unwrap_or_else(|| "-".into()),
            time_id(day.check_in),
            time_id(day.check_out),
            day.duration_status(),
            day.lateness_status(hours.check_in),
        ];
        for (col, value) in cells.iter().enumerate() {
            sheet.write_string(row, col as u16, value)?;
        }
    }

    workbook.save_to_buffer()
}

/// `08j 05m`; zero or missing durations read as `-`.
pub fn format_duration(seconds: Option<i64>) -> String {
    match seconds {
        Some(s) if s != 0 => format!("{:02}j {:02}m", s / 3600, (s % 3600) / 60),
        _ => "-".to_string(),
    }
}

pub fn format_lateness(minutes: Option<i64>) -> String {
    match minutes {
        None => "-".to_string(),
        Some(0) => "Tepat Waktu".to_string(),
        Some(m) => format!("{} menit", m),
    }
}

pub fn status_label(direction: Option<Direction>) -> &'static str {
    match direction {
        Some(Direction::CheckIn) => "Hadir",
        Some(Direction::CheckOut) => "Pulang",
        None => "Belum Hadir",
    }
}

/// "Monitoring_Absensi" export: title, date and summary lines above today's board.
pub fn monitoring_workbook(rows: &[MonitoringRow], today: NaiveDate) -> Result<Vec<u8>, XlsxError> {
    const COLUMNS: [(&str, f64); 11] = [
        ("No", 5.0),
        ("Nama", 25.0),
        ("NIM", 15.0),
        ("Kelas", 10.0),
        ("Status", 15.0),
        ("Check-in Time", 20.0),
        ("Check-out Time", 20.0),
        ("Durasi (Jam)", 15.0),
        ("Keterlambatan (Menit)", 20.0),
        ("Waktu Masuk (Expected)", 20.0),
        ("Waktu Pulang (Expected)", 20.0),
    ];
    const HEADER_ROW: u32 = 3;
    let last_col = COLUMNS.len() as u16 - 1;

    let border = |color: u32| {
        Format::new()
            .set_border(FormatBorder::Thin)
            .set_border_color(Color::RGB(color))
    };
    let title = Format::new()
        .set_bold()
        .set_font_size(16)
        .set_font_color(Color::RGB(0x1F2937))
        .set_align(FormatAlign::Center);
    let subtitle = Format::new()
        .set_italic()
        .set_font_color(Color::RGB(0x6B7280))
        .set_align(FormatAlign::Center);
    let summary_format = Format::new()
        .set_font_color(Color::RGB(0x374151))
        .set_align(FormatAlign::Center);
    let header = header_format(0x1F2937)
        .set_font_size(12)
        .set_border(FormatBorder::Thin)
        .set_border_color(Color::White);
    let cell = border(0xCCCCCC);
    let status_cell = |background: u32| {
        border(0xCCCCCC)
            .set_background_color(Color::RGB(background))
            .set_font_color(Color::White)
            .set_bold()
    };
    let late_cell = border(0xCCCCCC)
        .set_background_color(Color::RGB(0xF59E0B))
        .set_font_color(Color::Black);
    let on_time_cell = border(0xCCCCCC)
        .set_background_color(Color::RGB(0x10B981))
        .set_font_color(Color::White);

    let summary = MonitoringSummary::of(rows);

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Monitoring_Absensi")?;

    sheet.merge_range(0, 0, 0, last_col, "LAPORAN MONITORING KEHADIRAN", &title)?;
    sheet.merge_range(
        1,
        0,
        1,
        last_col,
        &format!("Tanggal: {}", long_date_id(today)),
        &subtitle,
    )?;
    sheet.merge_range(
        2,
        0,
        2,
        last_col,
        &format!(
            "Total Mahasiswa: {} | Hadir: {} | Tidak Hadir: {} | Terlambat: {}",
            summary.total, summary.present, summary.absent, summary.late
        ),
        &summary_format,
    )?;

    write_header(sheet, HEADER_ROW, &COLUMNS, &header)?;
    sheet.set_row_height(HEADER_ROW, 25)?;

    for (i, row) in rows.iter().enumerate() {
        let r = HEADER_ROW + 1 + i as u32;
        let direction = row.last_direction();

        sheet.write_number_with_format(r, 0, (i + 1) as f64, &cell)?;
        sheet.write_string_with_format(r, 1, row.nama.as_deref().unwrap_or("-"), &cell)?;
        sheet.write_string_with_format(r, 2, &row.nim, &cell)?;
        sheet.write_string_with_format(r, 3, row.kelas.as_deref().unwrap_or("-"), &cell)?;

        let status_format = match direction {
            Some(Direction::CheckIn) => status_cell(0x10B981),
            Some(Direction::CheckOut) => status_cell(0x3B82F6),
            None => status_cell(0xEF4444),
        };
        sheet.write_string_with_format(r, 4, status_label(direction), &status_format)?;

        sheet.write_string_with_format(r, 5, &datetime_id(row.checkin_time), &cell)?;
        sheet.write_string_with_format(r, 6, &datetime_id(row.checkout_time), &cell)?;
        sheet.write_string_with_format(r, 7, &format_duration(row.duration_seconds), &cell)?;

        let lateness_format = match row.lateness_minutes {
            Some(m) if m > 0 => &late_cell,
            Some(0) => &on_time_cell,
            _ => &cell,
        };
        sheet.write_string_with_format(
            r,
            8,
            &format_lateness(row.lateness_minutes),
            lateness_format,
        )?;

        sheet.write_string_with_format(r, 9, &row.expected_checkin, &cell)?;
        sheet.write_string_with_format(r, 10, &row.expected_checkout, &cell)?;
    }

    workbook.save_to_buffer()
}

/// Dump of an arbitrary table; the header comes from `columns`.
pub fn table_workbook(
    table: &str,
    columns: &[String],
    rows: &[Map<String, Value>],
) -> Result<Vec<u8>, XlsxError> {
    let bold = Format::new().set_bold();
    let sheet_name: String = table.chars().take(MAX_SHEET_NAME).collect();

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(&sheet_name)?;

    for (col, name) in columns.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, name, &bold)?;
    }

    for (i, record) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        for (col, name) in columns.iter().enumerate() {
            let col = col as u16;
            match record.get(name) {
                None | Some(Value::Null) => {}
                Some(Value::Number(n)) => match n.as_f64() {
                    Some(f) => {
                        sheet.write_number(row, col, f)?;
                    }
                    None => {
                        sheet.write_string(row, col, n.to_string())?;
                    }
                },
                Some(Value::Bool(b)) => {
                    sheet.write_boolean(row, col, *b)?;
                }
                Some(Value::String(s)) => {
                    sheet.write_string(row, col, s)?;
                }
                Some(other) => {
                    sheet.write_string(row, col, other.to_string())?;
                }
            }
        }
    }

    workbook.save_to_buffer()
}
