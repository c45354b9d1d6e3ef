use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::IntoParams;

use crate::api::monitoring::{fetch_events, fetch_roster, load_today};
use crate::api::settings::load_work_hours;
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::report::daily::summarize;
use crate::report::workbook::{
    XLSX_CONTENT_TYPE, attendance_workbook, monitoring_workbook, table_workbook,
};
use crate::utils::db_utils::{EditorError, quote_ident, select_rows, table_columns};
use crate::utils::time::{day_bounds, local_date, to_local_naive};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ExportRange {
    /// Inclusive, `YYYY-MM-DD`
    pub start_date: Option<String>,
    /// Inclusive, `YYYY-MM-DD`
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExportTable {
    pub table: Option<String>,
}

fn parse_date(raw: Option<&str>, name: &str) -> Result<Option<NaiveDate>, HttpResponse> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map(Some).map_err(|_| {
            HttpResponse::BadRequest().json(json!({
                "message": format!("{} must be a YYYY-MM-DD date", name)
            }))
        }),
    }
}

/// Wall-clock window covering every day from `start` to `end`.
fn export_window(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
    (
        start.map(|d| day_bounds(d).0),
        end.map(|d| day_bounds(d).1),
    )
}

fn attendance_filename(start: Option<NaiveDate>, end: Option<NaiveDate>, today: NaiveDate) -> String {
    match (start, end) {
        (Some(s), Some(e)) => format!("attendances_{}_to_{}.xlsx", s, e),
        _ => format!("attendances_{}.xlsx", today),
    }
}

fn xlsx_response(filename: String, bytes: Vec<u8>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(XLSX_CONTENT_TYPE)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(filename)],
        })
        .body(bytes)
}

fn internal<E: std::fmt::Display>(what: &'static str) -> impl Fn(E) -> actix_web::Error {
    move |e| {
        error!(error = %e, "{}", what);
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    }
}

/// Export attendance per student per day
#[utoipa::path(
    get,
    path = "/api/export-attendances",
    params(ExportRange),
    responses(
        (status = 200, description = "xlsx workbook", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 400, description = "Malformed date"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Export"
)]
pub async fn export_attendances(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<ExportRange>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let start = match parse_date(query.start_date.as_deref(), "startDate") {
        Ok(d) => d,
        Err(resp) => return Ok(resp),
    };
    let end = match parse_date(query.end_date.as_deref(), "endDate") {
        Ok(d) => d,
        Err(resp) => return Ok(resp),
    };

    let (lower, upper) = export_window(start, end);
    let roster = fetch_roster(pool.get_ref())
        .await
        .map_err(internal("Failed to load roster"))?;
    let events = fetch_events(pool.get_ref(), lower, upper)
        .await
        .map_err(internal("Failed to load attendances"))?;
    let hours = load_work_hours(pool.get_ref())
        .await
        .map_err(internal("Failed to load settings"))?;

    let days = summarize(&roster, &events);
    let bytes = attendance_workbook(&days, &hours).map_err(internal("Failed to build workbook"))?;

    let today = local_date(Utc::now(), config.attendance_offset);
    info!(rows = days.len(), "Attendance export generated");
    Ok(xlsx_response(attendance_filename(start, end, today), bytes))
}

/// Export today's monitoring board
#[utoipa::path(
    get,
    path = "/api/export-monitoring-excel",
    responses(
        (status = 200, description = "xlsx workbook", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Export"
)]
pub async fn export_monitoring_excel(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let rows = load_today(pool.get_ref(), config.get_ref())
        .await
        .map_err(internal("Failed to load monitoring data"))?;

    let now = to_local_naive(Utc::now(), config.attendance_offset);
    let bytes = monitoring_workbook(&rows, now.date()).map_err(internal("Failed to build workbook"))?;

    let filename = format!("monitoring_absensi_{}.xlsx", now.format("%Y-%m-%d_%H%M%S"));
    Ok(xlsx_response(filename, bytes))
}

/// Export every row of one table
#[utoipa::path(
    get,
    path = "/api/export-excel",
    params(ExportTable),
    responses(
        (status = 200, description = "xlsx workbook", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 400, description = "Missing or invalid table name"),
        (status = 404, description = "Table not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Export"
)]
pub async fn export_excel(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ExportTable>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    let table = query
        .table
        .as_deref()
        .ok_or_else(|| EditorError::BadRequest("Missing or invalid table name".into()))?;
    quote_ident(table)?;

    let columns = table_columns(pool.get_ref(), table)
        .await
        .map_err(EditorError::from)?;
    if columns.is_empty() {
        return Err(EditorError::NotFound(format!("Table {} not found", table)).into());
    }

    let rows = select_rows(pool.get_ref(), table, None).await?;
    let header: Vec<String> = columns.into_iter().map(|c| c.field).collect();
    let bytes = table_workbook(table, &header, &rows).map_err(internal("Failed to build workbook"))?;

    Ok(xlsx_response(format!("{}.xlsx", table), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn filename_names_the_range_only_when_both_ends_are_given() {
        let today = date("2026-10-19");

        assert_eq!(
            attendance_filename(Some(date("2026-10-01")), Some(date("2026-10-15")), today),
            "attendances_2026-10-01_to_2026-10-15.xlsx"
        );
        assert_eq!(
            attendance_filename(Some(date("2026-10-01")), None, today),
            "attendances_2026-10-19.xlsx"
        );
        assert_eq!(attendance_filename(None, None, today), "attendances_2026-10-19.xlsx");
    }

    #[test]
    fn window_includes_the_whole_end_day() {
        let (lower, upper) = export_window(Some(date("2026-10-01")), Some(date("2026-10-15")));

        assert_eq!(lower.unwrap().to_string(), "2026-10-01 00:00:00");
        assert_eq!(upper.unwrap().to_string(), "2026-10-16 00:00:00");

        let (lower, upper) = export_window(None, Some(date("2026-10-15")));
        assert!(lower.is_none());
        assert!(upper.is_some());
    }

    #[test]
    fn dates_must_be_iso() {
        assert_eq!(parse_date(None, "startDate").ok(), Some(None));
        assert_eq!(parse_date(Some(" "), "startDate").ok(), Some(None));
        assert_eq!(
            parse_date(Some("2026-10-01"), "startDate").ok(),
            Some(Some(date("2026-10-01")))
        );
        assert!(parse_date(Some("01/10/2026"), "startDate").is_err());
    }
}
