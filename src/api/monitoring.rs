use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::MySqlPool;
use tracing::{error, warn};
use utoipa::{IntoParams, ToSchema};

use crate::api::settings::load_work_hours;
use crate::config::Config;
use crate::model::attendance::Direction;
use crate::report::monitoring::{MonitoringRow, build_rows};
use crate::report::{EventRow, RosterEntry};
use crate::utils::time::{day_bounds, to_local_naive};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MonitoringQuery {
    /// `true` returns the bare array instead of `{ data }`
    pub raw: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct MonitoringResponse {
    pub data: Vec<MonitoringRow>,
}

pub async fn fetch_roster(pool: &MySqlPool) -> Result<Vec<RosterEntry>, sqlx::Error> {
    sqlx::query_as::<_, RosterEntry>(
        r#"
        SELECT
            CAST(nim AS CHAR) AS nim,
            CAST(nama AS CHAR) AS nama,
            CAST(kelas AS CHAR) AS kelas
        FROM temp_users
        WHERE nim IS NOT NULL
        ORDER BY nim
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Events with `start <= createdAt < end`, oldest first. A missing bound is open.
pub async fn fetch_events(
    pool: &MySqlPool,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
) -> Result<Vec<EventRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, i64, NaiveDateTime)>(
        r#"
        SELECT CAST(nim AS CHAR), CAST(type AS SIGNED), createdAt
        FROM attendances
        WHERE nim IS NOT NULL
          AND (? IS NULL OR createdAt >= ?)
          AND (? IS NULL OR createdAt < ?)
        ORDER BY createdAt, id
        "#,
    )
    .bind(start)
    .bind(start)
    .bind(end)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(nim, code, created_at)| match Direction::from_code(code) {
            Some(direction) => Some(EventRow {
                nim,
                direction,
                created_at,
            }),
            None => {
                warn!(nim, code, "Skipping attendance row with unknown type");
                None
            }
        })
        .collect())
}

/// Today's board for the roster, in reference wall-clock time.
pub async fn load_today(pool: &MySqlPool, config: &Config) -> Result<Vec<MonitoringRow>, sqlx::Error> {
    let now = to_local_naive(Utc::now(), config.attendance_offset);
    let (start, end) = day_bounds(now.date());

    let roster = fetch_roster(pool).await?;
    let events = fetch_events(pool, Some(start), Some(end)).await?;
    let hours = load_work_hours(pool).await?;

    Ok(build_rows(&roster, &events, now, &hours))
}

/// `{ data }` by default, the bare array when `raw` is set.
fn monitoring_body(rows: Vec<MonitoringRow>, raw: bool) -> serde_json::Result<Value> {
    if raw {
        serde_json::to_value(rows)
    } else {
        serde_json::to_value(MonitoringResponse { data: rows })
    }
}

/// Today's attendance board
#[utoipa::path(
    get,
    path = "/api/monitoring",
    params(MonitoringQuery),
    responses(
        (status = 200, description = "One row per roster student, latest scan first", body = MonitoringResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "Monitoring"
)]
pub async fn monitoring(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<MonitoringQuery>,
) -> actix_web::Result<impl Responder> {
    let rows = load_today(pool.get_ref(), config.get_ref()).await.map_err(|e| {
        error!(error = %e, "Failed to load monitoring data");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let body = monitoring_body(rows, query.raw.unwrap_or(false)).map_err(|e| {
        error!(error = %e, "Failed to serialize monitoring data");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;
    Ok(HttpResponse::Ok().json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::settings::WorkHours;
    use chrono::NaiveDate;

    fn board() -> Vec<MonitoringRow> {
        let roster = [RosterEntry {
            nim: "2201010001".into(),
            nama: Some("Budi".into()),
            kelas: Some("TI-3A".into()),
        }];
        let now = NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        build_rows(&roster, &[], now, &WorkHours::default())
    }

    #[test]
    fn raw_query_returns_the_bare_array() {
        let body = monitoring_body(board(), true).unwrap();

        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["nim"], "2201010001");
        assert!(rows[0]["last_type"].is_null());
    }

    #[test]
    fn default_response_wraps_rows_in_data() {
        let body = monitoring_body(board(), false).unwrap();

        assert!(body.is_object());
        assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["data"][0]["nama"], "Budi");
    }
}
