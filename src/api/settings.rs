use std::collections::BTreeMap;

use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::db::ensure_settings_table;
use crate::model::settings::{
    CHECK_IN_KEY, CHECK_OUT_KEY, DEFAULT_CHECK_IN, DEFAULT_CHECK_OUT, WorkHours,
};
use crate::utils::time::parse_hhmm;

const CHECK_IN_DESCRIPTION: &str = "Jam masuk yang diharapkan (format HH:mm)";
const CHECK_OUT_DESCRIPTION: &str = "Jam pulang yang diharapkan (format HH:mm)";

#[derive(Deserialize, ToSchema)]
pub struct UpdateSettings {
    #[schema(example = "08:00")]
    pub jam_masuk: Option<String>,
    #[schema(example = "17:00")]
    pub jam_pulang: Option<String>,
}

async fn upsert_setting(
    pool: &MySqlPool,
    key: &str,
    value: &str,
    description: &str,
    overwrite: bool,
) -> Result<(), sqlx::Error> {
    let sql = if overwrite {
        "INSERT INTO settings (setting_key, setting_value, description) VALUES (?, ?, ?) \
         ON DUPLICATE KEY UPDATE setting_value = VALUES(setting_value)"
    } else {
        "INSERT INTO settings (setting_key, setting_value, description) VALUES (?, ?, ?) \
         ON DUPLICATE KEY UPDATE setting_value = setting_value"
    };

    sqlx::query(sql)
        .bind(key)
        .bind(value)
        .bind(description)
        .execute(pool)
        .await?;
    Ok(())
}

async fn fetch_settings(pool: &MySqlPool) -> Result<BTreeMap<String, String>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT setting_key, setting_value FROM settings",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}

/// Work hours for reporting; unset or malformed values fall back to defaults.
pub async fn load_work_hours(pool: &MySqlPool) -> Result<WorkHours, sqlx::Error> {
    let settings = fetch_settings(pool).await?;
    let defaults = WorkHours::default();

    Ok(WorkHours {
        check_in: settings
            .get(CHECK_IN_KEY)
            .and_then(|v| parse_hhmm(v))
            .unwrap_or(defaults.check_in),
        check_out: settings
            .get(CHECK_OUT_KEY)
            .and_then(|v| parse_hhmm(v))
            .unwrap_or(defaults.check_out),
    })
}

/// Get settings
#[utoipa::path(
    get,
    path = "/api/settings",
    responses(
        (status = 200, description = "All settings as a key/value object", body = Object, example = json!({
            "jam_masuk": "08:00",
            "jam_pulang": "17:00"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Settings"
)]
pub async fn get_settings(pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let internal = |e: sqlx::Error| {
        error!(error = %e, "Failed to load settings");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    };

    ensure_settings_table(pool.get_ref()).await.map_err(internal)?;
    let mut settings = fetch_settings(pool.get_ref()).await.map_err(internal)?;

    for (key, default, description) in [
        (CHECK_IN_KEY, DEFAULT_CHECK_IN, CHECK_IN_DESCRIPTION),
        (CHECK_OUT_KEY, DEFAULT_CHECK_OUT, CHECK_OUT_DESCRIPTION),
    ] {
        if !settings.contains_key(key) {
            upsert_setting(pool.get_ref(), key, default, description, false)
                .await
                .map_err(internal)?;
            settings.insert(key.to_string(), default.to_string());
        }
    }

    Ok(HttpResponse::Ok().json(settings))
}

/// Update expected check-in/check-out times
#[utoipa::path(
    put,
    path = "/api/settings",
    request_body = UpdateSettings,
    responses(
        (status = 200, description = "Settings updated", body = Object, example = json!({
            "message": "Settings updated successfully"
        })),
        (status = 400, description = "Time is not HH:MM"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Settings"
)]
pub async fn update_settings(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<UpdateSettings>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let updates = [
        (CHECK_IN_KEY, payload.jam_masuk.as_deref(), CHECK_IN_DESCRIPTION),
        (CHECK_OUT_KEY, payload.jam_pulang.as_deref(), CHECK_OUT_DESCRIPTION),
    ];

    for (key, value, _) in &updates {
        if let Some(value) = value {
            if parse_hhmm(value).is_none() {
                return Ok(HttpResponse::BadRequest().json(json!({
                    "message": format!("{} must use HH:MM format", key)
                })));
            }
        }
    }

    for (key, value, description) in updates {
        let Some(value) = value else { continue };
        upsert_setting(pool.get_ref(), key, value.trim(), description, true)
            .await
            .map_err(|e| {
                error!(error = %e, key, "Failed to update setting");
                actix_web::error::ErrorInternalServerError("Internal Server Error")
            })?;
        info!(key, value, user_id = auth.user_id, "Setting updated");
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Settings updated successfully"
    })))
}
