use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::{FromRow, MySql, MySqlPool, Transaction};
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::auth::password::hash_password;
use crate::model::role::Role;
use crate::model::user::{MAHASISWA_COLUMNS, MahasiswaRow, USER_COLUMNS, UserResponse, UserRow};
use crate::utils::db_utils::{SqlValue, bind_values};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct UserLookup {
    pub user_id: Option<u64>,
    pub fingerprint: Option<String>,
}

/// Body of both create and partial update; absent fields are left alone.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    #[schema(example = "budi@kampus.ac.id")]
    pub email: Option<String>,
    pub password: Option<String>,
    #[schema(example = 0)]
    pub is_admin: Option<u8>,
    #[schema(example = 0)]
    pub is_dosen: Option<u8>,
    #[schema(example = "12")]
    pub fingerprint: Option<String>,
    #[schema(example = "2201010001")]
    pub nim: Option<String>,
    #[schema(example = "Budi")]
    pub nama: Option<String>,
    /// Class name or class id
    #[schema(value_type = Option<String>, example = "TI-3A")]
    pub kelas: Option<Value>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn kelas_text(kelas: &Option<Value>) -> Option<String> {
    match kelas {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn flag_valid(flag: Option<u8>) -> bool {
    matches!(flag, Some(0 | 1))
}

impl UserPayload {
    fn role(&self) -> Role {
        Role::from_flags(self.is_admin == Some(1), self.is_dosen == Some(1))
    }

    /// Sets the admin or lecturer flag.
    fn grants_privilege(&self) -> bool {
        self.is_admin.is_some_and(|f| f != 0) || self.is_dosen.is_some_and(|f| f != 0)
    }

    fn missing_user_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !present(&self.email) {
            missing.push("email");
        }
        if !present(&self.password) {
            missing.push("password");
        }
        if !flag_valid(self.is_admin) {
            missing.push("isAdmin");
        }
        if !flag_valid(self.is_dosen) {
            missing.push("isDosen");
        }
        missing
    }

    fn missing_student_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !present(&self.nim) {
            missing.push("nim");
        }
        if !present(&self.nama) {
            missing.push("nama");
        }
        if kelas_text(&self.kelas).is_none() {
            missing.push("kelas");
        }
        missing
    }

    fn has_student_fields(&self) -> bool {
        self.nim.is_some() || self.nama.is_some() || self.kelas.is_some()
    }

    /// Whitelisted `users` columns present in the payload; passwords get hashed.
    fn user_updates(&self) -> Result<Vec<(&'static str, SqlValue)>, argon2::password_hash::Error> {
        let mut updates = Vec::new();
        if let Some(email) = &self.email {
            updates.push(("email", SqlValue::String(email.trim().to_string())));
        }
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            updates.push(("password", SqlValue::String(hash_password(password)?)));
        }
        if let Some(flag) = self.is_admin {
            updates.push(("isAdmin", SqlValue::I64(flag.min(1) as i64)));
        }
        if let Some(flag) = self.is_dosen {
            updates.push(("isDosen", SqlValue::I64(flag.min(1) as i64)));
        }
        if let Some(fingerprint) = &self.fingerprint {
            updates.push(("fingerprint", SqlValue::String(fingerprint.clone())));
        }
        Ok(updates)
    }

    fn student_updates(&self) -> Vec<(&'static str, SqlValue)> {
        let mut updates = Vec::new();
        if let Some(nim) = &self.nim {
            updates.push(("nim", SqlValue::String(nim.trim().to_string())));
        }
        if let Some(nama) = &self.nama {
            updates.push(("nama", SqlValue::String(nama.trim().to_string())));
        }
        if let Some(kelas) = kelas_text(&self.kelas) {
            updates.push(("kelas", SqlValue::String(kelas)));
        }
        updates
    }
}

/// `WHERE` clause for the lookup parameters; `None` when neither is given.
fn lookup_filter(lookup: &UserLookup) -> Option<(String, Vec<SqlValue>)> {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(id) = lookup.user_id {
        clauses.push("id = ?");
        values.push(SqlValue::U64(id));
    }
    if let Some(fingerprint) = lookup.fingerprint.as_deref().filter(|f| !f.is_empty()) {
        clauses.push("fingerprint = ?");
        values.push(SqlValue::String(fingerprint.to_string()));
    }

    if clauses.is_empty() {
        return None;
    }
    Some((clauses.join(" AND "), values))
}

/// `UPDATE <table> SET a = ?, b = ? [, stamp = NOW()] WHERE <key> = ?`
fn update_statement(
    table: &str,
    updates: &[(&str, SqlValue)],
    stamp: Option<&str>,
    key: &str,
) -> String {
    let mut assignments: Vec<String> = updates
        .iter()
        .map(|(column, _)| format!("{} = ?", column))
        .collect();
    if let Some(column) = stamp {
        assignments.push(format!("{} = NOW()", column));
    }
    let set_clause = assignments.join(", ");
    format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, key)
}

fn parameters_required() -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "message": "Setidaknya satu parameter diperlukan",
        "fields": ["userId", "fingerprint"]
    }))
}

fn is_admin(caller: &Option<AuthUser>) -> bool {
    caller.as_ref().is_some_and(|u| u.role == Role::Admin)
}

/// The scanner surface only manages students; anything touching admin or
/// lecturer accounts needs an admin token.
fn admin_required() -> HttpResponse {
    HttpResponse::Forbidden().json(json!({
        "message": "Hanya admin yang dapat mengelola akun admin atau dosen"
    }))
}

fn user_not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "message": "User tidak ditemukan" }))
}

fn internal(e: impl std::fmt::Display) -> actix_web::Error {
    error!(error = %e, "User directory query failed");
    actix_web::error::ErrorInternalServerError("Internal Server Error")
}

async fn find_user(pool: &MySqlPool, lookup: &UserLookup) -> Result<Option<UserRow>, sqlx::Error> {
    let Some((filter, values)) = lookup_filter(lookup) else {
        return Ok(None);
    };

    let sql = format!("SELECT {} FROM users WHERE {} LIMIT 1", USER_COLUMNS, filter);
    let row = bind_values(sqlx::query(&sql), values).fetch_optional(pool).await?;
    row.map(|r| UserRow::from_row(&r)).transpose()
}

async fn find_student(pool: &MySqlPool, user_id: u64) -> Result<Option<MahasiswaRow>, sqlx::Error> {
    let sql = format!("SELECT {} FROM mahasiswa WHERE userId = ? LIMIT 1", MAHASISWA_COLUMNS);
    sqlx::query_as::<_, MahasiswaRow>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

async fn apply_updates(
    tx: &mut Transaction<'_, MySql>,
    table: &str,
    updates: Vec<(&'static str, SqlValue)>,
    stamp: Option<&str>,
    key: &str,
    id: u64,
) -> Result<(), sqlx::Error> {
    let sql = update_statement(table, &updates, stamp, key);
    let mut values: Vec<SqlValue> = updates.into_iter().map(|(_, v)| v).collect();
    values.push(SqlValue::U64(id));

    bind_values(sqlx::query(&sql), values).execute(&mut **tx).await?;
    Ok(())
}

async fn insert_student(
    tx: &mut Transaction<'_, MySql>,
    user_id: u64,
    payload: &UserPayload,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO mahasiswa (userId, nim, nama, kelas, createdAt, updatedAt) \
         VALUES (?, ?, ?, ?, NOW(), NOW())",
    )
    .bind(user_id)
    .bind(payload.nim.as_deref().map(str::trim))
    .bind(payload.nama.as_deref().map(str::trim))
    .bind(kelas_text(&payload.kelas))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Get a scanner user
#[utoipa::path(
    get,
    path = "/api/esp/users",
    params(UserLookup),
    responses(
        (status = 200, description = "User with joined student data", body = UserResponse),
        (status = 400, description = "Neither userId nor fingerprint given"),
        (status = 404, description = "User missing, or a student without a student record")
    ),
    tag = "Scanner Users"
)]
pub async fn get_user(
    pool: web::Data<MySqlPool>,
    query: web::Query<UserLookup>,
) -> actix_web::Result<impl Responder> {
    if lookup_filter(&query).is_none() {
        return Ok(parameters_required());
    }

    let Some(user) = find_user(pool.get_ref(), &query).await.map_err(internal)? else {
        return Ok(user_not_found());
    };

    let student = if user.role().tracks_attendance() {
        match find_student(pool.get_ref(), user.id).await.map_err(internal)? {
            Some(student) => Some(student),
            None => {
                return Ok(HttpResponse::NotFound().json(json!({
                    "message": "Mahasiswa tidak ditemukan"
                })));
            }
        }
    } else {
        None
    };

    Ok(HttpResponse::Ok().json(UserResponse::new(user, student)))
}

/// Create a scanner user
///
/// Student accounts (neither admin nor lecturer) also get a `mahasiswa` row.
#[utoipa::path(
    post,
    path = "/api/esp/users",
    request_body = UserPayload,
    responses(
        (status = 201, description = "User created", body = Object, example = json!({
            "message": "User berhasil dibuat",
            "id": 12
        })),
        (status = 400, description = "Missing fields", body = Object, example = json!({
            "message": "Beberapa field diperlukan",
            "fields": ["nim", "kelas"]
        })),
        (status = 403, description = "Admin or lecturer accounts need an admin token")
    ),
    tag = "Scanner Users"
)]
pub async fn create_user(
    caller: Option<AuthUser>,
    pool: web::Data<MySqlPool>,
    payload: web::Json<UserPayload>,
) -> actix_web::Result<impl Responder> {
    if payload.grants_privilege() && !is_admin(&caller) {
        return Ok(admin_required());
    }

    let is_student = payload.role().tracks_attendance();

    let mut missing = payload.missing_user_fields();
    if is_student {
        missing.extend(payload.missing_student_fields());
    }
    if !missing.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Beberapa field diperlukan",
            "fields": missing
        })));
    }

    let password = hash_password(payload.password.as_deref().unwrap_or_default()).map_err(internal)?;

    let mut tx = pool.begin().await.map_err(internal)?;
    let user_id = sqlx::query(
        "INSERT INTO users (email, password, isAdmin, isDosen, fingerprint) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(payload.email.as_deref().map(str::trim))
    .bind(password)
    .bind(payload.is_admin)
    .bind(payload.is_dosen)
    .bind(payload.fingerprint.as_deref())
    .execute(&mut *tx)
    .await
    .map_err(internal)?
    .last_insert_id();

    if is_student {
        insert_student(&mut tx, user_id, &payload).await.map_err(internal)?;
    }
    tx.commit().await.map_err(internal)?;

    info!(user_id, is_student, "Scanner user created");
    Ok(HttpResponse::Created().json(json!({
        "message": "User berhasil dibuat",
        "id": user_id
    })))
}

/// Update a scanner user
///
/// Promoting a student to admin or lecturer removes the student record.
#[utoipa::path(
    patch,
    path = "/api/esp/users",
    params(UserLookup),
    request_body = UserPayload,
    responses(
        (status = 200, description = "User updated", body = Object, example = json!({
            "message": "User berhasil diperbarui"
        })),
        (status = 400, description = "Nothing to update, or incomplete student data"),
        (status = 403, description = "Admin or lecturer accounts need an admin token"),
        (status = 404, description = "User not found")
    ),
    tag = "Scanner Users"
)]
pub async fn update_user(
    caller: Option<AuthUser>,
    pool: web::Data<MySqlPool>,
    query: web::Query<UserLookup>,
    payload: web::Json<UserPayload>,
) -> actix_web::Result<impl Responder> {
    let Some(user_id) = query.user_id else {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Parameter userId diperlukan",
            "fields": ["userId"]
        })));
    };

    if payload.grants_privilege() && !is_admin(&caller) {
        return Ok(admin_required());
    }

    let lookup = UserLookup {
        user_id: Some(user_id),
        fingerprint: None,
    };
    let Some(user) = find_user(pool.get_ref(), &lookup).await.map_err(internal)? else {
        return Ok(user_not_found());
    };
    if !user.role().tracks_attendance() && !is_admin(&caller) {
        return Ok(admin_required());
    }

    let user_updates = payload.user_updates().map_err(internal)?;
    let student_updates = payload.student_updates();
    if user_updates.is_empty() && student_updates.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Tidak ada field valid untuk diperbarui"
        })));
    }

    let was_student = user.role().tracks_attendance();
    let is_student = Role::from_flags(
        payload.is_admin.map_or(user.is_admin != 0, |f| f != 0),
        payload.is_dosen.map_or(user.is_dosen != 0, |f| f != 0),
    )
    .tracks_attendance();
    let existing = find_student(pool.get_ref(), user.id).await.map_err(internal)?;

    if is_student && existing.is_none() && payload.has_student_fields() {
        let missing = payload.missing_student_fields();
        if !missing.is_empty() {
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "Data mahasiswa tidak valid",
                "errors": missing
            })));
        }
    }

    let mut tx = pool.begin().await.map_err(internal)?;

    if !user_updates.is_empty() {
        apply_updates(&mut tx, "users", user_updates, None, "id", user.id)
            .await
            .map_err(internal)?;
    }

    if was_student && !is_student {
        sqlx::query("DELETE FROM mahasiswa WHERE userId = ?")
            .bind(user.id)
            .execute(&mut *tx)
            .await
            .map_err(internal)?;
        info!(user_id = user.id, "Student record removed after promotion");
    } else if is_student && !student_updates.is_empty() {
        if existing.is_some() {
            apply_updates(&mut tx, "mahasiswa", student_updates, Some("updatedAt"), "userId", user.id)
                .await
                .map_err(internal)?;
        } else {
            insert_student(&mut tx, user.id, &payload).await.map_err(internal)?;
        }
    }

    tx.commit().await.map_err(internal)?;

    info!(user_id = user.id, "Scanner user updated");
    Ok(HttpResponse::Ok().json(json!({ "message": "User berhasil diperbarui" })))
}

/// Delete a scanner user and their student record
#[utoipa::path(
    delete,
    path = "/api/esp/users",
    params(UserLookup),
    responses(
        (status = 200, description = "User deleted", body = Object, example = json!({
            "message": "User berhasil dihapus"
        })),
        (status = 400, description = "Neither userId nor fingerprint given"),
        (status = 403, description = "Admin or lecturer accounts need an admin token"),
        (status = 404, description = "User not found")
    ),
    tag = "Scanner Users"
)]
pub async fn delete_user(
    caller: Option<AuthUser>,
    pool: web::Data<MySqlPool>,
    query: web::Query<UserLookup>,
) -> actix_web::Result<impl Responder> {
    if lookup_filter(&query).is_none() {
        return Ok(parameters_required());
    }

    let Some(user) = find_user(pool.get_ref(), &query).await.map_err(internal)? else {
        return Ok(user_not_found());
    };
    if !user.role().tracks_attendance() && !is_admin(&caller) {
        return Ok(admin_required());
    }

    let mut tx = pool.begin().await.map_err(internal)?;
    sqlx::query("DELETE FROM mahasiswa WHERE userId = ?")
        .bind(user.id)
        .execute(&mut *tx)
        .await
        .map_err(internal)?;
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user.id)
        .execute(&mut *tx)
        .await
        .map_err(internal)?;
    tx.commit().await.map_err(internal)?;

    info!(user_id = user.id, "Scanner user deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "User berhasil dihapus" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::generate_token;
    use crate::config::Config;
    use actix_web::http::{StatusCode, header::AUTHORIZATION};
    use actix_web::{App, test as actix_test};
    use sqlx::mysql::MySqlPoolOptions;

    fn payload(value: Value) -> UserPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn student_accounts_need_student_fields() {
        let student = payload(json!({
            "email": "budi@kampus.ac.id",
            "password": "rahasia",
            "isAdmin": 0,
            "isDosen": 0,
            "nim": "2201010001"
        }));

        assert!(student.missing_user_fields().is_empty());
        assert_eq!(student.missing_student_fields(), ["nama", "kelas"]);
        assert!(student.role().tracks_attendance());
    }

    #[test]
    fn flags_must_be_zero_or_one() {
        let user = payload(json!({ "email": "x@y.id", "password": "p", "isAdmin": 2 }));
        assert_eq!(user.missing_user_fields(), ["isAdmin", "isDosen"]);
    }

    #[test]
    fn numeric_class_ids_are_accepted() {
        let student = payload(json!({ "nim": "1", "nama": "Ani", "kelas": 3 }));
        assert!(student.missing_student_fields().is_empty());
        assert_eq!(kelas_text(&student.kelas).as_deref(), Some("3"));
    }

    #[test]
    fn lookup_needs_a_parameter() {
        let none = UserLookup {
            user_id: None,
            fingerprint: Some(String::new()),
        };
        assert!(lookup_filter(&none).is_none());

        let both = UserLookup {
            user_id: Some(4),
            fingerprint: Some("12".into()),
        };
        let (clause, values) = lookup_filter(&both).unwrap();
        assert_eq!(clause, "id = ? AND fingerprint = ?");
        assert_eq!(values, [SqlValue::U64(4), SqlValue::String("12".into())]);
    }

    #[test]
    fn updates_only_touch_given_fields() {
        let patch = payload(json!({ "fingerprint": "99", "kelas": "TI-3B", "unknown": true }));

        let user = patch.user_updates().unwrap();
        assert_eq!(user, [("fingerprint", SqlValue::String("99".into()))]);

        let student = patch.student_updates();
        assert_eq!(student, [("kelas", SqlValue::String("TI-3B".into()))]);
        assert_eq!(
            update_statement("mahasiswa", &student, Some("updatedAt"), "userId"),
            "UPDATE mahasiswa SET kelas = ?, updatedAt = NOW() WHERE userId = ?"
        );
    }

    #[test]
    fn new_passwords_are_hashed() {
        let patch = payload(json!({ "password": "baru" }));
        let updates = patch.user_updates().unwrap();

        match &updates[0] {
            ("password", SqlValue::String(hash)) => assert!(hash.starts_with("$argon2")),
            other => panic!("unexpected update {:?}", other),
        }
    }

    #[test]
    fn privilege_flags_are_detected() {
        assert!(payload(json!({ "isAdmin": 1 })).grants_privilege());
        assert!(payload(json!({ "isDosen": 1, "isAdmin": 0 })).grants_privilege());
        assert!(!payload(json!({ "isAdmin": 0, "isDosen": 0 })).grants_privilege());
        assert!(!payload(json!({ "nim": "1" })).grants_privilege());
    }

    fn bearer(is_admin: bool, is_dosen: bool) -> String {
        let token = generate_token(7, "u@kampus.ac.id".into(), is_admin, is_dosen, "test-secret", 60)
            .unwrap();
        format!("Bearer {}", token)
    }

    // Refused before any query runs, so the pool never connects.
    #[actix_web::test]
    async fn only_admins_can_grant_admin_or_lecturer_rights() {
        let pool = MySqlPoolOptions::new()
            .connect_lazy("mysql://root@127.0.0.1:1/unused")
            .unwrap();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(pool))
                .app_data(web::Data::new(Config::for_tests()))
                .route("/api/esp/users", web::post().to(create_user))
                .route("/api/esp/users", web::patch().to(update_user)),
        )
        .await;

        let admin_account = json!({
            "email": "eve@kampus.ac.id",
            "password": "rahasia",
            "isAdmin": 1,
            "isDosen": 0
        });

        let req = actix_test::TestRequest::post()
            .uri("/api/esp/users")
            .set_json(&admin_account)
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = actix_test::TestRequest::post()
            .uri("/api/esp/users")
            .insert_header((AUTHORIZATION, bearer(false, true)))
            .set_json(&admin_account)
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = actix_test::TestRequest::patch()
            .uri("/api/esp/users?userId=1")
            .set_json(json!({ "isDosen": 1 }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = actix_test::TestRequest::patch()
            .uri("/api/esp/users?userId=1")
            .insert_header((AUTHORIZATION, "Bearer garbage"))
            .set_json(json!({ "isAdmin": 1 }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["message"], "Hanya admin yang dapat mengelola akun admin atau dosen");
    }

    #[test]
    fn caller_must_hold_an_admin_token() {
        let admin = AuthUser::from_token(&bearer(true, false)[7..], "test-secret").unwrap();
        let dosen = AuthUser::from_token(&bearer(false, true)[7..], "test-secret").unwrap();

        assert!(is_admin(&Some(admin)));
        assert!(!is_admin(&Some(dosen)));
        assert!(!is_admin(&None));
    }
}
