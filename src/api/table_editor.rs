use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

use crate::auth::password::hash_password;
use crate::utils::db_utils::{
    DeleteTarget, EditorError, build_delete_sql, build_insert_sql, build_update_sql,
    execute_statement, list_tables, select_rows, table_columns,
};

/// Rows returned by the table browser
const BROWSE_LIMIT: u32 = 100;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DataQuery {
    pub table: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateRow {
    #[schema(example = "classes")]
    pub table: String,
    #[schema(value_type = Object, example = json!({ "nama_kelas": "TI-3A" }))]
    pub data: Value,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRow {
    #[schema(example = "temp_users")]
    pub table: String,
    #[schema(value_type = Object, example = json!({ "kelas": "TI-3B" }))]
    pub data: Value,
    #[schema(example = "nim")]
    pub primary_key: String,
    #[schema(value_type = Object, example = "2201010001")]
    pub id: Value,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRow {
    #[schema(example = "attendances")]
    pub table: String,
    pub primary_key: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub id: Option<Value>,
    /// Column/value pairs; `null` matches `IS NULL`
    #[schema(value_type = Option<Object>)]
    pub criteria: Option<Value>,
}

/// Replace a plain `password` field with its argon2 hash.
fn hash_password_field(data: &mut Value) -> Result<(), argon2::password_hash::Error> {
    if let Some(field) = data.get_mut("password") {
        if let Some(plain) = field.as_str().filter(|p| !p.is_empty()) {
            *field = Value::String(hash_password(plain)?);
        }
    }
    Ok(())
}

/// List tables, or browse one
#[utoipa::path(
    get,
    path = "/api/data",
    params(DataQuery),
    responses(
        (status = 200, description = "`{ tables }` without a table, `{ rows, columns }` with one", body = Object, example = json!({
            "rows": [{ "id": 1, "nama_kelas": "TI-3A" }],
            "columns": ["id[]int(11)[]auto_increment", "nama_kelas[]varchar(50)[]"]
        })),
        (status = 400, description = "Invalid table name"),
        (status = 404, description = "Table not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Table Editor"
)]
pub async fn data(
    pool: web::Data<MySqlPool>,
    query: web::Query<DataQuery>,
) -> Result<impl Responder, EditorError> {
    let Some(table) = query.table.as_deref().filter(|t| !t.is_empty()) else {
        let tables = list_tables(pool.get_ref()).await?;
        return Ok(HttpResponse::Ok().json(json!({ "tables": tables })));
    };

    let columns = table_columns(pool.get_ref(), table).await?;
    if columns.is_empty() {
        return Err(EditorError::NotFound(format!("Table {} not found", table)));
    }
    let rows = select_rows(pool.get_ref(), table, Some(BROWSE_LIMIT)).await?;

    let columns: Vec<String> = columns.iter().map(|c| c.describe()).collect();
    Ok(HttpResponse::Ok().json(json!({ "rows": rows, "columns": columns })))
}

/// Insert a row
#[utoipa::path(
    post,
    path = "/api/create",
    request_body = CreateRow,
    responses(
        (status = 200, description = "Inserted", body = Object, example = json!({ "message": "Insert success" })),
        (status = 400, description = "Invalid table, column or value")
    ),
    security(("bearer_auth" = [])),
    tag = "Table Editor"
)]
pub async fn create(
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateRow>,
) -> actix_web::Result<impl Responder> {
    let CreateRow { table, mut data } = payload.into_inner();

    hash_password_field(&mut data).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let statement = build_insert_sql(&table, &data)?;
    execute_statement(pool.get_ref(), statement)
        .await
        .map_err(EditorError::from)?;

    info!(table, "Row inserted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Insert success" })))
}

/// Update a row by key
#[utoipa::path(
    put,
    path = "/api/update",
    request_body = UpdateRow,
    responses(
        (status = 200, description = "Updated", body = Object, example = json!({ "message": "Update success" })),
        (status = 400, description = "Invalid table, column or value")
    ),
    security(("bearer_auth" = [])),
    tag = "Table Editor"
)]
pub async fn update(
    pool: web::Data<MySqlPool>,
    payload: web::Json<UpdateRow>,
) -> Result<impl Responder, EditorError> {
    if payload.id.is_null() {
        return Err(EditorError::BadRequest("Missing fields".into()));
    }

    let statement = build_update_sql(&payload.table, &payload.data, &payload.primary_key, &payload.id)?;
    let affected = execute_statement(pool.get_ref(), statement).await?;

    info!(table = %payload.table, affected, "Row updated");
    Ok(HttpResponse::Ok().json(json!({ "message": "Update success" })))
}

/// Delete rows by key or by criteria
#[utoipa::path(
    delete,
    path = "/api/delete",
    request_body = DeleteRow,
    responses(
        (status = 200, description = "Deleted", body = Object, example = json!({ "message": "Delete success" })),
        (status = 400, description = "Missing key or criteria"),
        (status = 404, description = "Nothing matched", body = Object, example = json!({
            "message": "No matching row found to delete"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Table Editor"
)]
pub async fn delete(
    pool: web::Data<MySqlPool>,
    payload: web::Json<DeleteRow>,
) -> Result<impl Responder, EditorError> {
    let target = match (&payload.primary_key, &payload.id, &payload.criteria) {
        (Some(column), Some(value), _) if !value.is_null() => DeleteTarget::Key { column, value },
        (_, _, Some(criteria)) => DeleteTarget::Criteria(criteria),
        _ => {
            return Err(EditorError::BadRequest(
                "Missing primary key or criteria for deletion".into(),
            ));
        }
    };

    let statement = build_delete_sql(&payload.table, target)?;
    let affected = execute_statement(pool.get_ref(), statement).await?;
    if affected == 0 {
        return Err(EditorError::NotFound("No matching row found to delete".into()));
    }

    info!(table = %payload.table, affected, "Rows deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Delete success" })))
}
