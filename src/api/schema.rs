use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{Executor, FromRow, MySqlPool};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::utils::db_utils::{
    ColumnSpec, EditorError, column_definition, quote_ident, validate_column_type,
};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddColumn {
    #[schema(example = "temp_users")]
    pub table: String,
    #[schema(example = "email")]
    pub column_name: String,
    #[schema(example = "VARCHAR(100)")]
    pub column_type: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DropColumn {
    #[schema(example = "temp_users")]
    pub table: String,
    #[schema(example = "email")]
    pub column_name: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangeColumn {
    #[schema(example = "temp_users")]
    pub table: String,
    #[schema(example = "email")]
    pub old_name: String,
    #[schema(example = "email_kampus")]
    pub new_name: String,
    #[schema(example = "VARCHAR(150)")]
    pub new_type: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateTable {
    #[schema(example = "ruangan")]
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

#[derive(Deserialize, ToSchema)]
pub struct DropTable {
    #[schema(example = "ruangan")]
    #[serde(alias = "table")]
    pub name: String,
}

#[derive(Serialize, FromRow, ToSchema)]
pub struct ClassRow {
    pub id: i64,
    pub nama_kelas: Option<String>,
}

pub fn add_column_sql(req: &AddColumn) -> Result<String, EditorError> {
    Ok(format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_ident(&req.table)?,
        quote_ident(&req.column_name)?,
        validate_column_type(&req.column_type)?
    ))
}

pub fn drop_column_sql(req: &DropColumn) -> Result<String, EditorError> {
    Ok(format!(
        "ALTER TABLE {} DROP COLUMN {}",
        quote_ident(&req.table)?,
        quote_ident(&req.column_name)?
    ))
}

pub fn change_column_sql(req: &ChangeColumn) -> Result<String, EditorError> {
    Ok(format!(
        "ALTER TABLE {} CHANGE {} {} {}",
        quote_ident(&req.table)?,
        quote_ident(&req.old_name)?,
        quote_ident(&req.new_name)?,
        validate_column_type(&req.new_type)?
    ))
}

pub fn create_table_sql(req: &CreateTable) -> Result<String, EditorError> {
    if req.columns.is_empty() {
        return Err(EditorError::BadRequest("A table needs at least one column".into()));
    }

    let columns = req
        .columns
        .iter()
        .map(column_definition)
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");
    Ok(format!("CREATE TABLE {} ({})", quote_ident(&req.name)?, columns))
}

pub fn drop_table_sql(req: &DropTable) -> Result<String, EditorError> {
    Ok(format!("DROP TABLE IF EXISTS {}", quote_ident(&req.name)?))
}

/// DDL cannot take bind parameters; identifiers are validated by the builders.
async fn run_ddl(pool: &MySqlPool, sql: &str) -> Result<(), EditorError> {
    pool.execute(sql).await?;
    info!(sql, "Schema changed");
    Ok(())
}

/// Add a column
#[utoipa::path(
    post,
    path = "/api/column-add",
    request_body = AddColumn,
    responses(
        (status = 200, description = "Column added", body = Object, example = json!({ "message": "Column added successfully" })),
        (status = 400, description = "Invalid identifier or type")
    ),
    security(("bearer_auth" = [])),
    tag = "Table Editor"
)]
pub async fn add_column(
    pool: web::Data<MySqlPool>,
    payload: web::Json<AddColumn>,
) -> Result<impl Responder, EditorError> {
    run_ddl(pool.get_ref(), &add_column_sql(&payload)?).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Column added successfully" })))
}

/// Drop a column
#[utoipa::path(
    delete,
    path = "/api/column-delete",
    request_body = DropColumn,
    responses(
        (status = 200, description = "Column dropped", body = Object, example = json!({ "message": "Column deleted successfully" })),
        (status = 400, description = "Invalid identifier")
    ),
    security(("bearer_auth" = [])),
    tag = "Table Editor"
)]
pub async fn delete_column(
    pool: web::Data<MySqlPool>,
    payload: web::Json<DropColumn>,
) -> Result<impl Responder, EditorError> {
    run_ddl(pool.get_ref(), &drop_column_sql(&payload)?).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Column deleted successfully" })))
}

/// Rename and retype a column
#[utoipa::path(
    put,
    path = "/api/column-update",
    request_body = ChangeColumn,
    responses(
        (status = 200, description = "Column changed", body = Object, example = json!({ "message": "Column updated successfully" })),
        (status = 400, description = "Invalid identifier or type")
    ),
    security(("bearer_auth" = [])),
    tag = "Table Editor"
)]
pub async fn update_column(
    pool: web::Data<MySqlPool>,
    payload: web::Json<ChangeColumn>,
) -> Result<impl Responder, EditorError> {
    run_ddl(pool.get_ref(), &change_column_sql(&payload)?).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Column updated successfully" })))
}

/// Create a table
#[utoipa::path(
    post,
    path = "/api/table-create",
    request_body = CreateTable,
    responses(
        (status = 200, description = "Table created", body = Object, example = json!({ "message": "Table created" })),
        (status = 400, description = "Invalid identifier or type")
    ),
    security(("bearer_auth" = [])),
    tag = "Table Editor"
)]
pub async fn create_table(
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateTable>,
) -> Result<impl Responder, EditorError> {
    run_ddl(pool.get_ref(), &create_table_sql(&payload)?).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Table created" })))
}

/// Drop a table if it exists
#[utoipa::path(
    delete,
    path = "/api/table-delete",
    request_body = DropTable,
    responses(
        (status = 200, description = "Table dropped", body = Object, example = json!({ "message": "Table deleted" })),
        (status = 400, description = "Invalid identifier")
    ),
    security(("bearer_auth" = [])),
    tag = "Table Editor"
)]
pub async fn delete_table(
    pool: web::Data<MySqlPool>,
    payload: web::Json<DropTable>,
) -> Result<impl Responder, EditorError> {
    warn!(table = %payload.name, "Dropping table");
    run_ddl(pool.get_ref(), &drop_table_sql(&payload)?).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Table deleted" })))
}

/// List classes
#[utoipa::path(
    get,
    path = "/api/classes",
    responses(
        (status = 200, description = "All classes", body = [ClassRow])
    ),
    security(("bearer_auth" = [])),
    tag = "Table Editor"
)]
pub async fn classes(pool: web::Data<MySqlPool>) -> Result<impl Responder, EditorError> {
    let rows = sqlx::query_as::<_, ClassRow>(
        "SELECT CAST(id AS SIGNED) AS id, CAST(nama_kelas AS CHAR) AS nama_kelas FROM classes ORDER BY id",
    )
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_ddl() {
        let add = AddColumn {
            table: "temp_users".into(),
            column_name: "email".into(),
            column_type: "VARCHAR(100) ".into(),
        };
        assert_eq!(
            add_column_sql(&add).unwrap(),
            "ALTER TABLE `temp_users` ADD COLUMN `email` VARCHAR(100)"
        );

        let change = ChangeColumn {
            table: "temp_users".into(),
            old_name: "email".into(),
            new_name: "email_kampus".into(),
            new_type: "VARCHAR(150)".into(),
        };
        assert_eq!(
            change_column_sql(&change).unwrap(),
            "ALTER TABLE `temp_users` CHANGE `email` `email_kampus` VARCHAR(150)"
        );

        let drop = DropColumn {
            table: "temp_users".into(),
            column_name: "email_kampus".into(),
        };
        assert_eq!(
            drop_column_sql(&drop).unwrap(),
            "ALTER TABLE `temp_users` DROP COLUMN `email_kampus`"
        );
    }

    #[test]
    fn column_type_cannot_smuggle_statements() {
        let add = AddColumn {
            table: "temp_users".into(),
            column_name: "x".into(),
            column_type: "INT; DROP TABLE users".into(),
        };
        assert!(matches!(add_column_sql(&add), Err(EditorError::InvalidColumnType(_))));
    }

    #[test]
    fn create_table_from_json() {
        let req: CreateTable = serde_json::from_value(json!({
            "name": "ruangan",
            "columns": [
                { "name": "id", "type": "INT", "primary": true, "autoIncrement": true },
                { "name": "nama", "type": "VARCHAR(50)" }
            ]
        }))
        .unwrap();

        assert_eq!(
            create_table_sql(&req).unwrap(),
            "CREATE TABLE `ruangan` (`id` INT NOT NULL AUTO_INCREMENT PRIMARY KEY, `nama` VARCHAR(50))"
        );
    }

    #[test]
    fn create_table_needs_columns() {
        let req = CreateTable {
            name: "kosong".into(),
            columns: vec![],
        };
        assert!(matches!(create_table_sql(&req), Err(EditorError::BadRequest(_))));
    }

    #[test]
    fn drop_table_accepts_either_field_name() {
        let by_name: DropTable = serde_json::from_value(json!({ "name": "ruangan" })).unwrap();
        let by_table: DropTable = serde_json::from_value(json!({ "table": "ruangan" })).unwrap();

        assert_eq!(drop_table_sql(&by_name).unwrap(), "DROP TABLE IF EXISTS `ruangan`");
        assert_eq!(drop_table_sql(&by_table).unwrap(), "DROP TABLE IF EXISTS `ruangan`");
    }
}
