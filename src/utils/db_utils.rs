use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Number, Value, json};
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, MySql, MySqlPool, Row, TypeInfo};
use thiserror::Error;
use utoipa::ToSchema;

const MAX_IDENTIFIER_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Invalid column type: {0:?}")]
    InvalidColumnType(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Database(#[from] sqlx::Error),
}

impl ResponseError for EditorError {
    fn status_code(&self) -> StatusCode {
        match self {
            EditorError::InvalidIdentifier(_)
            | EditorError::InvalidColumnType(_)
            | EditorError::BadRequest(_) => StatusCode::BAD_REQUEST,
            EditorError::NotFound(_) => StatusCode::NOT_FOUND,
            EditorError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let EditorError::Database(e) = self {
            tracing::error!(error = %e, "Table editor query failed");
        }
        HttpResponse::build(self.status_code()).json(json!({ "message": self.to_string() }))
    }
}

/// ===============================
/// Identifiers and column types
/// ===============================

/// Validate a table/column name and wrap it in backticks.
pub fn quote_ident(name: &str) -> Result<String, EditorError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid {
        return Err(EditorError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("`{}`", name))
}

/// A top-level comma would start another clause of the statement.
fn commas_only_in_parens(column_type: &str) -> bool {
    let mut depth = 0usize;
    for c in column_type.chars() {
        match c {
            '(' => depth += 1,
            ')' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            ',' if depth == 0 => return false,
            _ => {}
        }
    }
    depth == 0
}

/// Column types are spliced into DDL, so only type-like text is accepted:
/// `VARCHAR(255)`, `DECIMAL(10,2) UNSIGNED`, `ENUM('a','b')`, `INT DEFAULT 0`.
pub fn validate_column_type(column_type: &str) -> Result<&str, EditorError> {
    let trimmed = column_type.trim();
    let allowed = |c: char| c.is_ascii_alphanumeric() || " _(),'.-".contains(c);
    let balanced_quotes = trimmed.matches('\'').count() % 2 == 0;

    if trimmed.is_empty()
        || !trimmed.starts_with(|c: char| c.is_ascii_alphabetic())
        || !trimmed.chars().all(allowed)
        || !balanced_quotes
        || !commas_only_in_parens(trimmed)
        || trimmed.contains("--")
    {
        return Err(EditorError::InvalidColumnType(column_type.to_string()));
    }
    Ok(trimmed)
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    #[schema(example = "nama")]
    pub name: String,
    #[schema(example = "VARCHAR(100)")]
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub unique: bool,
    pub nullable: Option<bool>,
}

/// `` `name` TYPE [NOT NULL] [AUTO_INCREMENT] [UNIQUE] [PRIMARY KEY] ``
pub fn column_definition(spec: &ColumnSpec) -> Result<String, EditorError> {
    let mut def = format!(
        "{} {}",
        quote_ident(&spec.name)?,
        validate_column_type(&spec.column_type)?
    );

    if spec.nullable == Some(false) || spec.primary {
        def.push_str(" NOT NULL");
    }
    if spec.auto_increment {
        def.push_str(" AUTO_INCREMENT");
    }
    if spec.unique && !spec.primary {
        def.push_str(" UNIQUE");
    }
    if spec.primary {
        def.push_str(" PRIMARY KEY");
    }
    Ok(def)
}

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

impl SqlValue {
    /// ISO datetimes become `DATETIME` values; RFC 3339 inputs are taken to UTC.
    pub fn from_json(value: &Value) -> Result<Self, EditorError> {
        let converted = match value {
            Value::String(s) => parse_temporal(s).unwrap_or_else(|| SqlValue::String(s.clone())),
            Value::Number(n) => number_value(n)?,
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Null => SqlValue::Null,
            Value::Array(_) | Value::Object(_) => {
                return Err(EditorError::BadRequest(
                    "Unsupported JSON value type".to_string(),
                ));
            }
        };
        Ok(converted)
    }
}

fn number_value(n: &Number) -> Result<SqlValue, EditorError> {
    if let Some(i) = n.as_i64() {
        Ok(SqlValue::I64(i))
    } else if let Some(u) = n.as_u64() {
        Ok(SqlValue::U64(u))
    } else if let Some(f) = n.as_f64() {
        Ok(SqlValue::F64(f))
    } else {
        Err(EditorError::BadRequest(format!("Unsupported number {}", n)))
    }
}

fn parse_temporal(s: &str) -> Option<SqlValue> {
    if s.len() < 10 || s.as_bytes().get(4) != Some(&b'-') {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(SqlValue::DateTime(dt.with_timezone(&Utc).naive_utc()));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(SqlValue::DateTime(dt));
        }
    }
    if s.len() == 10 {
        if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(SqlValue::Date(d));
        }
    }
    None
}

/// ===============================
/// SQL statement container
/// ===============================
#[derive(Debug)]
pub struct SqlStatement {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

fn as_object<'a>(payload: &'a Value, what: &str) -> Result<&'a Map<String, Value>, EditorError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| EditorError::BadRequest(format!("{} must be a JSON object", what)))?;

    if obj.is_empty() {
        return Err(EditorError::BadRequest(format!("No fields provided in {}", what)));
    }
    Ok(obj)
}

/// Build dynamic INSERT SQL
pub fn build_insert_sql(table: &str, data: &Value) -> Result<SqlStatement, EditorError> {
    let obj = as_object(data, "data")?;

    let columns = obj
        .keys()
        .map(|k| quote_ident(k))
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");
    let placeholders = vec!["?"; obj.len()].join(", ");

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table)?,
        columns,
        placeholders
    );
    let values = obj.values().map(SqlValue::from_json).collect::<Result<_, _>>()?;

    Ok(SqlStatement { sql, values })
}

/// Build dynamic UPDATE SQL
pub fn build_update_sql(
    table: &str,
    data: &Value,
    id_column: &str,
    id_value: &Value,
) -> Result<SqlStatement, EditorError> {
    let obj = as_object(data, "data")?;

    // Build SET clause
    let set_clause = obj
        .keys()
        .map(|k| quote_ident(k).map(|col| format!("{} = ?", col)))
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quote_ident(table)?,
        set_clause,
        quote_ident(id_column)?
    );

    let mut values = Vec::with_capacity(obj.len() + 1);
    for value in obj.values() {
        values.push(SqlValue::from_json(value)?);
    }

    // WHERE id = ?
    values.push(SqlValue::from_json(id_value)?);

    Ok(SqlStatement { sql, values })
}

pub enum DeleteTarget<'a> {
    Key { column: &'a str, value: &'a Value },
    /// `null` criteria become `IS NULL`
    Criteria(&'a Value),
}

/// Build dynamic DELETE SQL
pub fn build_delete_sql(table: &str, target: DeleteTarget<'_>) -> Result<SqlStatement, EditorError> {
    let table = quote_ident(table)?;

    match target {
        DeleteTarget::Key { column, value } => Ok(SqlStatement {
            sql: format!("DELETE FROM {} WHERE {} = ?", table, quote_ident(column)?),
            values: vec![SqlValue::from_json(value)?],
        }),
        DeleteTarget::Criteria(criteria) => {
            let obj = as_object(criteria, "criteria")?;
            let mut clauses = Vec::with_capacity(obj.len());
            let mut values = Vec::with_capacity(obj.len());

            for (key, value) in obj {
                let column = quote_ident(key)?;
                if value.is_null() {
                    clauses.push(format!("{} IS NULL", column));
                } else {
                    clauses.push(format!("{} = ?", column));
                    values.push(SqlValue::from_json(value)?);
                }
            }

            Ok(SqlStatement {
                sql: format!("DELETE FROM {} WHERE {}", table, clauses.join(" AND ")),
                values,
            })
        }
    }
}

/// ===============================
/// Execute
/// ===============================
pub fn bind_values<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    values: Vec<SqlValue>,
) -> Query<'q, MySql, MySqlArguments> {
    for value in values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }
    query
}

/// Returns the number of affected rows.
pub async fn execute_statement(
    pool: &MySqlPool,
    statement: SqlStatement,
) -> Result<u64, sqlx::Error> {
    let query = bind_values(sqlx::query(&statement.sql), statement.values);
    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

/// ===============================
/// Schema introspection
/// ===============================
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ColumnInfo {
    pub field: String,
    pub column_type: String,
    pub extra: String,
}

impl ColumnInfo {
    /// `Field[]Type[]Extra`, the shape the admin panel parses.
    pub fn describe(&self) -> String {
        format!("{}[]{}[]{}", self.field, self.column_type, self.extra)
    }
}

/// Base tables of the connected schema.
pub async fn list_tables(pool: &MySqlPool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT CAST(TABLE_NAME AS CHAR)
        FROM information_schema.TABLES
        WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
        ORDER BY TABLE_NAME
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Columns in declaration order; empty when the table does not exist.
pub async fn table_columns(pool: &MySqlPool, table: &str) -> Result<Vec<ColumnInfo>, sqlx::Error> {
    sqlx::query_as::<_, ColumnInfo>(
        r#"
        SELECT
            CAST(COLUMN_NAME AS CHAR) AS field,
            CAST(COLUMN_TYPE AS CHAR) AS column_type,
            CAST(COALESCE(EXTRA, '') AS CHAR) AS extra
        FROM information_schema.COLUMNS
        WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
        ORDER BY ORDINAL_POSITION
        "#,
    )
    .bind(table)
    .fetch_all(pool)
    .await
}

/// `SELECT *` over one table, decoded with [`row_to_json`].
pub async fn select_rows(
    pool: &MySqlPool,
    table: &str,
    limit: Option<u32>,
) -> Result<Vec<Map<String, Value>>, EditorError> {
    let mut sql = format!("SELECT * FROM {}", quote_ident(table)?);
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_json).collect())
}

/// ===============================
/// Generic row decoding
/// ===============================

/// Decode any result row into a JSON object keyed by column name.
pub fn row_to_json(row: &MySqlRow) -> Map<String, Value> {
    row.columns()
        .iter()
        .map(|column| {
            let idx = column.ordinal();
            let value = decode_column(row, idx, column.type_info().name());
            (column.name().to_string(), value)
        })
        .collect()
}

fn decode_column(row: &MySqlRow, idx: usize, type_name: &str) -> Value {
    let decoded = match type_name {
        "NULL" => Some(Value::Null),
        "BOOLEAN" => row
            .try_get_unchecked::<Option<i64>, _>(idx)
            .ok()
            .map(|v| v.map_or(Value::Null, |v| json!(v))),
        t if t.contains("INT") && t.ends_with("UNSIGNED") => row
            .try_get_unchecked::<Option<u64>, _>(idx)
            .ok()
            .map(|v| v.map_or(Value::Null, |v| json!(v))),
        t if t.contains("INT") || t == "YEAR" => row
            .try_get_unchecked::<Option<i64>, _>(idx)
            .ok()
            .map(|v| v.map_or(Value::Null, |v| json!(v))),
        "FLOAT" | "DOUBLE" => row
            .try_get_unchecked::<Option<f64>, _>(idx)
            .ok()
            .map(|v| v.map_or(Value::Null, |v| json!(v))),
        "DATE" => row
            .try_get_unchecked::<Option<NaiveDate>, _>(idx)
            .ok()
            .map(|v| v.map_or(Value::Null, |v| json!(v.to_string()))),
        "DATETIME" | "TIMESTAMP" => row
            .try_get_unchecked::<Option<NaiveDateTime>, _>(idx)
            .ok()
            .map(|v| v.map_or(Value::Null, |v| json!(v.format("%Y-%m-%dT%H:%M:%S").to_string()))),
        "TIME" => row
            .try_get_unchecked::<Option<NaiveTime>, _>(idx)
            .ok()
            .map(|v| v.map_or(Value::Null, |v| json!(v.to_string()))),
        _ => None,
    };

    decoded.unwrap_or_else(|| decode_text(row, idx))
}

/// DECIMAL, text, JSON and anything unrecognised travels as text.
fn decode_text(row: &MySqlRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get_unchecked::<Option<String>, _>(idx) {
        return v.map_or(Value::Null, Value::String);
    }
    match row.try_get_unchecked::<Option<Vec<u8>>, _>(idx) {
        Ok(Some(bytes)) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_ident_accepts_plain_names() {
        assert_eq!(quote_ident("temp_users").unwrap(), "`temp_users`");
        assert_eq!(quote_ident("createdAt").unwrap(), "`createdAt`");
    }

    #[test]
    fn quote_ident_rejects_injection() {
        let too_long = "x".repeat(65);
        for bad in ["", "users`; DROP TABLE x", "a b", "t-1", "naïve", too_long.as_str()] {
            assert!(
                matches!(quote_ident(bad), Err(EditorError::InvalidIdentifier(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn column_types_are_restricted() {
        assert_eq!(validate_column_type(" VARCHAR(255) ").unwrap(), "VARCHAR(255)");
        assert!(validate_column_type("DECIMAL(10,2) UNSIGNED").is_ok());
        assert!(validate_column_type("ENUM('a','b') DEFAULT 'a'").is_ok());
        assert!(validate_column_type("INT; DROP TABLE users").is_err());
        assert!(validate_column_type("INT -- comment").is_err());
        assert!(validate_column_type("VARCHAR(5) DEFAULT 'x").is_err());
        assert!(validate_column_type("(INT)").is_err());
    }

    #[test]
    fn column_type_cannot_add_clauses() {
        assert!(validate_column_type("INT, DROP COLUMN id").is_err());
        assert!(validate_column_type("DECIMAL(10,2), ADD COLUMN x INT").is_err());
        assert!(validate_column_type("VARCHAR(10))").is_err());
        assert!(validate_column_type("VARCHAR(10").is_err());
        assert!(validate_column_type("SET('a','b')").is_ok());
    }

    #[test]
    fn column_definition_applies_flags() {
        let spec = ColumnSpec {
            name: "id".into(),
            column_type: "INT".into(),
            primary: true,
            auto_increment: true,
            unique: true,
            nullable: None,
        };
        assert_eq!(
            column_definition(&spec).unwrap(),
            "`id` INT NOT NULL AUTO_INCREMENT PRIMARY KEY"
        );

        let spec = ColumnSpec {
            name: "email".into(),
            column_type: "VARCHAR(100)".into(),
            primary: false,
            auto_increment: false,
            unique: true,
            nullable: Some(false),
        };
        assert_eq!(
            column_definition(&spec).unwrap(),
            "`email` VARCHAR(100) NOT NULL UNIQUE"
        );
    }

    #[test]
    fn update_sql_normalises_iso_datetimes() {
        let data = json!({ "nama": "Budi", "createdAt": "2026-10-19T01:05:00.000Z" });
        let stmt = build_update_sql("temp_users", &data, "nim", &json!("2201010001")).unwrap();

        assert_eq!(
            stmt.sql,
            "UPDATE `temp_users` SET `createdAt` = ?, `nama` = ? WHERE `nim` = ?"
        );
        let expected = NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(1, 5, 0)
            .unwrap();
        assert_eq!(stmt.values[0], SqlValue::DateTime(expected));
        assert_eq!(stmt.values[2], SqlValue::String("2201010001".into()));
    }

    #[test]
    fn insert_sql_lists_columns_and_placeholders() {
        let data = json!({ "nim": "2201010001", "kelas": 3, "aktif": true, "catatan": null });
        let stmt = build_insert_sql("temp_users", &data).unwrap();

        assert!(stmt.sql.starts_with("INSERT INTO `temp_users` ("));
        assert!(stmt.sql.ends_with("VALUES (?, ?, ?, ?)"));
        assert_eq!(stmt.values.len(), 4);
        assert!(stmt.values.contains(&SqlValue::I64(3)));
        assert!(stmt.values.contains(&SqlValue::Bool(true)));
        assert!(stmt.values.contains(&SqlValue::Null));
    }

    #[test]
    fn builders_reject_empty_and_nested_payloads() {
        assert!(matches!(
            build_insert_sql("t", &json!({})),
            Err(EditorError::BadRequest(_))
        ));
        assert!(matches!(
            build_insert_sql("t", &json!({ "a": { "nested": 1 } })),
            Err(EditorError::BadRequest(_))
        ));
        assert!(matches!(
            build_insert_sql("t", &json!({ "bad col": 1 })),
            Err(EditorError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn delete_by_criteria_handles_nulls() {
        let criteria = json!({ "nim": "2201010001", "fingerprints": null });
        let stmt = build_delete_sql("temp_users", DeleteTarget::Criteria(&criteria)).unwrap();

        assert_eq!(
            stmt.sql,
            "DELETE FROM `temp_users` WHERE `fingerprints` IS NULL AND `nim` = ?"
        );
        assert_eq!(stmt.values, vec![SqlValue::String("2201010001".into())]);
    }

    #[test]
    fn delete_by_key() {
        let id = json!(7);
        let stmt = build_delete_sql(
            "classes",
            DeleteTarget::Key {
                column: "id",
                value: &id,
            },
        )
        .unwrap();
        assert_eq!(stmt.sql, "DELETE FROM `classes` WHERE `id` = ?");
        assert_eq!(stmt.values, vec![SqlValue::I64(7)]);
    }

    #[test]
    fn plain_dates_and_text_are_not_confused() {
        assert_eq!(
            SqlValue::from_json(&json!("2026-10-19")).unwrap(),
            SqlValue::Date(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())
        );
        assert_eq!(
            SqlValue::from_json(&json!("TI-3A")).unwrap(),
            SqlValue::String("TI-3A".into())
        );
    }

    #[test]
    fn column_info_describe_shape() {
        let column = ColumnInfo {
            field: "id".into(),
            column_type: "int(11)".into(),
            extra: "auto_increment".into(),
        };
        assert_eq!(column.describe(), "id[]int(11)[]auto_increment");
    }
}
