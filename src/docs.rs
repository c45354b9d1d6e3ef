use crate::api::attendance::ScanRequest;
use crate::api::monitoring::MonitoringResponse;
use crate::api::schema::{AddColumn, ChangeColumn, ClassRow, CreateTable, DropColumn, DropTable};
use crate::api::settings::UpdateSettings;
use crate::api::table_editor::{CreateRow, DeleteRow, UpdateRow};
use crate::api::users::UserPayload;
use crate::model::attendance::{AttendanceEvent, Direction};
use crate::model::user::UserResponse;
use crate::models::LoginRequest;
use crate::report::monitoring::{MonitoringRow, MonitoringSummary};
use crate::utils::db_utils::ColumnSpec;
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SWAS Attendance API",
        version = "1.0.0",
        description = r#"
## Fingerprint attendance panel

Backend for a campus fingerprint attendance system. Scanner devices post
fingerprint scans; the service decides whether each scan is a check-in or a
check-out and records it.

### Key Features
- **Attendance**: one check-in and one check-out per student per day
- **Monitoring**: today's board with duration and lateness
- **Exports**: xlsx workbooks for attendance, monitoring and raw tables
- **Table editor**: admin CRUD and schema changes over the database
- **Scanner users**: device-side user management

### Security
Admin endpoints take the login token from the `token` cookie or a
**JWT Bearer** header. Scanner endpoints are open and rate limited.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::logout,

        crate::api::attendance::scan,

        crate::api::users::get_user,
        crate::api::users::create_user,
        crate::api::users::update_user,
        crate::api::users::delete_user,

        crate::api::settings::get_settings,
        crate::api::settings::update_settings,

        crate::api::monitoring::monitoring,

        crate::api::export::export_attendances,
        crate::api::export::export_monitoring_excel,
        crate::api::export::export_excel,

        crate::api::table_editor::data,
        crate::api::table_editor::create,
        crate::api::table_editor::update,
        crate::api::table_editor::delete,

        crate::api::schema::add_column,
        crate::api::schema::delete_column,
        crate::api::schema::update_column,
        crate::api::schema::create_table,
        crate::api::schema::delete_table,
        crate::api::schema::classes
    ),
    components(
        schemas(
            LoginRequest,
            ScanRequest,
            AttendanceEvent,
            Direction,
            UserPayload,
            UserResponse,
            UpdateSettings,
            MonitoringRow,
            MonitoringSummary,
            MonitoringResponse,
            CreateRow,
            UpdateRow,
            DeleteRow,
            AddColumn,
            DropColumn,
            ChangeColumn,
            ColumnSpec,
            CreateTable,
            DropTable,
            ClassRow
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and logout"),
        (name = "Attendance", description = "Fingerprint scans"),
        (name = "Scanner Users", description = "User management for scanner devices"),
        (name = "Settings", description = "Expected check-in and check-out times"),
        (name = "Monitoring", description = "Today's attendance board"),
        (name = "Export", description = "xlsx exports"),
        (name = "Table Editor", description = "Admin CRUD and schema changes"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "cookie_auth",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("token"))),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();

        for expected in [
            "/api/login",
            "/api/esp/attendances",
            "/api/esp/users",
            "/api/settings",
            "/api/monitoring",
            "/api/export-attendances",
            "/api/data",
            "/api/table-create",
            "/api/classes",
        ] {
            assert!(paths.contains(&expected), "{expected} missing from OpenAPI");
        }
    }

    #[test]
    fn security_schemes_are_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.security_schemes.contains_key("cookie_auth"));
    }
}
