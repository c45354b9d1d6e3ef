use crate::{
    api::{attendance, export, monitoring, schema, settings, table_editor, users},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Option<Governor<PeerIpKeyExtractor, NoOpMiddleware>> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);

    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()?;
    Some(Governor::new(&cfg))
}

fn limiter(requests_per_min: u32, name: &str) -> Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>> {
    let governor = build_limiter(requests_per_min).unwrap_or_else(|| {
        tracing::warn!(limiter = name, requests_per_min, "Invalid rate limit, using governor defaults");
        Governor::new(&GovernorConfig::default())
    });
    Arc::new(governor)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = limiter(config.rate_login_per_min, "login");
    let scan_limiter = limiter(config.rate_scan_per_min, "scan");
    let protected_limiter = limiter(config.rate_protected_per_min, "protected");

    cfg.service(
        web::scope(&config.api_prefix)
            // Auth
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::logout)),
            )
            // Scanner device
            .service(
                web::scope("/esp")
                    .wrap(scan_limiter)
                    .service(
                        web::resource("/attendances").route(web::post().to(attendance::scan)),
                    )
                    .service(
                        web::resource("/users")
                            .route(web::get().to(users::get_user))
                            .route(web::post().to(users::create_user))
                            .route(web::patch().to(users::update_user))
                            .route(web::delete().to(users::delete_user)),
                    ),
            )
            // Dashboard; writes check the admin token in the handler
            .service(
                web::resource("/settings")
                    .route(web::get().to(settings::get_settings))
                    .route(web::post().to(settings::update_settings))
                    .route(web::put().to(settings::update_settings)),
            )
            .service(web::resource("/monitoring").route(web::get().to(monitoring::monitoring)))
            // Admin only
            .service(
                web::scope("")
                    .wrap(from_fn(auth_middleware)) // authentication
                    .wrap(protected_limiter) // rate limiting
                    .service(
                        web::resource("/export-attendances")
                            .route(web::get().to(export::export_attendances)),
                    )
                    .service(
                        web::resource("/export-monitoring-excel")
                            .route(web::get().to(export::export_monitoring_excel)),
                    )
                    .service(web::resource("/export-excel").route(web::get().to(export::export_excel)))
                    .service(web::resource("/data").route(web::get().to(table_editor::data)))
                    .service(web::resource("/create").route(web::post().to(table_editor::create)))
                    .service(web::resource("/update").route(web::put().to(table_editor::update)))
                    .service(web::resource("/delete").route(web::delete().to(table_editor::delete)))
                    .service(web::resource("/column-add").route(web::post().to(schema::add_column)))
                    .service(
                        web::resource("/column-delete").route(web::delete().to(schema::delete_column)),
                    )
                    .service(
                        web::resource("/column-update").route(web::put().to(schema::update_column)),
                    )
                    .service(web::resource("/table-create").route(web::post().to(schema::create_table)))
                    .service(
                        web::resource(["/table-delete", "/delete-table"])
                            .route(web::delete().to(schema::delete_table)),
                    )
                    .service(web::resource("/classes").route(web::get().to(schema::classes))),
            ),
    );
}
