use crate::auth::auth::{AuthUser, token_from};
use crate::config::Config;
use crate::model::role::Role;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;
use tracing::debug;

/// Admin guard: a valid token from the cookie or Bearer header, issued to an
/// administrator.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let token = match token_from(&req) {
        Some(t) => t,
        None => {
            let resp = HttpResponse::Unauthorized().json(json!({"message": "Missing token"}));
            return Ok(req.into_response(resp.map_into_boxed_body()));
        }
    };

    let auth_user = match AuthUser::from_token(&token, &config.jwt_secret) {
        Ok(user) => user,
        Err(e) => {
            let resp = HttpResponse::Unauthorized()
                .json(json!({"message": "Invalid or expired token", "details": e}));
            return Ok(req.into_response(resp.map_into_boxed_body()));
        }
    };

    if auth_user.role != Role::Admin {
        debug!(user_id = auth_user.user_id, "Non-admin token on admin route");
        let resp = HttpResponse::Forbidden().json(json!({"message": "Admin only"}));
        return Ok(req.into_response(resp.map_into_boxed_body()));
    }

    req.extensions_mut().insert(auth_user);

    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::generate_token;
    use actix_web::http::{StatusCode, header::AUTHORIZATION};
    use actix_web::middleware::from_fn;
    use actix_web::{App, test, web};

    async fn whoami(user: AuthUser) -> HttpResponse {
        HttpResponse::Ok().body(user.email)
    }

    fn bearer(is_admin: bool) -> String {
        let token = generate_token(1, "u@kampus.ac.id".into(), is_admin, false, "test-secret", 60).unwrap();
        format!("Bearer {}", token)
    }

    #[actix_web::test]
    async fn admin_token_passes_and_reaches_handler() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(Config::for_tests()))
                .service(web::scope("/api").wrap(from_fn(auth_middleware)).route("/me", web::get().to(whoami))),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/me")
            .insert_header((AUTHORIZATION, bearer(true)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = test::read_body(resp).await;
        assert_eq!(body, "u@kampus.ac.id");
    }

    #[actix_web::test]
    async fn missing_bad_and_non_admin_tokens_are_refused() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(Config::for_tests()))
                .service(web::scope("/api").wrap(from_fn(auth_middleware)).route("/me", web::get().to(whoami))),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/me").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/api/me")
            .insert_header((AUTHORIZATION, "Bearer garbage"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/api/me")
            .insert_header((AUTHORIZATION, bearer(false)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }
}
