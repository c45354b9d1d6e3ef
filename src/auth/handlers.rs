use crate::{
    auth::{auth::TOKEN_COOKIE, jwt::generate_token, password::verify_password},
    config::Config,
    model::{
        role::Role,
        user::{USER_COLUMNS, UserRow},
    },
    models::LoginRequest,
};
use actix_web::cookie::{Cookie, SameSite, time::Duration};
use actix_web::{HttpResponse, Responder, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

fn token_cookie(token: String, ttl: usize) -> Cookie<'static> {
    Cookie::build(TOKEN_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(ttl as i64))
        .finish()
}

/// Login
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; token set as HttpOnly cookie", body = Object, example = json!({
            "message": "Login successful",
            "token": "eyJhbGciOiJIUzI1NiJ9...",
            "user": { "id": 1, "email": "admin@kampus.ac.id", "isAdmin": true, "isDosen": false }
        })),
        (status = 400, description = "Email or password missing"),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many requests")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(email = %user.email)
)]
pub async fn login(
    user: web::Json<LoginRequest>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    if user.email.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty email or password");
        return HttpResponse::BadRequest().json(json!({
            "message": "Email and password are required"
        }));
    }

    let sql = format!("SELECT {} FROM users WHERE email = ? LIMIT 1", USER_COLUMNS);
    let db_user = match sqlx::query_as::<_, UserRow>(&sql)
        .bind(user.email.trim())
        .fetch_optional(pool.get_ref())
        .await
    {
        Ok(Some(found)) => {
            debug!(user_id = found.id, "User found");
            found
        }
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return HttpResponse::Unauthorized().json(json!({"message": "Invalid credentials"}));
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().json(json!({"message": "Invalid credentials"}));
    }

    let role = db_user.role();
    let token = match generate_token(
        db_user.id,
        db_user.email.clone(),
        role == Role::Admin,
        role == Role::Dosen,
        &config.jwt_secret,
        config.token_ttl,
    ) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "Failed to sign token");
            return HttpResponse::InternalServerError().finish();
        }
    };

    info!(user_id = db_user.id, "Login successful");

    HttpResponse::Ok()
        .cookie(token_cookie(token.clone(), config.token_ttl))
        .json(json!({
            "message": "Login successful",
            "token": token,
            "user": {
                "id": db_user.id,
                "email": db_user.email,
                "isAdmin": role == Role::Admin,
                "isDosen": role == Role::Dosen,
            }
        }))
}

/// Logout
#[utoipa::path(
    post,
    path = "/api/logout",
    responses(
        (status = 200, description = "Token cookie cleared", body = Object, example = json!({
            "message": "Logged out"
        }))
    ),
    tag = "Auth"
)]
pub async fn logout() -> impl Responder {
    let mut cookie = token_cookie(String::new(), 0);
    cookie.make_removal();

    HttpResponse::Ok()
        .cookie(cookie)
        .json(json!({"message": "Logged out"}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test as actix_test};

    #[actix_web::test]
    async fn logout_expires_the_token_cookie() {
        let app =
            actix_test::init_service(App::new().route("/api/logout", web::post().to(logout))).await;

        let req = actix_test::TestRequest::post().uri("/api/logout").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() == TOKEN_COOKIE)
            .expect("token cookie");
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    }

    #[test]
    fn login_cookie_is_http_only() {
        let cookie = token_cookie("abc".into(), 3600);

        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::hours(1)));
    }
}
