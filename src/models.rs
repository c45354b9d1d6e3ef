use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "admin@kampus.ac.id", format = "email")]
    pub email: String,
    #[schema(example = "secret")]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    /// Email of the account
    pub sub: String,
    pub is_admin: bool,
    pub is_dosen: bool,
    pub exp: usize,
    pub jti: String,
}
