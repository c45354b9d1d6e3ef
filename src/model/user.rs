use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use super::role::Role;

/// Column list decoding into [`UserRow`].
pub const USER_COLUMNS: &str = "CAST(id AS UNSIGNED) AS id, email, password, \
     CAST(COALESCE(isAdmin, 0) AS SIGNED) AS is_admin, \
     CAST(COALESCE(isDosen, 0) AS SIGNED) AS is_dosen, fingerprint";

/// Column list decoding into [`MahasiswaRow`].
pub const MAHASISWA_COLUMNS: &str = "CAST(id AS UNSIGNED) AS id, CAST(nim AS CHAR) AS nim, \
     CAST(nama AS CHAR) AS nama, CAST(kelas AS CHAR) AS kelas, \
     CAST(createdAt AS CHAR) AS created_at, CAST(updatedAt AS CHAR) AS updated_at";

/// `users` row; flags are selected as signed integers so any TINYINT/BIT layout decodes.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: u64,
    pub email: String,
    pub password: String,
    pub is_admin: i64,
    pub is_dosen: i64,
    pub fingerprint: Option<String>,
}

impl UserRow {
    pub fn role(&self) -> Role {
        Role::from_flags(self.is_admin != 0, self.is_dosen != 0)
    }
}

#[derive(Debug, FromRow)]
pub struct MahasiswaRow {
    pub id: u64,
    pub nim: Option<String>,
    pub nama: Option<String>,
    pub kelas: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// User record as returned to the scanner device
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: u64,
    pub email: String,
    pub is_admin: u8,
    pub is_dosen: u8,
    pub fingerprint: Option<String>,
    pub mahasiswa_id: Option<u64>,
    pub nim: Option<String>,
    pub nama: Option<String>,
    pub kelas: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl UserResponse {
    pub fn new(user: UserRow, student: Option<MahasiswaRow>) -> Self {
        let mut response = Self {
            id: user.id,
            email: user.email,
            is_admin: (user.is_admin != 0) as u8,
            is_dosen: (user.is_dosen != 0) as u8,
            fingerprint: user.fingerprint,
            mahasiswa_id: None,
            nim: None,
            nama: None,
            kelas: None,
            created_at: None,
            updated_at: None,
        };

        if let Some(student) = student {
            response.mahasiswa_id = Some(student.id);
            response.nim = student.nim;
            response.nama = student.nama;
            response.kelas = student.kelas;
            response.created_at = student.created_at;
            response.updated_at = student.updated_at;
        }

        response
    }
}
