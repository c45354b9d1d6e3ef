use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDateTime};
use sqlx::mysql::MySqlDatabaseError;
use sqlx::{FromRow, MySqlPool};
use tracing::debug;

use super::store::{AttendanceStore, EventKey, IdentityLookup, StoreError};
use crate::model::attendance::{AttendanceEvent, Direction, NewAttendanceEvent};
use crate::model::role::Role;
use crate::model::subject::Identity;
use crate::utils::time::{from_local_naive, to_local_naive};

/// Looks in `users` (exact fingerprint, joined with `mahasiswa`) first, then in
/// the `temp_users` scanner roster.
pub struct MySqlIdentityLookup {
    pool: MySqlPool,
}

impl MySqlIdentityLookup {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct AccountIdentityRow {
    is_admin: i64,
    is_dosen: i64,
    nim: Option<String>,
    nama: Option<String>,
    kelas: Option<String>,
}

#[derive(FromRow)]
struct RosterIdentityRow {
    nim: Option<String>,
    nama: Option<String>,
    kelas: Option<String>,
}

/// Escape LIKE wildcards so the fingerprint is matched literally.
fn like_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[async_trait]
impl IdentityLookup for MySqlIdentityLookup {
    async fn find_subject(&self, fingerprint: &str) -> Result<Option<Identity>, StoreError> {
        let account = sqlx::query_as::<_, AccountIdentityRow>(
            r#"
            SELECT
                CAST(COALESCE(u.isAdmin, 0) AS SIGNED) AS is_admin,
                CAST(COALESCE(u.isDosen, 0) AS SIGNED) AS is_dosen,
                CAST(m.nim AS CHAR) AS nim,
                CAST(m.nama AS CHAR) AS nama,
                CAST(m.kelas AS CHAR) AS kelas
            FROM users u
            LEFT JOIN mahasiswa m ON m.userId = u.id
            WHERE u.fingerprint = ?
            LIMIT 1
            "#,
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = account {
            debug!("Fingerprint matched a user account");
            return Ok(Some(Identity {
                subject_id: row.nim,
                name: row.nama,
                class: row.kelas,
                role: Role::from_flags(row.is_admin != 0, row.is_dosen != 0),
            }));
        }

        let roster = sqlx::query_as::<_, RosterIdentityRow>(
            r#"
            SELECT
                CAST(nim AS CHAR) AS nim,
                CAST(nama AS CHAR) AS nama,
                CAST(kelas AS CHAR) AS kelas
            FROM temp_users
            WHERE fingerprints LIKE ?
            LIMIT 1
            "#,
        )
        .bind(format!("%{}%", like_literal(fingerprint)))
        .fetch_optional(&self.pool)
        .await?;

        // the roster only holds students
        Ok(roster.map(|row| Identity {
            subject_id: row.nim,
            name: row.nama,
            class: row.kelas,
            role: Role::Mahasiswa,
        }))
    }
}

/// `attendances(id, nim, type, createdAt)`; `createdAt` holds wall-clock time
/// in the reference offset.
pub struct MySqlAttendanceStore {
    pool: MySqlPool,
    offset: FixedOffset,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool, offset: FixedOffset) -> Self {
        Self { pool, offset }
    }
}

#[derive(FromRow)]
struct EventRow {
    id: u64,
    nim: String,
    kind: i64,
    created_at: NaiveDateTime,
}

#[async_trait]
impl AttendanceStore for MySqlAttendanceStore {
    async fn latest_event_for(
        &self,
        subject_id: &str,
    ) -> Result<Option<AttendanceEvent>, StoreError> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT
                CAST(id AS UNSIGNED) AS id,
                CAST(nim AS CHAR) AS nim,
                CAST(type AS SIGNED) AS kind,
                createdAt AS created_at
            FROM attendances
            WHERE nim = ?
            ORDER BY createdAt DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let direction = Direction::from_code(row.kind).ok_or_else(|| {
                StoreError::Corrupt(format!("attendance {} has type {}", row.id, row.kind))
            })?;
            Ok(AttendanceEvent {
                id: row.id,
                subject_id: row.nim,
                direction,
                occurred_at: from_local_naive(row.created_at, self.offset),
            })
        })
        .transpose()
    }

    async fn append(
        &self,
        event: NewAttendanceEvent,
        expected_latest: Option<EventKey>,
    ) -> Result<AttendanceEvent, StoreError> {
        let occurred_at = to_local_naive(event.occurred_at, self.offset);

        // Conditional insert: nothing newer, by (createdAt, id), than the event
        // the decision saw. InnoDB takes shared next-key locks for
        // INSERT ... SELECT, so of two racing scans one sees the newer row or
        // is aborted as a deadlock.
        let result = match expected_latest {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO attendances (nim, type, createdAt)
                    SELECT ?, ?, ?
                    FROM DUAL
                    WHERE NOT EXISTS (SELECT 1 FROM attendances WHERE nim = ?)
                    "#,
                )
                .bind(&event.subject_id)
                .bind(event.direction.code())
                .bind(occurred_at)
                .bind(&event.subject_id)
                .execute(&self.pool)
                .await
            }
            Some((seen_at, seen_id)) => {
                let seen_at = to_local_naive(seen_at, self.offset);
                sqlx::query(
                    r#"
                    INSERT INTO attendances (nim, type, createdAt)
                    SELECT ?, ?, ?
                    FROM DUAL
                    WHERE NOT EXISTS (
                        SELECT 1 FROM attendances
                        WHERE nim = ?
                          AND (createdAt > ? OR (createdAt = ? AND id > ?))
                    )
                    "#,
                )
                .bind(&event.subject_id)
                .bind(event.direction.code())
                .bind(occurred_at)
                .bind(&event.subject_id)
                .bind(seen_at)
                .bind(seen_at)
                .bind(seen_id)
                .execute(&self.pool)
                .await
            }
        }
        .map_err(|e| append_error(e, &event.subject_id))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(event.subject_id));
        }

        Ok(event.into_event(result.last_insert_id()))
    }
}

const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
const ER_LOCK_DEADLOCK: u16 = 1213;

/// MySQL error numbers raised for the loser of a race on the append locks.
fn is_lock_conflict(number: u16) -> bool {
    matches!(number, ER_LOCK_DEADLOCK | ER_LOCK_WAIT_TIMEOUT)
}

fn append_error(err: sqlx::Error, subject_id: &str) -> StoreError {
    let lost_race = err
        .as_database_error()
        .and_then(|e| e.try_downcast_ref::<MySqlDatabaseError>())
        .is_some_and(|e| is_lock_conflict(e.number()));

    if lost_race {
        StoreError::Conflict(subject_id.to_string())
    } else {
        StoreError::Database(err)
    }
}
