use std::env;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use chrono::FixedOffset;
use dotenvy::dotenv;

use crate::utils::time::parse_utc_offset;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub server_addr: String,
    /// Seconds a login token stays valid
    pub token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_scan_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    /// Offset in which attendance calendar days are computed
    pub attendance_offset: FixedOffset,

    pub log_dir: String,
    pub log_level: tracing::Level,
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("{} must be set", key))
}

fn parsed_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{} has an invalid value {:?}: {}", key, raw, e)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();

        let offset_raw = env::var("ATTENDANCE_UTC_OFFSET").unwrap_or_else(|_| "+07:00".to_string());
        let attendance_offset = parse_utc_offset(&offset_raw)
            .ok_or_else(|| anyhow!("ATTENDANCE_UTC_OFFSET has an invalid value {:?}", offset_raw))?;

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            db_max_connections: parsed_or("DB_MAX_CONNECTIONS", 10)?,
            jwt_secret: required("JWT_SECRET")?,
            token_ttl: parsed_or("TOKEN_TTL", 604_800)?, // default 7 days

            rate_login_per_min: parsed_or("RATE_LOGIN_PER_MIN", 60)?,
            rate_scan_per_min: parsed_or("RATE_SCAN_PER_MIN", 600)?,
            rate_protected_per_min: parsed_or("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
            attendance_offset,

            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            log_level: parsed_or("LOG_LEVEL", tracing::Level::INFO)?,
        })
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            database_url: "mysql://localhost/swas_test".into(),
            db_max_connections: 1,
            jwt_secret: "test-secret".into(),
            server_addr: "127.0.0.1:0".into(),
            token_ttl: 3600,
            rate_login_per_min: 60,
            rate_scan_per_min: 600,
            rate_protected_per_min: 1000,
            api_prefix: "/api".into(),
            attendance_offset: FixedOffset::east_opt(7 * 3600).expect("valid offset"),
            log_dir: "logs".into(),
            log_level: tracing::Level::INFO,
        }
    }
}
