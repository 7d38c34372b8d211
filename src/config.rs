use std::env;

use sha2::{Digest, Sha256};

const DEFAULT_KEY_PREFIX: &str = "LIC";

/// Process-wide configuration, read once at startup and passed into `AppState`.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Hash of the admin API key (see `hash_admin_key`). The plaintext is never kept.
    pub admin_key_hash: String,
    /// Set when no `ADMIN_API_KEY` was configured and one was generated for this run.
    pub generated_admin_key: Option<String>,
    pub license_key_prefix: String,
    pub rate_limit: RateLimitConfig,
    /// Days to keep activity log entries (0 = never purge)
    pub activity_log_retention_days: i64,
    pub dev_mode: bool,
}

/// Requests per minute for each rate limit tier.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub standard_rpm: u32,
    pub relaxed_rpm: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            standard_rpm: 30,
            relaxed_rpm: 60,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("HWLOCK_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let (admin_key_hash, generated_admin_key) = match env::var("ADMIN_API_KEY") {
            Ok(key) if !key.trim().is_empty() => (hash_admin_key(key.trim()), None),
            _ => {
                let key = generate_admin_key();
                (hash_admin_key(&key), Some(key))
            }
        };

        let license_key_prefix = env::var("LICENSE_KEY_PREFIX")
            .ok()
            .filter(|p| is_valid_key_prefix(p))
            .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string());

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            standard_rpm: parse_rpm("RATE_LIMIT_STANDARD_RPM", defaults.standard_rpm),
            relaxed_rpm: parse_rpm("RATE_LIMIT_RELAXED_RPM", defaults.relaxed_rpm),
        };

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "hwlock.db".to_string()),
            admin_key_hash,
            generated_admin_key,
            license_key_prefix,
            rate_limit,
            activity_log_retention_days: env::var("ACTIVITY_LOG_RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|d| *d >= 0)
                .unwrap_or(0),
            dev_mode,
        }
    }

    /// Configuration for tests and embedded use: fixed admin key, default everything else.
    pub fn with_admin_key(admin_key: &str) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            database_path: ":memory:".to_string(),
            admin_key_hash: hash_admin_key(admin_key),
            generated_admin_key: None,
            license_key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            rate_limit: RateLimitConfig::default(),
            activity_log_retention_days: 0,
            dev_mode: false,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_rpm(var: &str, default: u32) -> u32 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|rpm| *rpm > 0)
        .unwrap_or(default)
}

/// Hash an admin API key for storage and comparison.
pub fn hash_admin_key(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"hwlock-admin-v1:");
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_admin_key() -> String {
    format!("hwl_{}", uuid::Uuid::new_v4().as_simple())
}

/// License key prefixes are short uppercase-friendly alphanumeric tags.
pub fn is_valid_key_prefix(prefix: &str) -> bool {
    !prefix.is_empty() && prefix.len() <= 16 && prefix.chars().all(|c| c.is_ascii_alphanumeric())
}
