//! Runtime configuration
//!
//! Values come from the process environment (optionally seeded from a `.env`
//! file by `dotenvy` in `main`). A variable that is present but does not parse
//! falls back to its default and logs a warning instead of aborting startup.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::query::QueryLimits;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATABASE_URL: &str = "data.db";
pub const DEFAULT_BASE_URL: &str = "http://localhost";
pub const DEFAULT_EXPIRY_SWEEP_SECS: u64 = 60;

/// Typed application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to (`PORT`)
    pub port: u16,

    /// Path of the redb database file (`DATABASE_URL`)
    pub database_url: String,

    /// Public base URL used to build `shortUrl` values (`URL`)
    pub base_url: String,

    /// Shared secret expected in the `Authorization` header for `/api` routes
    /// (`AUTHORIZATION`). `None` disables the check.
    pub authorization: Option<String>,

    /// Page size defaults and caps for listing (`DEFAULT_PAGE_SIZE`, `MAX_PAGE_SIZE`)
    pub limits: QueryLimits,

    /// How often expired links are purged (`EXPIRY_SWEEP_SECS`)
    pub expiry_sweep_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            authorization: None,
            limits: QueryLimits::default(),
            expiry_sweep_interval: Duration::from_secs(DEFAULT_EXPIRY_SWEEP_SECS),
        }
    }
}

impl Config {
    /// Builds the configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = parse_var("PORT", defaults.port);
        let database_url = env::var("DATABASE_URL").unwrap_or(defaults.database_url);
        let base_url = env::var("URL").unwrap_or(defaults.base_url);
        let authorization = env::var("AUTHORIZATION").ok().filter(|s| !s.is_empty());

        let max_page_size = parse_var("MAX_PAGE_SIZE", defaults.limits.max_page_size).max(1);
        let default_page_size = parse_var("DEFAULT_PAGE_SIZE", defaults.limits.default_page_size)
            .clamp(1, max_page_size);

        let sweep_secs = parse_var("EXPIRY_SWEEP_SECS", DEFAULT_EXPIRY_SWEEP_SECS).max(1);

        Self {
            port,
            database_url,
            base_url,
            authorization,
            limits: QueryLimits {
                default_page_size,
                max_page_size,
            },
            expiry_sweep_interval: Duration::from_secs(sweep_secs),
        }
    }

    /// Public address of a short code, e.g. `http://localhost:8080/abc123`
    pub fn short_url(&self, code: &str) -> String {
        format!("{}:{}/{}", self.base_url.trim_end_matches('/'), self.port, code)
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value {:?} for {}, using default {}", raw, name, default);
            default
        }),
        Err(_) => default,
    }
}
