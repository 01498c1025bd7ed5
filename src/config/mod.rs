// src/config/mod.rs
// All tunables load from the environment, with sane defaults for the
// ones an operator rarely touches.

use once_cell::sync::Lazy;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct OrgscanConfig {
    // ── Transport
    /// Whole-request timeout on the HTTP client, seconds.
    pub http_timeout: u64,
    /// Upstream requests per minute (the org API is rate-limited per org).
    pub rate_limit_per_minute: u32,
    pub default_api_version: String,

    // ── Cascade / fetchers
    /// Deadline for a single cascade attempt, milliseconds.
    pub attempt_timeout_ms: u64,
    /// Deadline for the global describe listing, which is prone to
    /// indefinite stalls, milliseconds.
    pub describe_timeout_ms: u64,
    /// Runaway guard when following query cursors.
    pub max_query_pages: u32,
    /// Concurrent per-object describe calls.
    pub describe_concurrency: usize,
    /// Per-object describes are only issued for this many objects.
    pub describe_object_cap: usize,

    // ── Health engine
    /// Deadline for the optional /limits call, milliseconds.
    pub limits_timeout_ms: u64,

    // ── Logging
    pub log_level: String,
}

fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    eprintln!("Config: {} = '{}' (parse failed, using default)", key, val);
                    default
                }
            }
        }
        Err(_) => default,
    }
}

impl OrgscanConfig {
    pub fn from_env() -> Self {
        // No .env is fine; plain environment variables still apply.
        let _ = dotenvy::dotenv();

        Self {
            http_timeout: env_var_or("ORGSCAN_HTTP_TIMEOUT", 60),
            rate_limit_per_minute: env_var_or("ORGSCAN_RATE_LIMIT_PER_MINUTE", 120),
            default_api_version: env_var_or("ORGSCAN_API_VERSION", "59.0".to_string()),
            attempt_timeout_ms: env_var_or("ORGSCAN_ATTEMPT_TIMEOUT_MS", 15_000),
            describe_timeout_ms: env_var_or("ORGSCAN_DESCRIBE_TIMEOUT_MS", 20_000),
            max_query_pages: env_var_or("ORGSCAN_MAX_QUERY_PAGES", 20),
            describe_concurrency: env_var_or("ORGSCAN_DESCRIBE_CONCURRENCY", 5),
            describe_object_cap: env_var_or("ORGSCAN_DESCRIBE_OBJECT_CAP", 200),
            limits_timeout_ms: env_var_or("ORGSCAN_LIMITS_TIMEOUT_MS", 10_000),
            log_level: env_var_or("ORGSCAN_LOG_LEVEL", "info".to_string()),
        }
    }
}

pub static CONFIG: Lazy<OrgscanConfig> = Lazy::new(OrgscanConfig::from_env);
