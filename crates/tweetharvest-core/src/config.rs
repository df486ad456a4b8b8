use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Default browser user agent, matching a current desktop Chrome build.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can drive it with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let browserless_url = require("TWEETHARVEST_BROWSERLESS_URL")?;
    let browserless_token = optional("TWEETHARVEST_BROWSERLESS_TOKEN");
    let auth_token = optional("TWEETHARVEST_AUTH_TOKEN");

    let env = parse_environment(&or_default("TWEETHARVEST_ENV", "development"));
    let log_level = or_default("TWEETHARVEST_LOG_LEVEL", env.default_log_level());
    let lang = optional("TWEETHARVEST_LANG");
    let user_agent = or_default("TWEETHARVEST_USER_AGENT", DEFAULT_USER_AGENT);

    let render_timeout_secs = parse_u64("TWEETHARVEST_RENDER_TIMEOUT_SECS", "20")?;
    let scroll_pause_ms = parse_u64("TWEETHARVEST_SCROLL_PAUSE_MS", "5000")?;
    let stall_limit = parse_u32("TWEETHARVEST_STALL_LIMIT", "3")?;
    let max_parallelism = parse_usize("TWEETHARVEST_MAX_PARALLELISM", "5")?;
    let max_advance_retries = parse_u32("TWEETHARVEST_MAX_ADVANCE_RETRIES", "3")?;
    let backoff_base_ms = parse_u64("TWEETHARVEST_BACKOFF_BASE_MS", "1000")?;
    let max_unit_attempts = parse_u32("TWEETHARVEST_MAX_UNIT_ATTEMPTS", "2")?;
    let progress_window_secs = parse_u64("TWEETHARVEST_PROGRESS_WINDOW_SECS", "60")?;
    let sink_queue_capacity = parse_usize("TWEETHARVEST_SINK_QUEUE_CAPACITY", "256")?;

    if max_parallelism == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "TWEETHARVEST_MAX_PARALLELISM".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if max_unit_attempts == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "TWEETHARVEST_MAX_UNIT_ATTEMPTS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(AppConfig {
        env,
        log_level,
        browserless_url,
        browserless_token,
        auth_token,
        lang,
        user_agent,
        render_timeout_secs,
        scroll_pause_ms,
        stall_limit,
        max_parallelism,
        max_advance_retries,
        backoff_base_ms,
        max_unit_attempts,
        progress_window_secs,
        sink_queue_capacity,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
