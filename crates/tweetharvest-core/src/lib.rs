//! Shared domain types and configuration for tweetharvest.

pub mod app_config;
pub mod config;
pub mod query;
pub mod tweet;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use query::{DateRange, SearchMode};
pub use tweet::Tweet;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid date range: since {since} is not before until {until}")]
    EmptyDateRange { since: String, until: String },

    #[error("unknown search mode: {0}")]
    UnknownSearchMode(String),
}
