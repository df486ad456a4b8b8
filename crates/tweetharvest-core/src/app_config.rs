#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    /// Log filter used when `TWEETHARVEST_LOG_LEVEL` is unset.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Environment::Test => "warn",
            Environment::Development | Environment::Production => "info",
        }
    }

    /// Production output goes to log collectors, so no ANSI colour codes.
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub browserless_url: String,
    pub browserless_token: Option<String>,
    /// Opaque platform session cookie handed to every browser session.
    pub auth_token: Option<String>,
    /// Optional `lang:` search operator (e.g. `"en"`, `"id"`).
    pub lang: Option<String>,
    pub user_agent: String,
    pub render_timeout_secs: u64,
    pub scroll_pause_ms: u64,
    pub stall_limit: u32,
    pub max_parallelism: usize,
    pub max_advance_retries: u32,
    pub backoff_base_ms: u64,
    pub max_unit_attempts: u32,
    pub progress_window_secs: u64,
    pub sink_queue_capacity: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("browserless_url", &self.browserless_url)
            .field(
                "browserless_token",
                &self.browserless_token.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[redacted]"),
            )
            .field("lang", &self.lang)
            .field("user_agent", &self.user_agent)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("scroll_pause_ms", &self.scroll_pause_ms)
            .field("stall_limit", &self.stall_limit)
            .field("max_parallelism", &self.max_parallelism)
            .field("max_advance_retries", &self.max_advance_retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .field("max_unit_attempts", &self.max_unit_attempts)
            .field("progress_window_secs", &self.progress_window_secs)
            .field("sink_queue_capacity", &self.sink_queue_capacity)
            .finish()
    }
}
