use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-pro";
const DEFAULT_TAVILY_BASE_URL: &str = "https://api.tavily.com";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Credential wrapper that keeps API keys out of `Debug` output and logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a raw credential.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw credential for use in an outbound request.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(**redacted**)")
    }
}

/// Runtime configuration for the DocuExplore server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credential for the Gemini document and generation API.
    pub gemini_api_key: Secret,
    /// Base URL of the Gemini REST API.
    pub gemini_base_url: String,
    /// Model used for the document chat and title generation.
    pub gemini_model: String,
    /// Credential for the Tavily search API.
    pub tavily_api_key: Secret,
    /// Base URL of the Tavily REST API.
    pub tavily_base_url: String,
    /// Delay between two readiness checks of an uploaded file.
    pub file_poll_interval_secs: u64,
    /// Maximum number of readiness checks before giving up.
    pub file_poll_max_attempts: u32,
    /// Total number of search attempts (first try included).
    pub search_max_attempts: u32,
    /// Delay before the first search retry; doubles on each subsequent retry.
    pub search_backoff_base_secs: u64,
    /// Number of related articles requested from the search API.
    pub search_max_results: u32,
    /// Timeout applied to every outbound HTTP request.
    pub http_timeout_secs: u64,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Idle time after which a session and its transcript are discarded.
    pub session_idle_ttl_secs: u64,
    /// Log file path; `None` writes to `logs/docuexplore.log`.
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            gemini_api_key: Secret::new(load_env("GEMINI_API_KEY")?),
            gemini_base_url: load_env_optional("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            gemini_model: load_env_optional("GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            tavily_api_key: Secret::new(load_env("TAVILY_API_KEY")?),
            tavily_base_url: load_env_optional("TAVILY_BASE_URL")
                .unwrap_or_else(|| DEFAULT_TAVILY_BASE_URL.to_string()),
            file_poll_interval_secs: parse_optional("FILE_POLL_INTERVAL_SECS")?.unwrap_or(2),
            file_poll_max_attempts: parse_optional("FILE_POLL_MAX_ATTEMPTS")?.unwrap_or(150),
            search_max_attempts: parse_optional("SEARCH_MAX_ATTEMPTS")?.unwrap_or(3),
            search_backoff_base_secs: parse_optional("SEARCH_BACKOFF_BASE_SECS")?.unwrap_or(1),
            search_max_results: parse_optional("SEARCH_MAX_RESULTS")?.unwrap_or(5),
            http_timeout_secs: parse_optional("HTTP_TIMEOUT_SECS")?.unwrap_or(120),
            server_port: parse_optional("SERVER_PORT")?,
            session_idle_ttl_secs: parse_optional("SESSION_IDLE_TTL_SECS")?.unwrap_or(3600),
            log_file: load_env_optional("DOCUEXPLORE_LOG_FILE").map(PathBuf::from),
        })
    }

    /// Timeout applied to outbound HTTP clients.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// How long a session may sit idle before it is evicted.
    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session_idle_ttl_secs)
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load configuration from the environment and install it in the process-wide cache.
///
/// Only the binary entrypoint reads the cache; library components receive explicit settings.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    Ok(CONFIG.get_or_init(|| config))
}
