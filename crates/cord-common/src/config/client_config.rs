//! Client configuration
//!
//! Loads configuration from environment variables (and a `.env` file if
//! present). Everything but the token has a default.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use cord_core::Intents;

/// Kind of account the token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountType {
    #[default]
    Bot,
    /// OAuth2 bearer token
    Bearer,
}

impl AccountType {
    /// Value of the `authorization` header for a token
    pub fn authorization(&self, token: &str) -> String {
        match self {
            Self::Bot => format!("Bot {token}"),
            Self::Bearer => format!("Bearer {token}"),
        }
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bot" => Ok(Self::Bot),
            "bearer" | "client" => Ok(Self::Bearer),
            _ => Err(format!("Invalid account type: {s}")),
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bot => f.write_str("bot"),
            Self::Bearer => f.write_str("bearer"),
        }
    }
}

/// Everything a client needs to log in
#[derive(Clone)]
pub struct ClientConfig {
    pub token: String,
    pub account_type: AccountType,
    pub shard_index: u32,
    pub shard_count: u32,
    /// Replace `shard_count` with the count recommended by the gateway
    pub use_recommended_shard_count: bool,
    /// HTTP proxy url applied to REST and websocket traffic
    pub proxy: Option<String>,
    /// Hold login until every server from READY arrived
    pub wait_for_servers_on_startup: bool,
    pub message_cache_capacity: usize,
    pub message_cache_max_age: Duration,
    pub intents: Intents,
    pub api_base_url: String,
    /// Skip the gateway url lookup and connect here
    pub gateway_url: Option<String>,
    pub large_threshold: u32,
    pub max_resume_attempts: u32,
    pub max_reconnect_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub log_json: bool,
}

// The token never ends up in logs
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"<redacted>")
            .field("account_type", &self.account_type)
            .field("shard_index", &self.shard_index)
            .field("shard_count", &self.shard_count)
            .field("use_recommended_shard_count", &self.use_recommended_shard_count)
            .field("proxy", &self.proxy)
            .field("wait_for_servers_on_startup", &self.wait_for_servers_on_startup)
            .field("message_cache_capacity", &self.message_cache_capacity)
            .field("message_cache_max_age", &self.message_cache_max_age)
            .field("intents", &self.intents)
            .field("api_base_url", &self.api_base_url)
            .field("gateway_url", &self.gateway_url)
            .finish_non_exhaustive()
    }
}

// Default value functions
fn default_shard_count() -> u32 {
    1
}

fn default_message_cache_capacity() -> usize {
    50
}

fn default_message_cache_max_age() -> Duration {
    Duration::from_secs(12 * 60 * 60)
}

fn default_api_base_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_large_threshold() -> u32 {
    250
}

fn default_max_resume_attempts() -> u32 {
    3
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_backoff_base() -> Duration {
    Duration::from_millis(1000)
}

fn default_backoff_max() -> Duration {
    Duration::from_millis(60_000)
}

impl ClientConfig {
    /// Configuration with defaults for everything but the token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            account_type: AccountType::default(),
            shard_index: 0,
            shard_count: default_shard_count(),
            use_recommended_shard_count: false,
            proxy: None,
            wait_for_servers_on_startup: true,
            message_cache_capacity: default_message_cache_capacity(),
            message_cache_max_age: default_message_cache_max_age(),
            intents: Intents::default(),
            api_base_url: default_api_base_url(),
            gateway_url: None,
            large_threshold: default_large_threshold(),
            max_resume_attempts: default_max_resume_attempts(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            backoff_base: default_backoff_base(),
            backoff_max: default_backoff_max(),
            log_json: false,
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if the token is missing or a value does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("CORD_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingVar("CORD_TOKEN"))?;

        let mut config = Self::new(token);
        let read = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = read("CORD_ACCOUNT_TYPE") {
            config.account_type = parse_value("CORD_ACCOUNT_TYPE", &v)?;
        }
        if let Some(v) = read("CORD_SHARD_INDEX") {
            config.shard_index = parse_value("CORD_SHARD_INDEX", &v)?;
        }
        if let Some(v) = read("CORD_SHARD_COUNT") {
            config.shard_count = parse_value("CORD_SHARD_COUNT", &v)?;
        }
        if let Some(v) = read("CORD_RECOMMENDED_SHARDS") {
            config.use_recommended_shard_count = parse_bool("CORD_RECOMMENDED_SHARDS", &v)?;
        }
        config.proxy = read("CORD_PROXY");
        if let Some(v) = read("CORD_WAIT_FOR_SERVERS") {
            config.wait_for_servers_on_startup = parse_bool("CORD_WAIT_FOR_SERVERS", &v)?;
        }
        if let Some(v) = read("CORD_MESSAGE_CACHE_CAPACITY") {
            config.message_cache_capacity = parse_value("CORD_MESSAGE_CACHE_CAPACITY", &v)?;
        }
        if let Some(v) = read("CORD_MESSAGE_CACHE_MAX_AGE_SECS") {
            config.message_cache_max_age =
                Duration::from_secs(parse_value("CORD_MESSAGE_CACHE_MAX_AGE_SECS", &v)?);
        }
        if let Some(v) = read("CORD_INTENTS") {
            config.intents = Intents::from_bits_truncate(parse_value("CORD_INTENTS", &v)?);
        }
        if let Some(v) = read("CORD_API_URL") {
            config.api_base_url = v.trim_end_matches('/').to_string();
        }
        config.gateway_url = read("CORD_GATEWAY_URL");
        if let Some(v) = read("CORD_LARGE_THRESHOLD") {
            config.large_threshold = parse_value("CORD_LARGE_THRESHOLD", &v)?;
        }
        if let Some(v) = read("CORD_MAX_RESUME_ATTEMPTS") {
            config.max_resume_attempts = parse_value("CORD_MAX_RESUME_ATTEMPTS", &v)?;
        }
        if let Some(v) = read("CORD_MAX_RECONNECT_ATTEMPTS") {
            config.max_reconnect_attempts = parse_value("CORD_MAX_RECONNECT_ATTEMPTS", &v)?;
        }
        if let Some(v) = read("CORD_BACKOFF_BASE_MS") {
            config.backoff_base = Duration::from_millis(parse_value("CORD_BACKOFF_BASE_MS", &v)?);
        }
        if let Some(v) = read("CORD_BACKOFF_MAX_MS") {
            config.backoff_max = Duration::from_millis(parse_value("CORD_BACKOFF_MAX_MS", &v)?);
        }
        if let Some(v) = read("CORD_LOG_JSON") {
            config.log_json = parse_bool("CORD_LOG_JSON", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shard_count == 0 {
            return Err(ConfigError::InvalidValue(
                "CORD_SHARD_COUNT",
                "must be at least 1".to_string(),
            ));
        }
        if self.shard_index >= self.shard_count {
            return Err(ConfigError::InvalidValue(
                "CORD_SHARD_INDEX",
                format!(
                    "shard {} does not exist with {} shards",
                    self.shard_index, self.shard_count
                ),
            ));
        }
        if let Some(proxy) = &self.proxy {
            let valid = ["http://", "https://", "socks5://"]
                .iter()
                .any(|scheme| proxy.starts_with(scheme) && proxy.len() > scheme.len());
            if !valid {
                return Err(ConfigError::InvalidValue("CORD_PROXY", proxy.clone()));
            }
        }
        if self.backoff_base > self.backoff_max {
            return Err(ConfigError::InvalidValue(
                "CORD_BACKOFF_BASE_MS",
                "must not exceed CORD_BACKOFF_MAX_MS".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name, value.to_string()))
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(name, value.to_string())),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
