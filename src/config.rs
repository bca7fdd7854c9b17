use crate::domain::error::DomainError;
use crate::infrastructure::exchange::kalshi::DEFAULT_BASE_URL as KALSHI_BASE_URL;

pub const REASONING_URL: &str = "http://localhost:8088/v1";
pub const REASONING_MODEL: &str = "qwen3:14b";

/// Capacity of the explicit-trigger channel. Triggers beyond a pending one
/// are dropped since the pending cycle covers them.
pub const TRIGGER_CHANNEL_CAPACITY: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    Noop,
    OpenAi,
    Voyage,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub log_level: String,
    pub kalshi_base_url: String,
    pub kalshi_api_key: Option<String>,
    /// Inline PEM (KALSHI_PRIVATE_KEY), preferred over KALSHI_KEY_PATH.
    pub kalshi_private_key: Option<String>,
    pub kalshi_key_path: Option<String>,
    pub embedding_backend: EmbeddingBackend,
    pub embedding_api_key: String,
    pub embedding_model: Option<String>,
    pub embedding_url: Option<String>,
    pub reasoning_url: String,
    pub reasoning_model: String,
    pub reasoning_api_key: String,
    pub cache_enabled: bool,
    pub sync_interval_secs: u64,
    pub api_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, DomainError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let embedding_backend = match get("MARKETLINK_EMBEDDING_PROVIDER").as_deref() {
            None | Some("noop") => EmbeddingBackend::Noop,
            Some("openai") => EmbeddingBackend::OpenAi,
            Some("voyage") => EmbeddingBackend::Voyage,
            Some(other) => {
                return Err(DomainError::Config(format!(
                    "MARKETLINK_EMBEDDING_PROVIDER must be noop, openai or voyage, got {other}"
                )))
            }
        };

        let cache_enabled = match get("MARKETLINK_CACHE").as_deref() {
            None | Some("sqlite") => true,
            Some("none") => false,
            Some(other) => {
                return Err(DomainError::Config(format!("MARKETLINK_CACHE must be sqlite or none, got {other}")))
            }
        };

        Ok(Self {
            db_path: get("MARKETLINK_DB").unwrap_or_else(|| "./marketlink.db".to_string()),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            kalshi_base_url: get("KALSHI_BASE_URL").unwrap_or_else(|| KALSHI_BASE_URL.to_string()),
            kalshi_api_key: get("KALSHI_API_KEY"),
            kalshi_private_key: get("KALSHI_PRIVATE_KEY"),
            kalshi_key_path: get("KALSHI_KEY_PATH"),
            embedding_backend,
            embedding_api_key: get("MARKETLINK_EMBEDDING_API_KEY").unwrap_or_default(),
            embedding_model: get("MARKETLINK_EMBEDDING_MODEL"),
            embedding_url: get("MARKETLINK_EMBEDDING_URL"),
            reasoning_url: get("REASONING_URL").unwrap_or_else(|| REASONING_URL.to_string()),
            reasoning_model: get("REASONING_MODEL").unwrap_or_else(|| REASONING_MODEL.to_string()),
            reasoning_api_key: get("REASONING_API_KEY").unwrap_or_else(|| "dummy-token".to_string()),
            cache_enabled,
            sync_interval_secs: get("SYNC_INTERVAL_SECS")
                .map(|v| {
                    v.parse::<u64>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| DomainError::Config("SYNC_INTERVAL_SECS must be a positive integer".into()))
                })
                .transpose()?
                .unwrap_or(86_400),
            api_port: get("API_PORT")
                .unwrap_or_else(|| "8081".to_string())
                .parse::<u16>()
                .map_err(|_| DomainError::Config("API_PORT must be a valid port number".to_string()))?,
        })
    }
}
