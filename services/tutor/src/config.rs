//! Application Configuration Module
//!
//! Settings come from the environment (and a `.env` file when present); the
//! API key itself is not read here but by the key store at call start.

use gemini_live::consts::{BASE_URL, DEFAULT_MODEL};
use std::env;
use std::path::PathBuf;
use tracing::Level;

/// Default capacity of the outbound message queue.
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 256;
/// How often the coding mode re-reads the watched source file.
pub const EDITOR_POLL_INTERVAL_MS: u64 = 1000;

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: Level,
    pub model: String,
    pub base_url: String,
    pub key_file: Option<PathBuf>,
    pub outbound_queue_capacity: usize,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    // *   `GEMINI_LIVE_MODEL`: (Optional) Live model name.
    // *   `GEMINI_LIVE_URL`: (Optional) WebSocket base URL.
    // *   `TUTOR_KEY_FILE`: (Optional) JSON file holding `gemini_api_key`.
    // *   `OUTBOUND_QUEUE_CAPACITY`: (Optional) Messages buffered before capture blocks are dropped.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        let model = lookup("GEMINI_LIVE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = lookup("GEMINI_LIVE_URL").unwrap_or_else(|| BASE_URL.to_string());
        let key_file = lookup("TUTOR_KEY_FILE").map(PathBuf::from);

        let outbound_queue_capacity = match lookup("OUTBOUND_QUEUE_CAPACITY") {
            Some(value) => match value.parse::<usize>() {
                Ok(capacity) if capacity > 0 => capacity,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "OUTBOUND_QUEUE_CAPACITY".to_string(),
                        value,
                    });
                }
            },
            None => DEFAULT_OUTBOUND_QUEUE_CAPACITY,
        };

        Ok(Self {
            log_level,
            model,
            base_url,
            key_file,
            outbound_queue_capacity,
        })
    }
}
