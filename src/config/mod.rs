pub mod log_level;

use std::path::Path;

use figment::providers::{Format, Yaml};
use figment::{Figment, providers::Env};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::config::log_level::LogLevel;

pub const DEFAULT_RECEIVER_ENDPOINT: &str = "0.0.0.0:8126";
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;
const DEFAULT_TRACE_CHANNEL_BUFFER_SIZE: usize = 10;

#[derive(Debug, PartialEq, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub log_level: LogLevel,
    /// Address the trace receiver listens on, `host:port`
    #[serde(deserialize_with = "deserialize_string_or_int")]
    pub receiver_endpoint: Option<String>,
    /// Read timeout for a request body, in seconds
    pub receiver_read_timeout: u64,
    pub max_request_content_length: usize,
    pub trace_channel_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: LogLevel::default(),
            receiver_endpoint: Some(DEFAULT_RECEIVER_ENDPOINT.to_string()),
            receiver_read_timeout: DEFAULT_READ_TIMEOUT_SECS,
            max_request_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            trace_channel_buffer_size: DEFAULT_TRACE_CHANNEL_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    ParseError(String),
}

pub fn get_config(config_directory: &Path) -> Result<Config, ConfigError> {
    let path = config_directory.join("datadog.yaml");

    let figment = Figment::new()
        .merge(Yaml::file(&path))
        .merge(Env::prefixed("DATADOG_"))
        .merge(Env::prefixed("DD_"));

    let mut config: Config = figment
        .extract()
        .map_err(|err| ConfigError::ParseError(err.to_string()))?;

    if config.receiver_read_timeout == 0 {
        config.receiver_read_timeout = DEFAULT_READ_TIMEOUT_SECS;
    }
    if config.trace_channel_buffer_size == 0 {
        config.trace_channel_buffer_size = DEFAULT_TRACE_CHANNEL_BUFFER_SIZE;
    }

    Ok(config)
}

fn deserialize_string_or_int<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                Ok(Some(s))
            }
        }
        Value::Number(n) => Ok(Some(n.to_string())),
        _ => Err(serde::de::Error::custom("expected a string or an integer")),
    }
}
