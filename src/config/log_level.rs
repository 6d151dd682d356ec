use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::error;

/// Verbosity of the receiver's own logs. Unknown values fall back to `Warn`
/// instead of failing the whole configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    /// `EnvFilter` directive enabling this level and everything above it.
    #[must_use]
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("warning") {
            return Ok(LogLevel::Warn);
        }
        LogLevel::ALL
            .into_iter()
            .find(|level| s.eq_ignore_ascii_case(level.as_directive()))
            .ok_or_else(|| {
                format!("unknown log level '{s}', expected one of error, warn, info, debug, trace")
            })
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level = match Value::deserialize(deserializer)? {
            Value::String(s) => s.parse().unwrap_or_else(|e| {
                error!("{e}, using warn");
                LogLevel::Warn
            }),
            other => {
                error!("log level must be a string, got {other}, using warn");
                LogLevel::Warn
            }
        };
        Ok(level)
    }
}
