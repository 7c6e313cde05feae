//! Log settings read from the environment.

use std::{fmt, path::PathBuf, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level {other:?}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub is_production: bool,
    pub level: LogLevel,
    pub dir: PathBuf,
}

impl LogSettings {
    /// `ENVIRONMENT`, `LOG_LEVEL` (info in production, debug otherwise), `LOG_DIR`.
    pub fn from_env() -> Self {
        let is_production = std::env::var("ENVIRONMENT").is_ok_and(|env| env == "production");
        let default_level = if is_production {
            LogLevel::Info
        } else {
            LogLevel::Debug
        };

        Self {
            is_production,
            level: std::env::var("LOG_LEVEL")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(default_level),
            dir: std::env::var("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("logs")),
        }
    }

    /// Fallback `EnvFilter` directive when `RUST_LOG` is not set.
    pub fn filter_directive(&self) -> String {
        format!(
            "furry_gallery_backend={},tower_http={},axum={},sqlx=warn",
            self.level, self.level, self.level
        )
    }
}
