use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
  Error,
  Warn,
  #[default]
  Info,
  Debug,
  Trace,
}

impl From<LogLevel> for tracing::Level {
  fn from(level: LogLevel) -> Self {
    match level {
      LogLevel::Error => tracing::Level::ERROR,
      LogLevel::Warn => tracing::Level::WARN,
      LogLevel::Info => tracing::Level::INFO,
      LogLevel::Debug => tracing::Level::DEBUG,
      LogLevel::Trace => tracing::Level::TRACE,
    }
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StdioLogMode {
  #[default]
  Standard,
  Json,
  None,
}

/// Logging configuration, assembled by `lib/config` from environment
/// variables and handed to `lib/logger::init` once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
  pub level: LogLevel,
  pub stdio: StdioLogMode,
  pub pretty: bool,
  pub location: bool,
  pub ansi: bool,
  pub otlp_endpoint: String,
  pub opentelemetry_service_name: String,
  pub opentelemetry_scope_name: String,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: LogLevel::default(),
      stdio: StdioLogMode::default(),
      pretty: false,
      location: false,
      ansi: true,
      otlp_endpoint: String::new(),
      opentelemetry_service_name: "dispider_core".to_string(),
      opentelemetry_scope_name: "dispider_core".to_string(),
    }
  }
}
