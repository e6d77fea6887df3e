use serde::{Deserialize, Serialize};

use super::logger::LogConfig;

fn default_bind_ip() -> String {
  "0.0.0.0".to_string()
}

fn default_port() -> u16 {
  9120
}

fn default_postgres_host() -> String {
  "postgres".to_string()
}

fn default_postgres_port() -> u16 {
  5432
}

fn default_postgres_db() -> String {
  "dispider".to_string()
}

fn default_postgres_user() -> String {
  "dispider".to_string()
}

fn default_redis_host() -> String {
  "redis".to_string()
}

fn default_redis_port() -> u16 {
  6379
}

fn default_docker_space() -> String {
  "/dispider".to_string()
}

fn default_proxy_url() -> String {
  "http://clash:9090".to_string()
}

fn default_container_host() -> String {
  "clash".to_string()
}

fn default_providers_dir() -> String {
  "clash/providers".to_string()
}

fn default_clash_config_path() -> String {
  "clash/config.yml".to_string()
}

fn default_task_retry_ceiling() -> i32 {
  3
}

fn default_cors_allowed_origins() -> Vec<String> {
  Vec::new()
}

/// The core's full runtime configuration, assembled by `lib/config`'s
/// loader (compiled-in defaults -> optional TOML file -> environment).
/// Preserves the original system's environment variable names so an
/// operator's existing `.env` keeps working (§6.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
  #[serde(default = "default_bind_ip")]
  pub bind_ip: String,
  #[serde(default = "default_port")]
  pub port: u16,
  #[serde(default, rename = "cors-allowed-origins")]
  pub cors_allowed_origins: Vec<String>,

  #[serde(default = "default_postgres_host")]
  pub postgres_host: String,
  #[serde(default = "default_postgres_port")]
  pub postgres_port: u16,
  #[serde(default = "default_postgres_user")]
  pub postgres_user: String,
  #[serde(default)]
  pub postgres_password: String,
  #[serde(default = "default_postgres_db")]
  pub postgres_db: String,
  /// Overrides the composed `postgres_*` fields entirely when set.
  #[serde(default)]
  pub database_url: Option<String>,

  #[serde(default = "default_redis_host")]
  pub redis_host: String,
  #[serde(default = "default_redis_port")]
  pub redis_port: u16,
  /// Overrides the composed `redis_host`/`redis_port` when set.
  #[serde(default)]
  pub redis_url: Option<String>,

  /// Workspace root as seen by `bin/core` itself.
  #[serde(default = "default_docker_space")]
  pub docker_space: String,
  /// The same path as seen by the container runtime's host (used to
  /// translate volume mounts when core runs inside its own container).
  #[serde(default)]
  pub docker_space_outer: Option<String>,

  /// Injected into worker containers as `API_BASE_URL`.
  #[serde(default)]
  pub api_base_url: String,
  /// Base URL of the proxy multiplexer's admin API.
  #[serde(default = "default_proxy_url")]
  pub proxy_url: String,
  /// The multiplexer's own container name, for restart-to-reload.
  #[serde(default = "default_container_host")]
  pub container_host: String,
  #[serde(default = "default_providers_dir")]
  pub providers_dir: String,
  #[serde(default = "default_clash_config_path")]
  pub clash_config_path: String,

  #[serde(default = "default_task_retry_ceiling")]
  pub task_retry_ceiling: i32,

  #[serde(default)]
  pub logging: LogConfig,
}

impl Default for CoreConfig {
  fn default() -> Self {
    Self {
      bind_ip: default_bind_ip(),
      port: default_port(),
      cors_allowed_origins: default_cors_allowed_origins(),
      postgres_host: default_postgres_host(),
      postgres_port: default_postgres_port(),
      postgres_user: default_postgres_user(),
      postgres_password: String::new(),
      postgres_db: default_postgres_db(),
      database_url: None,
      redis_host: default_redis_host(),
      redis_port: default_redis_port(),
      redis_url: None,
      docker_space: default_docker_space(),
      docker_space_outer: None,
      api_base_url: String::new(),
      proxy_url: default_proxy_url(),
      container_host: default_container_host(),
      providers_dir: default_providers_dir(),
      clash_config_path: default_clash_config_path(),
      task_retry_ceiling: default_task_retry_ceiling(),
      logging: LogConfig::default(),
    }
  }
}

impl CoreConfig {
  pub fn database_url(&self) -> String {
    if let Some(url) = &self.database_url {
      return url.clone();
    }
    format!(
      "postgres://{}:{}@{}:{}/{}",
      self.postgres_user,
      self.postgres_password,
      self.postgres_host,
      self.postgres_port,
      self.postgres_db,
    )
  }

  pub fn redis_url(&self) -> String {
    if let Some(url) = &self.redis_url {
      return url.clone();
    }
    format!("redis://{}:{}", self.redis_host, self.redis_port)
  }

  /// Host-side path for volume mounts, falling back to `docker_space`
  /// when core isn't itself running inside a container.
  pub fn docker_space_outer(&self) -> &str {
    self.docker_space_outer.as_deref().unwrap_or(&self.docker_space)
  }
}
