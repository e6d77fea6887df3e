use std::path::PathBuf;
use std::sync::OnceLock;

use clap::Parser;
use config::{ConfigLoader, resolve_config_path};
use dispider_client::entities::config::CoreConfig;
use dispider_client::entities::logger::{LogLevel, StdioLogMode};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

const DEFAULT_CONFIG_PATH: &str = "/config/config.toml";

#[derive(Parser, Debug)]
#[command(name = "dispider-core", about = "Dispider control plane core")]
pub struct CliArgs {
  /// Path to a TOML config file. Defaults to `/config/config.toml` if present.
  #[arg(long)]
  pub config_path: Option<PathBuf>,
  /// Print the resolved config on startup.
  #[arg(long)]
  pub config_debug: bool,
}

/// Environment overlay applied on top of the TOML-loaded config.
/// Field names preserve the original system's variable names (§6.1)
/// so an operator's existing `.env` keeps working.
#[derive(Debug, Deserialize)]
struct Env {
  bind_ip: Option<String>,
  port: Option<u16>,

  postgres_host: Option<String>,
  postgres_port: Option<u16>,
  postgres_user: Option<String>,
  postgres_password: Option<String>,
  postgres_db: Option<String>,
  database_url: Option<String>,

  redis_host: Option<String>,
  redis_port: Option<u16>,
  redis_url: Option<String>,

  docker_space: Option<String>,
  docker_space_outer: Option<String>,

  api_base_url: Option<String>,
  proxy_url: Option<String>,
  container_host: Option<String>,

  dispider_task_retry_ceiling: Option<i32>,

  dispider_logging_level: Option<LogLevel>,
  dispider_logging_stdio: Option<StdioLogMode>,
  dispider_logging_pretty: Option<bool>,
  dispider_logging_location: Option<bool>,
  dispider_logging_ansi: Option<bool>,
  dispider_logging_otlp_endpoint: Option<String>,
}

pub fn core_config() -> &'static CoreConfig {
  static CORE_CONFIG: OnceLock<CoreConfig> = OnceLock::new();
  CORE_CONFIG.get_or_init(|| match build_config() {
    Ok(config) => config,
    Err(e) => {
      eprintln!("FATAL: failed to load core config | {e:#}");
      std::process::exit(1)
    }
  })
}

fn build_config() -> anyhow::Result<CoreConfig> {
  dotenvy::dotenv().ok();

  let args = CliArgs::parse();
  let path = resolve_config_path(
    args.config_path.clone(),
    std::path::Path::new(DEFAULT_CONFIG_PATH),
  );
  let config: CoreConfig = ConfigLoader::new(path.as_deref())
    .debug_print(args.config_debug)
    .load()?;

  let env: Env = envy::from_env()?;

  Ok(CoreConfig {
    bind_ip: env.bind_ip.unwrap_or(config.bind_ip),
    port: env.port.unwrap_or(config.port),
    cors_allowed_origins: config.cors_allowed_origins,

    postgres_host: env.postgres_host.unwrap_or(config.postgres_host),
    postgres_port: env.postgres_port.unwrap_or(config.postgres_port),
    postgres_user: env.postgres_user.unwrap_or(config.postgres_user),
    postgres_password: env
      .postgres_password
      .unwrap_or(config.postgres_password),
    postgres_db: env.postgres_db.unwrap_or(config.postgres_db),
    database_url: env.database_url.or(config.database_url),

    redis_host: env.redis_host.unwrap_or(config.redis_host),
    redis_port: env.redis_port.unwrap_or(config.redis_port),
    redis_url: env.redis_url.or(config.redis_url),

    docker_space: env.docker_space.unwrap_or(config.docker_space),
    docker_space_outer: env.docker_space_outer.or(config.docker_space_outer),

    api_base_url: env.api_base_url.unwrap_or(config.api_base_url),
    proxy_url: env.proxy_url.unwrap_or(config.proxy_url),
    container_host: env.container_host.unwrap_or(config.container_host),
    providers_dir: config.providers_dir,
    clash_config_path: config.clash_config_path,

    task_retry_ceiling: env
      .dispider_task_retry_ceiling
      .unwrap_or(config.task_retry_ceiling),

    logging: dispider_client::entities::logger::LogConfig {
      level: env.dispider_logging_level.unwrap_or(config.logging.level),
      stdio: env.dispider_logging_stdio.unwrap_or(config.logging.stdio),
      pretty: env
        .dispider_logging_pretty
        .unwrap_or(config.logging.pretty),
      location: env
        .dispider_logging_location
        .unwrap_or(config.logging.location),
      ansi: env.dispider_logging_ansi.unwrap_or(config.logging.ansi),
      otlp_endpoint: env
        .dispider_logging_otlp_endpoint
        .unwrap_or(config.logging.otlp_endpoint),
      ..config.logging
    },
  })
}

pub fn cors_layer() -> CorsLayer {
  let config = core_config();
  let allowed_origins = if config.cors_allowed_origins.is_empty() {
    vec![axum::http::HeaderValue::from_static("*")]
  } else {
    config
      .cors_allowed_origins
      .iter()
      .filter_map(|origin| axum::http::HeaderValue::from_str(origin).ok())
      .collect()
  };
  CorsLayer::new()
    .allow_origin(allowed_origins)
    .allow_methods(tower_http::cors::Any)
    .allow_headers(tower_http::cors::Any)
}
