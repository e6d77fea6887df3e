use std::sync::OnceLock;

use tokio::sync::Mutex;

use crate::config::core_config;

static DB_CLIENT: OnceLock<database::Client> = OnceLock::new();

pub fn db_client() -> &'static database::Client {
  DB_CLIENT.get().unwrap_or_else(|| {
    tracing::error!(
      "FATAL: db_client accessed before initialized | ensure init() ran during startup"
    );
    std::process::exit(1)
  })
}

pub async fn init_db_client() {
  match database::Client::new(&core_config().database_url()).await {
    Ok(client) => {
      if DB_CLIENT.set(client).is_err() {
        tracing::error!("db_client initialized more than once");
      }
    }
    Err(e) => {
      tracing::error!("FATAL: failed to initialize database client | {e:#}");
      std::process::exit(1)
    }
  }
}

pub fn kv_store() -> &'static kvstore::KvStore {
  static KV_STORE: OnceLock<kvstore::KvStore> = OnceLock::new();
  KV_STORE.get_or_init(|| match kvstore::KvStore::new(&core_config().redis_url()) {
    Ok(store) => store,
    Err(e) => {
      tracing::error!("FATAL: failed to initialize kv store client | {e:#}");
      std::process::exit(1)
    }
  })
}

pub fn docker_client() -> &'static runtime::DockerClient {
  static DOCKER_CLIENT: OnceLock<runtime::DockerClient> = OnceLock::new();
  DOCKER_CLIENT.get_or_init(|| match runtime::DockerClient::connect() {
    Ok(client) => client,
    Err(e) => {
      tracing::error!("FATAL: failed to connect to container runtime | {e:#}");
      std::process::exit(1)
    }
  })
}

pub fn http_client() -> &'static reqwest::Client {
  static HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
  HTTP_CLIENT.get_or_init(reqwest::Client::new)
}

/// Serializes the read -> modify -> write -> restart sequence against
/// the multiplexer's on-disk config, per §5's ordering guarantee. Held
/// across the whole sequence, not just the file write.
pub fn mux_config_lock() -> &'static Mutex<()> {
  static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
  LOCK.get_or_init(|| Mutex::new(()))
}
