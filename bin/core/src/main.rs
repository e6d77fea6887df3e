mod api;
mod config;
mod containers;
mod dispatch;
mod error;
mod helpers;
mod orchestrator;
mod proxy;
mod state;

use std::net::SocketAddr;

use config::core_config;
use orchestrator::Orchestrator;

#[tokio::main]
async fn main() {
  let config = core_config();

  if let Err(e) = logger::init(&config.logging) {
    eprintln!("FATAL: failed to init logger | {e:#}");
    std::process::exit(1);
  }

  state::init_db_client().await;
  // Touch the lazily-initialized collaborators now so a bad Redis or
  // docker socket fails fast on startup rather than on first request.
  state::kv_store();
  state::docker_client();

  let mut orchestrator = Orchestrator::new();
  orchestrator.start().await;

  let addr: SocketAddr = format!("{}:{}", config.bind_ip, config.port)
    .parse()
    .unwrap_or_else(|e| {
      tracing::error!("FATAL: invalid bind address {}:{} | {e:#}", config.bind_ip, config.port);
      std::process::exit(1)
    });

  let listener = match tokio::net::TcpListener::bind(addr).await {
    Ok(listener) => listener,
    Err(e) => {
      tracing::error!("FATAL: failed to bind {addr} | {e:#}");
      std::process::exit(1)
    }
  };

  tracing::info!("dispider core listening on {addr}");

  if let Err(e) = axum::serve(listener, api::app())
    .with_graceful_shutdown(shutdown_signal())
    .await
  {
    tracing::error!("server error | {e:#}");
  }

  orchestrator.stop().await;
}

async fn shutdown_signal() {
  let ctrl_c = async {
    tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
  };

  #[cfg(unix)]
  let terminate = async {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
      .expect("failed to install signal handler")
      .recv()
      .await;
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }

  tracing::info!("shutdown signal received");
}
