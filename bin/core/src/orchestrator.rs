//! Lifecycle-managed startup/shutdown for the proxy manager's two
//! background activities (§4.5, §9). Loops are never started as
//! import-time side effects; `start` is called once from `main` and
//! `stop` is wired to the process shutdown signal.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::proxy::{config, health, reassign};

pub struct Orchestrator {
  token: CancellationToken,
  health_handle: Option<JoinHandle<()>>,
  reassign_handle: Option<JoinHandle<()>>,
}

impl Orchestrator {
  pub fn new() -> Self {
    Self { token: CancellationToken::new(), health_handle: None, reassign_handle: None }
  }

  /// Recovers container-to-group mappings from the on-disk config,
  /// seeds the KV group list if empty, and starts both background
  /// loops. A second call while loops are already running is a no-op.
  /// Individual step failures are logged; startup continues degraded
  /// rather than aborting.
  pub async fn start(&mut self) {
    if self.health_handle.is_some() {
      tracing::warn!("orchestrator start called while already running, ignoring");
      return;
    }

    match config::recover_mappings().await {
      Ok(count) => tracing::info!(count, "recovered proxy container mappings from disk"),
      Err(e) => tracing::error!(error = %e, "failed to recover proxy container mappings"),
    }

    match crate::state::kv_store().lrange_all(crate::proxy::KEY_GROUPS_LIST).await {
      Ok(groups) if groups.is_empty() => match config::refresh().await {
        Ok(()) => tracing::info!("seeded empty proxy group list via full config refresh"),
        Err(e) => tracing::error!(error = %e, "failed to seed proxy group list"),
      },
      Ok(_) => {}
      Err(e) => tracing::error!(error = %e, "failed to read proxy group list at startup"),
    }

    let health_token = self.token.clone();
    self.health_handle = Some(tokio::spawn(health::run(health_token)));

    let reassign_token = self.token.clone();
    self.reassign_handle = Some(tokio::spawn(reassign::run(reassign_token)));
  }

  /// Cancels both loops and awaits their completion, bounded so a
  /// stuck loop can't hang shutdown forever.
  pub async fn stop(&mut self) {
    self.token.cancel();
    const SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

    for handle in [self.health_handle.take(), self.reassign_handle.take()].into_iter().flatten() {
      if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await.is_err() {
        tracing::warn!("background loop did not shut down within timeout");
      }
    }
  }
}

impl Default for Orchestrator {
  fn default() -> Self {
    Self::new()
  }
}
