//! Reassignment loop (§4.4.4): every 120s, moves any container whose
//! assigned group has since been blacklisted onto a healthy one.
//! Does not bound how many containers it moves per tick -- preserving
//! the original's scaling limitation rather than silently fixing it
//! (see open questions).

use std::collections::HashMap;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::state::kv_store;

use super::assign::force_reassign;
use super::{KEY_BLACKLIST, KEY_CONTAINER_RULES, now_secs};

const TICK_PERIOD_SECS: u64 = 120;
const ERROR_BACKOFF_SECS: u64 = 60;

async fn run_tick() -> anyhow::Result<()> {
  let assignments: HashMap<String, String> =
    kv_store().hgetall(KEY_CONTAINER_RULES).await?.into_iter().collect();
  let blacklist: HashMap<String, String> =
    kv_store().hgetall(KEY_BLACKLIST).await?.into_iter().collect();
  let now = now_secs();

  for (container_ip, rule_string) in assignments {
    let Some(rule) = dispider_client::entities::proxy::ContainerProxyRule::parse(&rule_string)
    else {
      continue;
    };
    let Some(until) = blacklist.get(&rule.group) else { continue };
    let until: i64 = until.parse().unwrap_or(0);
    if until <= now {
      continue;
    }

    match force_reassign(&container_ip).await {
      Ok((before, after)) => {
        tracing::info!(
          container_ip,
          from = ?before,
          to = %after,
          "reassigned container off blacklisted proxy group"
        );
      }
      Err(e) => {
        tracing::error!(container_ip, error = %e, "failed to reassign container off blacklisted group");
      }
    }
  }

  Ok(())
}

pub async fn run(token: CancellationToken) {
  loop {
    tokio::select! {
      _ = token.cancelled() => return,
      result = run_tick() => {
        if let Err(e) = result {
          tracing::error!(error = %e, "reassignment tick failed");
          tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(Duration::from_secs(ERROR_BACKOFF_SECS)) => {}
          }
          continue;
        }
      }
    }
    tokio::select! {
      _ = token.cancelled() => return,
      _ = tokio::time::sleep(Duration::from_secs(TICK_PERIOD_SECS)) => {}
    }
  }
}

#[cfg(test)]
mod tests {
  // Requires a live KV store and multiplexer; covered at the
  // `assign`/`muxconfig` layer for the pure pieces.
}
