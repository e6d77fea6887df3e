//! Health check loop (§4.4.2): every 60s, probes each known group's
//! delay through the multiplexer's admin API with bounded concurrency,
//! records health/failure-count/blacklist state in the KV store.

use std::time::Duration;

use dispider_client::entities::proxy::{
  FAILURE_BLACKLIST_THRESHOLD, HEALTHY_DELAY_THRESHOLD_MS, HEALTH_CHECK_CONCURRENCY,
  HEALTH_PROBE_TIMEOUT_SECS, ProxyGroupHealth, PROXY_PROBE_URL,
};
use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::config::core_config;
use crate::state::kv_store;

use super::{KEY_BLACKLIST, KEY_FAILURE_COUNT, KEY_GROUPS_LIST, KEY_HEALTH, KEY_LAST_CHECK, now_secs};

const TICK_PERIOD_SECS: u64 = 60;
const ERROR_BACKOFF_SECS: u64 = 30;

#[derive(Deserialize)]
struct DelayResponse {
  delay: u64,
}

fn percent_encode(raw: &str) -> String {
  url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

async fn probe_delay(client: &reqwest::Client, base_url: &str, group: &str) -> Option<u64> {
  let url = format!(
    "{base_url}/proxies/{}/delay?timeout={}&url={}",
    percent_encode(group),
    HEALTH_PROBE_TIMEOUT_SECS * 1000,
    percent_encode(PROXY_PROBE_URL),
  );
  let response = client
    .get(&url)
    .timeout(Duration::from_secs(HEALTH_PROBE_TIMEOUT_SECS))
    .send()
    .await
    .ok()?
    .error_for_status()
    .ok()?;
  response.json::<DelayResponse>().await.ok().map(|d| d.delay)
}

async fn run_tick(http: &reqwest::Client) -> anyhow::Result<()> {
  let groups = kv_store().lrange_all(KEY_GROUPS_LIST).await?;
  let base_url = core_config().proxy_url.clone();

  stream::iter(groups)
    .for_each_concurrent(HEALTH_CHECK_CONCURRENCY, |group| {
      let http = http.clone();
      let base_url = base_url.clone();
      async move {
        let delay = probe_delay(&http, &base_url, &group).await;
        let healthy = matches!(delay, Some(ms) if ms < HEALTHY_DELAY_THRESHOLD_MS);
        let ts = now_secs();

        let health = ProxyGroupHealth {
          healthy,
          response_time_ms: delay.unwrap_or(0),
          last_check_ts: ts,
        };
        if let Err(e) = kv_store().hset(KEY_HEALTH, &group, &health.encode()).await {
          tracing::error!(group = %group, error = %e, "failed to record group health");
        }
        if let Err(e) = kv_store()
          .hset(KEY_LAST_CHECK, &group, &ts.to_string())
          .await
        {
          tracing::error!(group = %group, error = %e, "failed to record last check time");
        }

        if healthy {
          kv_store().hdel(KEY_FAILURE_COUNT, &group).await.ok();
          kv_store().hdel(KEY_BLACKLIST, &group).await.ok();
        } else {
          match bump_failure_count(&group).await {
            Ok(count) if count > FAILURE_BLACKLIST_THRESHOLD => {
              let until = ts + dispider_client::entities::proxy::BLACKLIST_DURATION_SECS;
              if let Err(e) = kv_store()
                .hset(KEY_BLACKLIST, &group, &until.to_string())
                .await
              {
                tracing::error!(group = %group, error = %e, "failed to blacklist group");
              }
            }
            Ok(_) => {}
            Err(e) => tracing::error!(group = %group, error = %e, "failed to bump failure count"),
          }
        }
      }
    })
    .await;

  Ok(())
}

async fn bump_failure_count(group: &str) -> anyhow::Result<u32> {
  let current: u32 = kv_store()
    .hget(KEY_FAILURE_COUNT, group)
    .await?
    .and_then(|v| v.parse().ok())
    .unwrap_or(0);
  let next = current + 1;
  kv_store().hset(KEY_FAILURE_COUNT, group, &next.to_string()).await?;
  Ok(next)
}

/// Runs until `token` is cancelled. Errors inside a tick are logged;
/// the loop backs off `ERROR_BACKOFF_SECS` before the next attempt
/// instead of dying.
pub async fn run(token: CancellationToken) {
  let http = reqwest::Client::new();
  loop {
    tokio::select! {
      _ = token.cancelled() => return,
      result = run_tick(&http) => {
        if let Err(e) = result {
          tracing::error!(error = %e, "health check tick failed");
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
  use super::percent_encode;

  #[test]
  fn percent_encode_escapes_brackets_and_spaces() {
    assert_eq!(percent_encode("[Auto] JP-01"), "%5BAuto%5D+JP-01");
  }

  #[test]
  fn percent_encode_leaves_plain_url_alone() {
    assert_eq!(percent_encode("http://example.com"), "http%3A%2F%2Fexample.com");
  }

  // The tick body depends on a live multiplexer and KV store; the
  // encode/decode roundtrip of `ProxyGroupHealth` is tested alongside
  // its definition in `dispider_client::entities::proxy`.
}
