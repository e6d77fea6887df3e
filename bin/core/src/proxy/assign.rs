//! Assignment, release and force-reassignment of a container's proxy
//! group (§4.4.3). The whole read-modify-write-restart sequence for
//! each operation runs under `state::mux_config_lock`, held for the
//! full sequence rather than just the file write.

use std::collections::HashMap;

use dispider_client::entities::proxy::ContainerProxyRule;
use dispider_client::error::{DispiderError, DispiderResult, ErrorKind, WithErrorKind};

use crate::state::{kv_store, mux_config_lock};

use super::config::{load_locked, write_and_reload};
use super::{KEY_BLACKLIST, KEY_CONTAINER_RULES, KEY_FAILURE_COUNT, KEY_GROUPS_LIST, KEY_RR_INDEX, now_secs};

/// Groups minus those currently blacklisted; sweeps expired blacklist
/// entries from the KV store as a side effect of the read.
async fn healthy_groups() -> anyhow::Result<Vec<String>> {
  let all = kv_store().lrange_all(KEY_GROUPS_LIST).await?;
  let blacklist: HashMap<String, String> = kv_store().hgetall(KEY_BLACKLIST).await?.into_iter().collect();
  let now = now_secs();

  let mut healthy = Vec::with_capacity(all.len());
  for group in all {
    match blacklist.get(&group) {
      Some(until) => {
        let until: i64 = until.parse().unwrap_or(0);
        if until <= now {
          kv_store().hdel(KEY_BLACKLIST, &group).await.ok();
          healthy.push(group);
        }
      }
      None => healthy.push(group),
    }
  }
  Ok(healthy)
}

/// Group with the smallest recorded failure count among `all`, ties
/// broken by first occurrence. `None` if `all` is empty.
async fn least_failing_group(all: &[String]) -> anyhow::Result<Option<String>> {
  let counts: HashMap<String, String> = kv_store().hgetall(KEY_FAILURE_COUNT).await?.into_iter().collect();
  Ok(
    all
      .iter()
      .map(|g| {
        let count: u32 = counts.get(g).and_then(|v| v.parse().ok()).unwrap_or(0);
        (g.clone(), count)
      })
      .min_by_key(|(_, count)| *count)
      .map(|(g, _)| g),
  )
}

/// Maps a monotonic counter value onto a slot in a list of `len`
/// groups, wrapping around. `len` is assumed nonzero.
fn rr_slot(index: i64, len: usize) -> usize {
  ((index - 1).rem_euclid(len as i64)) as usize
}

async fn choose_group() -> anyhow::Result<Option<String>> {
  let healthy = healthy_groups().await?;
  if !healthy.is_empty() {
    let index = kv_store().incr(KEY_RR_INDEX).await?;
    let chosen = &healthy[rr_slot(index, healthy.len())];
    return Ok(Some(chosen.clone()));
  }
  let all = kv_store().lrange_all(KEY_GROUPS_LIST).await?;
  if all.is_empty() {
    return Ok(None);
  }
  tracing::warn!("all proxy groups blacklisted, falling back to least-failing group");
  least_failing_group(&all).await
}

/// Splices `SRC-IP-CIDR,<container_ip>/32,<group>` into the on-disk
/// config, restarts the multiplexer, and records the mapping. Caller
/// must already hold `mux_config_lock`.
async fn splice_in(container_ip: &str, group: &str) -> DispiderResult<()> {
  let rule = ContainerProxyRule { container_ip: container_ip.to_string(), group: group.to_string() };
  let mut config = load_locked().await?;
  config.rules.insert(0, rule.rule_string());
  write_and_reload(&config).await?;
  kv_store()
    .hset(KEY_CONTAINER_RULES, container_ip, &rule.rule_string())
    .await
    .kind(ErrorKind::Internal)
}

/// Picks a group for `container_ip` via round-robin over the healthy
/// list (falling back to the least-failing group when all are
/// blacklisted), splices a routing rule into the on-disk config and
/// restarts the multiplexer, then records the mapping.
pub async fn assign(container_ip: &str) -> DispiderResult<String> {
  let _guard = mux_config_lock().lock().await;

  let group = choose_group()
    .await
    .kind(ErrorKind::Internal)?
    .ok_or_else(|| {
      DispiderError::new(ErrorKind::ServiceUnavailable, anyhow::anyhow!("no proxy groups available"))
    })?;

  splice_in(container_ip, &group).await?;
  Ok(group)
}

/// Removes `container_ip`'s assignment. Always succeeds from the
/// caller's perspective: a file-manipulation failure is logged but the
/// KV mapping is still cleared.
pub async fn release(container_ip: &str) -> DispiderResult<()> {
  let _guard = mux_config_lock().lock().await;
  release_locked(container_ip).await;
  Ok(())
}

async fn release_locked(container_ip: &str) {
  let Ok(Some(rule_string)) = kv_store().hget(KEY_CONTAINER_RULES, container_ip).await else {
    return;
  };

  match load_locked().await {
    Ok(mut config) => {
      if let Some(pos) = config.rules.iter().position(|r| r == &rule_string) {
        config.rules.remove(pos);
        if let Err(e) = write_and_reload(&config).await {
          tracing::warn!(container_ip, error = %e, "failed to rewrite config while releasing proxy rule");
        }
      }
    }
    Err(e) => tracing::warn!(container_ip, error = %e, "failed to load config while releasing proxy rule"),
  }

  if let Err(e) = kv_store().hdel(KEY_CONTAINER_RULES, container_ip).await {
    tracing::warn!(container_ip, error = %e, "failed to clear proxy rule mapping");
  }
}

/// Releases then reassigns `container_ip`, returning the before/after
/// group names.
pub async fn force_reassign(container_ip: &str) -> DispiderResult<(Option<String>, String)> {
  let _guard = mux_config_lock().lock().await;
  let before = current_group(container_ip).await.kind(ErrorKind::Internal)?;
  release_locked(container_ip).await;

  let group = choose_group()
    .await
    .kind(ErrorKind::Internal)?
    .ok_or_else(|| {
      DispiderError::new(ErrorKind::ServiceUnavailable, anyhow::anyhow!("no proxy groups available"))
    })?;
  splice_in(container_ip, &group).await?;

  Ok((before, group))
}

pub(crate) async fn current_group(container_ip: &str) -> anyhow::Result<Option<String>> {
  let rule_string = kv_store().hget(KEY_CONTAINER_RULES, container_ip).await?;
  Ok(rule_string.and_then(|s| ContainerProxyRule::parse(&s)).map(|r| r.group))
}

/// Clears the blacklist entry for `group`, or every entry if `group`
/// is `None`. Returns the group names that were cleared.
pub async fn clear_blacklist(group: Option<&str>) -> DispiderResult<Vec<String>> {
  match group {
    Some(group) => {
      kv_store().hdel(KEY_BLACKLIST, group).await.kind(ErrorKind::Internal)?;
      Ok(vec![group.to_string()])
    }
    None => {
      let all = kv_store().hgetall(KEY_BLACKLIST).await.kind(ErrorKind::Internal)?;
      for (group, _) in &all {
        kv_store().hdel(KEY_BLACKLIST, group).await.kind(ErrorKind::Internal)?;
      }
      Ok(all.into_iter().map(|(group, _)| group).collect())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::rr_slot;

  #[test]
  fn rr_slot_wraps_around_three_groups() {
    assert_eq!(rr_slot(11, 3), 1);
    assert_eq!(rr_slot(12, 3), 2);
    assert_eq!(rr_slot(13, 3), 0);
  }

  #[test]
  fn rr_slot_single_group_always_zero() {
    assert_eq!(rr_slot(1, 1), 0);
    assert_eq!(rr_slot(42, 1), 0);
  }
}
