//! Config merge and group regeneration (§4.4.1): reloads the provider
//! inventory, regenerates url-test groups, sweeps stale rules, writes
//! the file back and restarts the multiplexer so it picks up the
//! change. Always runs under `state::mux_config_lock`.

use dispider_client::error::{DispiderResult, ErrorKind, WithErrorKind};
use muxconfig::ClashConfig;

use crate::config::core_config;
use crate::state::{docker_client, kv_store, mux_config_lock};

use super::{clash_config_path, providers_dir};

/// Reloads provider files, regenerates `proxies`/`proxy-groups`, sweeps
/// `rules`, writes the file and restarts the multiplexer container.
/// Publishes the resulting group name list to the KV store.
pub async fn refresh() -> DispiderResult<()> {
  let _guard = mux_config_lock().lock().await;
  refresh_locked().await
}

/// Same as [`refresh`] but assumes the caller already holds
/// `mux_config_lock` -- used by assign/release so the whole
/// read-modify-write-restart sequence for a rule splice and a full
/// regeneration never interleave.
pub(crate) async fn refresh_locked() -> DispiderResult<()> {
  let path = clash_config_path();
  let mut config = muxconfig::load(&path).kind(ErrorKind::Internal)?;
  muxconfig::regenerate(&mut config, &providers_dir()).kind(ErrorKind::Internal)?;
  write_and_reload(&config).await?;

  let group_names: Vec<String> =
    config.proxy_groups.iter().map(|g| g.name.clone()).collect();
  kv_store()
    .replace_list(super::KEY_GROUPS_LIST, &group_names)
    .await
    .kind(ErrorKind::Internal)?;
  Ok(())
}

/// Writes `config` to disk and restarts the multiplexer container so
/// it reloads it. Callers must already hold `mux_config_lock`.
pub(crate) async fn write_and_reload(config: &ClashConfig) -> DispiderResult<()> {
  muxconfig::save(&clash_config_path(), config).kind(ErrorKind::Internal)?;
  docker_client()
    .restart_by_name(&core_config().container_host)
    .await
    .kind(ErrorKind::ServiceUnavailable)?;
  Ok(())
}

pub(crate) async fn load_locked() -> DispiderResult<ClashConfig> {
  muxconfig::load(&clash_config_path()).kind(ErrorKind::Internal)
}

/// Repopulates `container_proxy_rules` from the on-disk config's
/// `SRC-IP-CIDR,<ip>/32,<group>` rules (§4.4.5). Run at startup, before
/// the health loop, so a KV-store restart doesn't lose assignments
/// the multiplexer config already encodes.
pub async fn recover_mappings() -> DispiderResult<usize> {
  let _guard = mux_config_lock().lock().await;
  let config = load_locked().await?;
  let mut recovered = 0;
  for rule in &config.rules {
    if let Some(parsed) = dispider_client::entities::proxy::ContainerProxyRule::parse(rule) {
      kv_store()
        .hset(super::KEY_CONTAINER_RULES, &parsed.container_ip, rule)
        .await
        .kind(ErrorKind::Internal)?;
      recovered += 1;
    }
  }
  Ok(recovered)
}

#[cfg(test)]
mod tests {
  // Pure merge/partition/sweep logic is exercised in `muxconfig`; this
  // module is pure wiring over the KV store, filesystem and runtime.
}
