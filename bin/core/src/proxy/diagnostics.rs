//! Read-only diagnostics (§4.4.6): group health listing, container
//! mapping listing, a system-wide health summary, and a probe of the
//! multiplexer's own `/version`, `/configs`, `/proxies` endpoints.

use std::collections::HashMap;

use dispider_client::entities::proxy::{
  ClashStatusReport, DiagnoseReport, ProxyGroupHealth, ProxyGroupStatus, ProxySystemSummary,
  SystemHealthLevel, SystemSummaryOnly,
};
use dispider_client::error::{DispiderResult, ErrorKind, WithErrorKind};
use serde::Deserialize;

use crate::config::core_config;
use crate::state::kv_store;

use super::{KEY_BLACKLIST, KEY_CONTAINER_RULES, KEY_FAILURE_COUNT, KEY_GROUPS_LIST, KEY_HEALTH, KEY_LAST_CHECK, now_secs};

pub async fn groups_health() -> DispiderResult<ProxySystemSummary> {
  let groups = kv_store().lrange_all(KEY_GROUPS_LIST).await.kind(ErrorKind::Internal)?;
  let health: HashMap<String, String> = kv_store().hgetall(KEY_HEALTH).await.kind(ErrorKind::Internal)?.into_iter().collect();
  let failures: HashMap<String, String> = kv_store().hgetall(KEY_FAILURE_COUNT).await.kind(ErrorKind::Internal)?.into_iter().collect();
  let blacklist: HashMap<String, String> = kv_store().hgetall(KEY_BLACKLIST).await.kind(ErrorKind::Internal)?.into_iter().collect();
  let last_check: HashMap<String, String> = kv_store().hgetall(KEY_LAST_CHECK).await.kind(ErrorKind::Internal)?.into_iter().collect();
  let now = now_secs();

  let mut statuses = Vec::with_capacity(groups.len());
  let mut healthy_count = 0;
  for name in &groups {
    let parsed = health.get(name).and_then(|raw| ProxyGroupHealth::decode(raw));
    let is_healthy = parsed.map(|h| h.healthy).unwrap_or(false);
    if is_healthy {
      healthy_count += 1;
    }
    let blacklist_until = blacklist.get(name).and_then(|v| v.parse::<i64>().ok());
    statuses.push(ProxyGroupStatus {
      name: name.clone(),
      is_healthy,
      response_seconds: parsed.map(|h| h.response_time_ms as f64 / 1000.0).unwrap_or(0.0),
      failure_count: failures.get(name).and_then(|v| v.parse().ok()).unwrap_or(0),
      is_blacklisted: blacklist_until.is_some_and(|until| until > now),
      last_check_ts: last_check.get(name).and_then(|v| v.parse().ok()),
      blacklist_until,
    });
  }

  Ok(ProxySystemSummary {
    level: SystemHealthLevel::from_ratio(healthy_count, groups.len()),
    healthy_count,
    total_count: groups.len(),
    groups: statuses,
  })
}

/// Overall health counts only, without the per-group breakdown
/// `groups_health` returns.
pub async fn system_summary() -> DispiderResult<SystemSummaryOnly> {
  Ok(SystemSummaryOnly::from(&groups_health().await?))
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ContainerMapping {
  pub container_ip: String,
  pub assigned_group: String,
  pub rule: String,
}

pub async fn container_mappings() -> DispiderResult<Vec<ContainerMapping>> {
  let raw = kv_store().hgetall(KEY_CONTAINER_RULES).await.kind(ErrorKind::Internal)?;
  Ok(
    raw
      .into_iter()
      .filter_map(|(ip, rule_string)| {
        let rule = dispider_client::entities::proxy::ContainerProxyRule::parse(&rule_string)?;
        Some(ContainerMapping { container_ip: ip, assigned_group: rule.group, rule: rule_string })
      })
      .collect(),
  )
}

#[derive(Deserialize)]
struct VersionResponse {
  version: Option<String>,
}

#[derive(Deserialize)]
struct ProxiesResponse {
  #[serde(default)]
  proxies: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct ConfigsResponse {
  mode: Option<String>,
  #[serde(rename = "external-controller")]
  external_controller: Option<String>,
  #[serde(rename = "log-level")]
  log_level: Option<String>,
}

pub async fn clash_status() -> ClashStatusReport {
  let http = reqwest::Client::new();
  let base_url = &core_config().proxy_url;

  let version = http
    .get(format!("{base_url}/version"))
    .send()
    .await
    .ok()
    .and_then(|r| r.error_for_status().ok());
  let version = match version {
    Some(r) => r.json::<VersionResponse>().await.ok().and_then(|v| v.version),
    None => None,
  };

  let proxies = http.get(format!("{base_url}/proxies")).send().await.ok();
  let (reachable, proxy_count) = match proxies {
    Some(r) if r.status().is_success() => {
      let parsed = r.json::<ProxiesResponse>().await.ok();
      (true, parsed.map(|p| p.proxies.len()).unwrap_or(0))
    }
    Some(_) => (false, 0),
    None => (false, 0),
  };

  let configs = http
    .get(format!("{base_url}/configs"))
    .send()
    .await
    .ok()
    .and_then(|r| r.error_for_status().ok());
  let configs = match configs {
    Some(r) => r.json::<ConfigsResponse>().await.ok(),
    None => None,
  };
  let (mode, external_controller, log_level) = match configs {
    Some(c) => (c.mode, c.external_controller, c.log_level),
    None => (None, None, None),
  };

  let group_count = kv_store().lrange_all(KEY_GROUPS_LIST).await.map(|g| g.len()).unwrap_or(0);

  ClashStatusReport { version, proxy_count, group_count, reachable, mode, external_controller, log_level }
}

pub async fn diagnose() -> DiagnoseReport {
  let status = clash_status().await;
  let mut issues = Vec::new();
  let mut recommendations = Vec::new();

  if !status.reachable {
    issues.push("multiplexer admin API is unreachable".to_string());
    recommendations.push("check that the multiplexer container is running and CONTAINER_HOST/PROXY_URL are correct".to_string());
  }
  if status.group_count == 0 {
    issues.push("no proxy groups are registered".to_string());
    recommendations.push("upload provider files and refresh the proxy config".to_string());
  }
  if status.proxy_count == 0 && status.reachable {
    issues.push("multiplexer reports zero proxies".to_string());
    recommendations.push("verify provider files contain valid proxy nodes".to_string());
  }
  if status.reachable && status.mode.as_deref().is_some_and(|m| !m.eq_ignore_ascii_case("rule")) {
    issues.push(format!("multiplexer is not in rule mode (mode={})", status.mode.as_deref().unwrap_or("?")));
    recommendations.push("set mode to Rule so per-container routing rules take effect".to_string());
  }
  if status.reachable && status.external_controller.is_none() {
    issues.push("multiplexer did not report an external-controller address".to_string());
    recommendations.push("confirm the multiplexer config exposes its admin API".to_string());
  }

  DiagnoseReport { status, issues, recommendations }
}

#[cfg(test)]
mod tests {
  // All three queries depend on live collaborators (KV store, HTTP
  // admin API); nothing pure to unit test here beyond what's already
  // covered by `ProxyGroupHealth`/`SystemHealthLevel` in the entity
  // crate.
}
