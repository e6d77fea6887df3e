use serde::{Deserialize, Serialize};

/// Static region keyword table used to partition proxy node names into
/// groups. Matched case-insensitively against a node's `name`; first
/// match wins, otherwise the node falls into `"other"`.
pub const REGION_KEYWORDS: &[(&str, &[&str])] = &[
  ("HK", &["hk", "hong kong", "hongkong"]),
  ("TW", &["tw", "taiwan"]),
  ("JP", &["jp", "japan"]),
  ("SG", &["sg", "singapore"]),
  ("US", &["us", "united states", "america"]),
  ("KR", &["kr", "korea"]),
  ("CA", &["ca", "canada"]),
  ("GB", &["gb", "uk", "united kingdom", "britain"]),
  ("DE", &["de", "germany"]),
  ("FR", &["fr", "france"]),
  ("IT", &["it", "italy"]),
  ("ES", &["es", "spain"]),
  ("NL", &["nl", "netherlands"]),
  ("BE", &["be", "belgium"]),
  ("virtual", &["virtual", "relay", "trojan"]),
];

pub const OTHER_REGION: &str = "other";

/// A node sourced from the merged proxy provider inventory, prior to
/// region partitioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyNode {
  pub name: String,
  pub server: String,
  pub port: u16,
}

pub const PROXY_GROUP_TYPE: &str = "url-test";
pub const PROXY_PROBE_URL: &str = "http://www.gstatic.com/generate_204";
pub const PROXY_GROUP_INTERVAL_SECS: u64 = 30;
pub const PROXY_GROUP_TOLERANCE_MS: u64 = 50;
pub const PROXY_GROUP_TIMEOUT_MS: u64 = 3000;
pub const PROXY_GROUP_SHARD_SIZE: usize = 5;

pub const HEALTH_CHECK_CONCURRENCY: usize = 10;
pub const HEALTH_PROBE_TIMEOUT_SECS: u64 = 10;
pub const HEALTHY_DELAY_THRESHOLD_MS: u64 = 5000;
pub const FAILURE_BLACKLIST_THRESHOLD: u32 = 3;
pub const BLACKLIST_DURATION_SECS: i64 = 600;
pub const REASSIGN_LOOP_PERIOD_SECS: u64 = 120;

/// One url-test bundle of proxy nodes, as it exists in the multiplexer
/// config. `name` is e.g. `"[Auto] JP-01"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyGroup {
  pub name: String,
  #[serde(rename = "type")]
  pub group_type: String,
  pub proxies: Vec<String>,
  pub url: String,
  pub interval: u64,
  pub tolerance: u64,
  pub timeout: u64,
  pub lazy: bool,
}

impl ProxyGroup {
  pub fn auto(name: String, proxies: Vec<String>) -> Self {
    Self {
      name,
      group_type: PROXY_GROUP_TYPE.to_string(),
      proxies,
      url: PROXY_PROBE_URL.to_string(),
      interval: PROXY_GROUP_INTERVAL_SECS,
      tolerance: PROXY_GROUP_TOLERANCE_MS,
      timeout: PROXY_GROUP_TIMEOUT_MS,
      lazy: false,
    }
  }
}

/// Last-observed health for a single group, as encoded into the
/// `proxy_group_health` KV hash (`"<healthy>:<response_seconds>:<ts>"`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProxyGroupHealth {
  pub healthy: bool,
  pub response_time_ms: u64,
  pub last_check_ts: i64,
}

impl ProxyGroupHealth {
  pub fn encode(&self) -> String {
    format!(
      "{}:{:.3}:{}",
      self.healthy,
      self.response_time_ms as f64 / 1000.0,
      self.last_check_ts
    )
  }

  pub fn decode(raw: &str) -> Option<Self> {
    let mut parts = raw.splitn(3, ':');
    let healthy = parts.next()?.parse().ok()?;
    let response_secs: f64 = parts.next()?.parse().ok()?;
    let last_check_ts = parts.next()?.parse().ok()?;
    Some(Self {
      healthy,
      response_time_ms: (response_secs * 1000.0).round() as u64,
      last_check_ts,
    })
  }
}

/// A group's full runtime status, as surfaced by the diagnostics report.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyGroupStatus {
  pub name: String,
  pub is_healthy: bool,
  pub response_seconds: f64,
  pub failure_count: u32,
  pub is_blacklisted: bool,
  pub last_check_ts: Option<i64>,
  pub blacklist_until: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemHealthLevel {
  Healthy,
  Degraded,
  Unhealthy,
}

impl SystemHealthLevel {
  pub fn from_ratio(healthy: usize, total: usize) -> Self {
    if total == 0 {
      return SystemHealthLevel::Unhealthy;
    }
    let pct = healthy as f64 / total as f64;
    if pct >= 0.8 {
      SystemHealthLevel::Healthy
    } else if pct >= 0.5 {
      SystemHealthLevel::Degraded
    } else {
      SystemHealthLevel::Unhealthy
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxySystemSummary {
  pub level: SystemHealthLevel,
  pub healthy_count: usize,
  pub total_count: usize,
  pub groups: Vec<ProxyGroupStatus>,
}

/// Just the overall counts, without the per-group breakdown -- the
/// "system summary" view as opposed to "groups health"'s full list.
#[derive(Debug, Clone, Serialize)]
pub struct SystemSummaryOnly {
  pub level: SystemHealthLevel,
  pub healthy_count: usize,
  pub total_count: usize,
}

impl From<&ProxySystemSummary> for SystemSummaryOnly {
  fn from(full: &ProxySystemSummary) -> Self {
    Self { level: full.level, healthy_count: full.healthy_count, total_count: full.total_count }
  }
}

/// One `SRC-IP-CIDR,<ip>/32,<group>` routing rule, keyed by the
/// container IP it routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerProxyRule {
  pub container_ip: String,
  pub group: String,
}

impl ContainerProxyRule {
  pub fn rule_string(&self) -> String {
    format!("SRC-IP-CIDR,{}/32,{}", self.container_ip, self.group)
  }

  /// Parses a rule string of the form emitted by [`Self::rule_string`].
  /// Returns `None` for any other rule shape found in the on-disk config.
  pub fn parse(rule: &str) -> Option<Self> {
    let mut parts = rule.splitn(3, ',');
    if parts.next()? != "SRC-IP-CIDR" {
      return None;
    }
    let cidr = parts.next()?;
    let ip = cidr.strip_suffix("/32")?;
    let group = parts.next()?;
    Some(Self {
      container_ip: ip.to_string(),
      group: group.to_string(),
    })
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClashStatusReport {
  pub version: Option<String>,
  pub proxy_count: usize,
  pub group_count: usize,
  pub reachable: bool,
  pub mode: Option<String>,
  pub external_controller: Option<String>,
  pub log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnoseReport {
  pub status: ClashStatusReport,
  pub issues: Vec<String>,
  pub recommendations: Vec<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn container_proxy_rule_roundtrips_through_rule_string() {
    let rule = ContainerProxyRule {
      container_ip: "10.0.0.5".to_string(),
      group: "[Auto] JP-01".to_string(),
    };
    let parsed = ContainerProxyRule::parse(&rule.rule_string()).unwrap();
    assert_eq!(parsed.container_ip, rule.container_ip);
    assert_eq!(parsed.group, rule.group);
  }

  #[test]
  fn container_proxy_rule_parse_rejects_unrelated_rules() {
    assert!(ContainerProxyRule::parse("DOMAIN-SUFFIX,example.com,DIRECT").is_none());
    assert!(ContainerProxyRule::parse("SRC-IP-CIDR,10.0.0.5/24,group").is_none());
  }

  #[test]
  fn proxy_group_health_roundtrips_through_encode() {
    let health = ProxyGroupHealth { healthy: true, response_time_ms: 237, last_check_ts: 1_700_000_000 };
    let decoded = ProxyGroupHealth::decode(&health.encode()).unwrap();
    assert_eq!(decoded.healthy, health.healthy);
    assert_eq!(decoded.response_time_ms, health.response_time_ms);
    assert_eq!(decoded.last_check_ts, health.last_check_ts);
  }

  #[test]
  fn proxy_group_health_decode_rejects_malformed_input() {
    assert!(ProxyGroupHealth::decode("not-a-valid-encoding").is_none());
  }

  #[test]
  fn system_health_level_thresholds() {
    assert_eq!(SystemHealthLevel::from_ratio(4, 5), SystemHealthLevel::Healthy);
    assert_eq!(SystemHealthLevel::from_ratio(3, 5), SystemHealthLevel::Degraded);
    assert_eq!(SystemHealthLevel::from_ratio(1, 5), SystemHealthLevel::Unhealthy);
    assert_eq!(SystemHealthLevel::from_ratio(0, 0), SystemHealthLevel::Unhealthy);
  }
}
