//! Multiplexer (Clash-style) config assembly: merge proxy provider
//! files into one node inventory, partition nodes into url-test groups
//! by region, sweep dangling rules after a regroup, and splice
//! per-container routing rules in and out (§4.4.1).
//!
//! The on-disk document is kept as a loosely-typed [`ClashConfig`] so
//! that fields this crate doesn't know about (ports, mode, log level,
//! the external controller address) round-trip untouched -- only
//! `proxies`, `proxy-groups` and `rules` are ever rewritten.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use dispider_client::entities::proxy::{
  OTHER_REGION, PROXY_GROUP_SHARD_SIZE, REGION_KEYWORDS, ProxyGroup, ProxyNode,
};
use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;

pub mod rules;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClashConfig {
  #[serde(flatten)]
  pub extra: serde_yaml_ng::Mapping,
  #[serde(default)]
  pub proxies: Vec<ProxyNode>,
  #[serde(rename = "proxy-groups", default)]
  pub proxy_groups: Vec<ProxyGroup>,
  #[serde(default)]
  pub rules: Vec<String>,
}

impl Default for ClashConfig {
  fn default() -> Self {
    let mut extra = serde_yaml_ng::Mapping::new();
    extra.insert(Value::from("port"), Value::from(7890));
    extra.insert(Value::from("socks-port"), Value::from(7891));
    extra.insert(Value::from("allow-lan"), Value::from(true));
    extra.insert(Value::from("mode"), Value::from("Rule"));
    extra.insert(Value::from("log-level"), Value::from("info"));
    extra.insert(
      Value::from("external-controller"),
      Value::from("0.0.0.0:9090"),
    );
    extra.insert(Value::from("secret"), Value::from(""));
    Self {
      extra,
      proxies: Vec::new(),
      proxy_groups: Vec::new(),
      rules: vec!["GEOIP,CN,DIRECT".to_string(), "MATCH,DIRECT".to_string()],
    }
  }
}

pub fn load(path: &Path) -> anyhow::Result<ClashConfig> {
  if !path.exists() {
    return Ok(ClashConfig::default());
  }
  let raw = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read {}", path.display()))?;
  serde_yaml_ng::from_str(&raw)
    .with_context(|| format!("failed to parse {}", path.display()))
}

pub fn save(path: &Path, config: &ClashConfig) -> anyhow::Result<()> {
  let rendered = serde_yaml_ng::to_string(config).context("failed to render config")?;
  std::fs::write(path, rendered)
    .with_context(|| format!("failed to write {}", path.display()))
}

/// Reads every `*.yml`/`*.yaml` file under `providers_dir`, merges
/// their `proxies` lists, and drops nodes whose name repeats an
/// earlier one (first occurrence wins).
pub fn merge_providers(providers_dir: &Path) -> anyhow::Result<Vec<ProxyNode>> {
  if !providers_dir.exists() {
    tracing::warn!(dir = %providers_dir.display(), "providers directory missing");
    return Ok(Vec::new());
  }

  #[derive(Deserialize)]
  struct ProviderFile {
    #[serde(default)]
    proxies: Vec<ProxyNode>,
  }

  let mut seen = HashSet::new();
  let mut merged = Vec::new();

  let mut entries = std::fs::read_dir(providers_dir)
    .with_context(|| format!("failed to read {}", providers_dir.display()))?
    .filter_map(|e| e.ok())
    .map(|e| e.path())
    .filter(|p| {
      matches!(
        p.extension().and_then(|e| e.to_str()),
        Some("yml") | Some("yaml")
      )
    })
    .collect::<Vec<_>>();
  entries.sort();

  for path in entries {
    let raw = match std::fs::read_to_string(&path) {
      Ok(raw) => raw,
      Err(e) => {
        tracing::error!(path = %path.display(), error = %e, "failed to read provider file");
        continue;
      }
    };
    let parsed: ProviderFile = match serde_yaml_ng::from_str(&raw) {
      Ok(p) => p,
      Err(e) => {
        tracing::error!(path = %path.display(), error = %e, "failed to parse provider file");
        continue;
      }
    };
    for node in parsed.proxies {
      if seen.insert(node.name.clone()) {
        merged.push(node);
      } else {
        tracing::warn!(name = %node.name, path = %path.display(), "skipping duplicate proxy name");
      }
    }
  }

  Ok(merged)
}

fn region_for(name: &str) -> &'static str {
  let lower = name.to_lowercase();
  for (region, keywords) in REGION_KEYWORDS {
    if keywords.iter().any(|kw| lower.contains(kw)) {
      return region;
    }
  }
  OTHER_REGION
}

/// Partitions `nodes` by region, then shards each region into
/// `url-test` groups of at most [`PROXY_GROUP_SHARD_SIZE`] nodes.
pub fn generate_proxy_groups(nodes: &[ProxyNode]) -> Vec<ProxyGroup> {
  if nodes.is_empty() {
    return Vec::new();
  }

  let mut by_region: Vec<(&'static str, Vec<String>)> = Vec::new();
  for node in nodes {
    let region = region_for(&node.name);
    match by_region.iter_mut().find(|(r, _)| *r == region) {
      Some((_, names)) => names.push(node.name.clone()),
      None => by_region.push((region, vec![node.name.clone()])),
    }
  }

  let mut groups = Vec::new();
  for (region, names) in by_region {
    if names.len() <= PROXY_GROUP_SHARD_SIZE {
      groups.push(ProxyGroup::auto(format!("[Auto] {region}"), names));
      continue;
    }
    for (i, chunk) in names.chunks(PROXY_GROUP_SHARD_SIZE).enumerate() {
      let name = format!("[Auto] {region}-{:02}", i + 1);
      groups.push(ProxyGroup::auto(name, chunk.to_vec()));
    }
  }
  groups
}

/// Re-merges provider files into `config`, replacing `proxies` and
/// `proxy-groups`, then sweeps `rules` of any entry whose target group
/// no longer exists. Base fallback rules are re-added if the sweep
/// drops them.
pub fn regenerate(config: &mut ClashConfig, providers_dir: &Path) -> anyhow::Result<()> {
  let merged = merge_providers(providers_dir)?;
  config.proxy_groups = generate_proxy_groups(&merged);
  config.proxies = merged;

  let valid_groups: HashSet<&str> = config
    .proxy_groups
    .iter()
    .map(|g| g.name.as_str())
    .chain(std::iter::once("DIRECT"))
    .collect();

  config.rules = rules::sweep(std::mem::take(&mut config.rules), &valid_groups);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn node(name: &str) -> ProxyNode {
    ProxyNode { name: name.to_string(), server: "1.2.3.4".to_string(), port: 443 }
  }

  #[test]
  fn partitions_by_region_keyword() {
    let nodes = vec![node("HK-01"), node("JP Osaka"), node("Mystery Land")];
    let groups = generate_proxy_groups(&nodes);
    let names: Vec<_> = groups.iter().map(|g| g.name.clone()).collect();
    assert!(names.contains(&"[Auto] HK".to_string()));
    assert!(names.contains(&"[Auto] JP".to_string()));
    assert!(names.contains(&"[Auto] other".to_string()));
  }

  #[test]
  fn shards_large_regions() {
    let nodes = (0..12).map(|i| node(&format!("US-{i:02}"))).collect::<Vec<_>>();
    let groups = generate_proxy_groups(&nodes);
    assert_eq!(groups.len(), 3);
    assert_eq!(groups[0].proxies.len(), 5);
    assert_eq!(groups[2].proxies.len(), 2);
  }

  #[test]
  fn empty_input_yields_no_groups() {
    assert!(generate_proxy_groups(&[]).is_empty());
  }

  #[test]
  fn default_config_has_fallback_rules() {
    let config = ClashConfig::default();
    assert_eq!(config.rules, vec!["GEOIP,CN,DIRECT", "MATCH,DIRECT"]);
  }
}
