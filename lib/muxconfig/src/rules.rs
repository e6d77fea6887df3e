//! Routing-rule maintenance: dropping rules that reference a
//! proxy-group which no longer exists after a regroup, and splicing
//! the per-container `SRC-IP-CIDR` rule produced by the proxy
//! assignment flow in and out of the rule list.

use std::collections::HashSet;

use dispider_client::entities::proxy::ContainerProxyRule;

const FALLBACK_RULES: &[&str] = &["GEOIP,CN,DIRECT", "MATCH,DIRECT"];

fn rule_target(rule: &str) -> Option<&str> {
  let parts: Vec<&str> = rule.split(',').map(str::trim).collect();
  match parts.as_slice() {
    [.., target] if parts.len() >= 2 => Some(target),
    _ => None,
  }
}

/// Drops any rule whose target isn't in `valid_groups`, then restores
/// the `GEOIP,CN,DIRECT` / `MATCH,DIRECT` fallbacks if sweeping left
/// the rule list empty or without one of them.
pub fn sweep(existing: Vec<String>, valid_groups: &HashSet<&str>) -> Vec<String> {
  let mut swept = Vec::with_capacity(existing.len());
  for rule in existing {
    match rule_target(&rule) {
      Some(target) if !valid_groups.contains(target) => {
        tracing::warn!(%rule, %target, "dropping rule referencing missing proxy group");
      }
      _ => swept.push(rule),
    }
  }

  if swept.is_empty() {
    return FALLBACK_RULES.iter().map(|r| r.to_string()).collect();
  }

  let has_geoip = swept.iter().any(|r| r == "GEOIP,CN,DIRECT");
  let has_match = swept.iter().any(|r| r.starts_with("MATCH,"));
  if !has_geoip {
    swept.push("GEOIP,CN,DIRECT".to_string());
  }
  if !has_match {
    swept.push("MATCH,DIRECT".to_string());
  }
  swept
}

/// Inserts a container's routing rule at the top of the list so it
/// takes priority over the region-group fallbacks.
pub fn add_container_rule(rules: &mut Vec<String>, rule: &ContainerProxyRule) {
  rules.insert(0, rule.rule_string());
}

/// Removes a single matching occurrence of `rule`, if present.
pub fn remove_container_rule(rules: &mut Vec<String>, rule: &ContainerProxyRule) -> bool {
  let target = rule.rule_string();
  if let Some(pos) = rules.iter().position(|r| *r == target) {
    rules.remove(pos);
    true
  } else {
    false
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn drops_rule_with_missing_target() {
    let valid = HashSet::from(["DIRECT"]);
    let swept = sweep(
      vec!["SRC-IP-CIDR,10.0.0.1/32,GoneGroup".to_string(), "MATCH,DIRECT".to_string()],
      &valid,
    );
    assert_eq!(swept, vec!["MATCH,DIRECT".to_string()]);
  }

  #[test]
  fn restores_fallbacks_when_empty() {
    let valid = HashSet::new();
    let swept = sweep(vec!["SRC-IP-CIDR,10.0.0.1/32,Gone".to_string()], &valid);
    assert_eq!(swept, vec!["GEOIP,CN,DIRECT".to_string(), "MATCH,DIRECT".to_string()]);
  }

  #[test]
  fn adds_geoip_fallback_if_missing() {
    let valid = HashSet::from(["DIRECT"]);
    let swept = sweep(vec!["MATCH,DIRECT".to_string()], &valid);
    assert!(swept.contains(&"GEOIP,CN,DIRECT".to_string()));
  }

  #[test]
  fn inserts_container_rule_at_top() {
    let mut rules = vec!["MATCH,DIRECT".to_string()];
    let rule = ContainerProxyRule { container_ip: "10.0.0.5".to_string(), group: "[Auto] HK".to_string() };
    add_container_rule(&mut rules, &rule);
    assert_eq!(rules[0], "SRC-IP-CIDR,10.0.0.5/32,[Auto] HK");
  }

  #[test]
  fn removes_existing_container_rule() {
    let mut rules = vec!["SRC-IP-CIDR,10.0.0.5/32,[Auto] HK".to_string(), "MATCH,DIRECT".to_string()];
    let rule = ContainerProxyRule { container_ip: "10.0.0.5".to_string(), group: "[Auto] HK".to_string() };
    assert!(remove_container_rule(&mut rules, &rule));
    assert_eq!(rules, vec!["MATCH,DIRECT".to_string()]);
  }
}
