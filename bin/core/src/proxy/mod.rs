//! Proxy group manager (§4.4): mediates between the on-disk
//! multiplexer config, the KV store's runtime state, and the
//! provider-file inventory. Submodules own one responsibility each;
//! this file only carries the shared KV key names and small helpers
//! every submodule needs.

pub mod assign;
pub mod config;
pub mod diagnostics;
pub mod health;
pub mod reassign;

use std::path::PathBuf;

use crate::config::core_config;

pub(crate) const KEY_GROUPS_LIST: &str = "proxy_groups_list";
pub(crate) const KEY_RR_INDEX: &str = "proxy_group_rr_index";
pub(crate) const KEY_HEALTH: &str = "proxy_group_health";
pub(crate) const KEY_FAILURE_COUNT: &str = "proxy_group_failure_count";
pub(crate) const KEY_BLACKLIST: &str = "proxy_group_blacklist";
pub(crate) const KEY_LAST_CHECK: &str = "proxy_group_last_check";
pub(crate) const KEY_CONTAINER_RULES: &str = "container_proxy_rules";

pub(crate) fn clash_config_path() -> PathBuf {
  PathBuf::from(&core_config().clash_config_path)
}

pub(crate) fn providers_dir() -> PathBuf {
  PathBuf::from(&core_config().providers_dir)
}

pub(crate) fn now_secs() -> i64 {
  chrono::Utc::now().timestamp()
}
