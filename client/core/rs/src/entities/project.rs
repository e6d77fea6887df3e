use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProjectStatus {
  Active,
  Archived,
}

/// A thin projection of the project registry (spec §1: project CRUD is
/// a collaborator, not part of the core). The core only ever needs a
/// project's id, status and settings map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
  pub id: i64,
  pub name: String,
  pub status: ProjectStatus,
  #[serde(default)]
  pub settings: HashMap<String, String>,
}
