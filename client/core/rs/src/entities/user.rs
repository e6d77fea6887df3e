use serde::{Deserialize, Serialize};

use crate::error::{DispiderError, DispiderResult, ErrorKind};

/// A caller's role within a single project. The core never validates
/// *who* the caller is, or that this role is accurate -- that is the
/// auth collaborator's job (see spec §1, out of scope). The core only
/// ever compares this tag against the minimum role an operation needs.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
  Member,
  Admin,
  Owner,
}

impl ProjectRole {
  pub fn at_least(self, min: ProjectRole) -> bool {
    self >= min
  }
}

/// The pre-validated caller identity handed to every core operation by
/// the transport layer. `project_role` is `None` when the caller has no
/// membership in the project the operation targets.
#[derive(Debug, Clone)]
pub struct Identity {
  pub user_id: String,
  pub is_super_admin: bool,
  pub project_role: Option<ProjectRole>,
}

impl Identity {
  pub fn worker() -> Self {
    Self {
      user_id: "worker".to_string(),
      is_super_admin: false,
      project_role: None,
    }
  }

  pub fn can_access_project(&self, member_project_ids: &[i64], project_id: i64) -> bool {
    self.is_super_admin || member_project_ids.contains(&project_id)
  }

  pub fn has_role(&self, min: ProjectRole) -> bool {
    self.is_super_admin
      || self.project_role.is_some_and(|role| role.at_least(min))
  }

  pub fn require_role(&self, min: ProjectRole) -> DispiderResult<()> {
    if self.has_role(min) {
      Ok(())
    } else {
      Err(DispiderError::new(
        ErrorKind::PermissionDenied,
        anyhow::anyhow!("caller does not hold role {min:?} or higher"),
      ))
    }
  }

  pub fn require_super_admin(&self) -> DispiderResult<()> {
    if self.is_super_admin {
      Ok(())
    } else {
      Err(DispiderError::new(
        ErrorKind::PermissionDenied,
        anyhow::anyhow!("operation requires super-admin"),
      ))
    }
  }
}

/// Minimal projection of a project member, as returned by the project
/// registry collaborator (spec §1: project CRUD/membership is external).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMember {
  pub user_id: String,
  pub role: ProjectRole,
  pub push_key: Option<String>,
}
