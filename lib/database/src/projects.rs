//! Thin project registry: existence, membership and settings lookups
//! only. Project CRUD, directory creation and code upload remain an
//! external collaborator's job (§1); this module exists because the
//! container lifecycle coordinator and the HTTP boundary both need to
//! resolve a caller's role and a project's members without a second
//! service hop.

use anyhow::Context;
use dispider_client::entities::project::{Project, ProjectStatus};
use dispider_client::entities::user::{ProjectMember, ProjectRole};

pub async fn get(pool: &sqlx::PgPool, id: i64) -> anyhow::Result<Option<Project>> {
  let row: Option<(i64, String, String, serde_json::Value)> = sqlx::query_as(
    "SELECT id, name, status, settings FROM projects WHERE id = $1",
  )
  .bind(id)
  .fetch_optional(pool)
  .await
  .context("failed to fetch project")?;

  let Some((id, name, status, settings)) = row else {
    return Ok(None);
  };
  let status = match status.as_str() {
    "archived" => ProjectStatus::Archived,
    _ => ProjectStatus::Active,
  };
  let settings = serde_json::from_value(settings).unwrap_or_default();
  Ok(Some(Project { id, name, status, settings }))
}

pub async fn exists(pool: &sqlx::PgPool, id: i64) -> anyhow::Result<bool> {
  let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM projects WHERE id = $1")
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to check project existence")?;
  Ok(row.is_some())
}

pub async fn member_role(
  pool: &sqlx::PgPool,
  project_id: i64,
  user_id: &str,
) -> anyhow::Result<Option<ProjectRole>> {
  let row: Option<(String,)> = sqlx::query_as(
    "SELECT role FROM project_members WHERE project_id = $1 AND user_id = $2",
  )
  .bind(project_id)
  .bind(user_id)
  .fetch_optional(pool)
  .await
  .context("failed to look up project membership")?;
  Ok(row.map(|(role,)| parse_role(&role)))
}

pub async fn member_project_ids(
  pool: &sqlx::PgPool,
  user_id: &str,
) -> anyhow::Result<Vec<i64>> {
  let rows: Vec<(i64,)> = sqlx::query_as(
    "SELECT project_id FROM project_members WHERE user_id = $1",
  )
  .bind(user_id)
  .fetch_all(pool)
  .await
  .context("failed to list member project ids")?;
  Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Members whose role is at least `min`. Callers that need the
/// alerting flow's notifiable population still filter by push key
/// themselves (see `bin/core/src/containers/mod.rs::report_status`).
pub async fn members_at_least(
  pool: &sqlx::PgPool,
  project_id: i64,
  min: ProjectRole,
) -> anyhow::Result<Vec<ProjectMember>> {
  let rows: Vec<(String, String, Option<String>)> = sqlx::query_as(
    "SELECT user_id, role, push_key FROM project_members WHERE project_id = $1",
  )
  .bind(project_id)
  .fetch_all(pool)
  .await
  .context("failed to list project members")?;

  Ok(
    rows
      .into_iter()
      .map(|(user_id, role, push_key)| ProjectMember {
        user_id,
        role: parse_role(&role),
        push_key,
      })
      .filter(|m| m.role.at_least(min))
      .collect(),
  )
}

fn parse_role(role: &str) -> ProjectRole {
  match role {
    "owner" => ProjectRole::Owner,
    "admin" => ProjectRole::Admin,
    _ => ProjectRole::Member,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_known_roles() {
    assert_eq!(parse_role("owner"), ProjectRole::Owner);
    assert_eq!(parse_role("admin"), ProjectRole::Admin);
    assert_eq!(parse_role("member"), ProjectRole::Member);
    assert_eq!(parse_role("bogus"), ProjectRole::Member);
  }
}
