//! Queries backing the container lifecycle coordinator (§4.3). Port
//! allocation, row persistence and status transitions live here; the
//! actual runtime calls (image check, launch, stop) are the caller's
//! job via `runtime::DockerClient`.

use anyhow::Context;
use dispider_client::entities::container::{Container, ContainerStatus};
use uuid::Uuid;

fn max_port_from_urls<'a>(urls: impl Iterator<Item = &'a str>) -> Option<i32> {
  urls
    .filter_map(|url| url.rsplit(':').next())
    .filter_map(|port| port.parse::<i32>().ok())
    .max()
}

/// Next host port to hand out: `max(existing) + 1`, or `start` if
/// none. `host_port_url` is stored as `"<host>:<port>"`; the port is
/// the token after the final colon.
pub async fn next_host_port(pool: &sqlx::PgPool, start: i32) -> anyhow::Result<i32> {
  let rows: Vec<(String,)> =
    sqlx::query_as("SELECT host_port_url FROM containers")
      .fetch_all(pool)
      .await
      .context("failed to read existing host ports")?;
  let max_port = max_port_from_urls(rows.iter().map(|(url,)| url.as_str()));
  Ok(max_port.map(|max| max + 1).unwrap_or(start))
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_creating(
  pool: &sqlx::PgPool,
  project_id: i64,
  worker_id: Uuid,
  name: &str,
  image: &str,
  host_port_url: &str,
) -> anyhow::Result<Container> {
  sqlx::query_as::<_, Container>(
    "INSERT INTO containers (external_id, name, image, status, host_port_url, worker_id, project_id) \
     VALUES ('pending', $1, $2, 'creating', $3, $4, $5) \
     RETURNING *",
  )
  .bind(name)
  .bind(image)
  .bind(host_port_url)
  .bind(worker_id)
  .bind(project_id)
  .fetch_one(pool)
  .await
  .context("failed to insert container row")
}

pub async fn mark_running(
  pool: &sqlx::PgPool,
  id: i64,
  external_id: &str,
) -> anyhow::Result<()> {
  sqlx::query(
    "UPDATE containers SET external_id = $1, status = 'running' WHERE id = $2",
  )
  .bind(external_id)
  .bind(id)
  .execute(pool)
  .await
  .context("failed to mark container running")?;
  Ok(())
}

pub async fn set_status(
  pool: &sqlx::PgPool,
  id: i64,
  status: ContainerStatus,
) -> anyhow::Result<()> {
  sqlx::query("UPDATE containers SET status = $1 WHERE id = $2")
    .bind(status)
    .bind(id)
    .execute(pool)
    .await
    .context("failed to update container status")?;
  Ok(())
}

pub async fn get(pool: &sqlx::PgPool, id: i64) -> anyhow::Result<Option<Container>> {
  sqlx::query_as::<_, Container>("SELECT * FROM containers WHERE id = $1")
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch container")
}

pub async fn list_all(pool: &sqlx::PgPool) -> anyhow::Result<Vec<Container>> {
  sqlx::query_as::<_, Container>("SELECT * FROM containers ORDER BY id ASC")
    .fetch_all(pool)
    .await
    .context("failed to list containers")
}

pub async fn list_for_projects(
  pool: &sqlx::PgPool,
  project_ids: &[i64],
) -> anyhow::Result<Vec<Container>> {
  sqlx::query_as::<_, Container>(
    "SELECT * FROM containers WHERE project_id = ANY($1) ORDER BY id ASC",
  )
  .bind(project_ids)
  .fetch_all(pool)
  .await
  .context("failed to list containers for projects")
}

/// Containers in a project whose status is one that bulk-stop acts
/// on: `running`, `creating`, `restarting`.
pub async fn list_stoppable_for_project(
  pool: &sqlx::PgPool,
  project_id: i64,
) -> anyhow::Result<Vec<Container>> {
  sqlx::query_as::<_, Container>(
    "SELECT * FROM containers WHERE project_id = $1 \
     AND status IN ('running', 'creating', 'restarting') ORDER BY id ASC",
  )
  .bind(project_id)
  .fetch_all(pool)
  .await
  .context("failed to list stoppable containers")
}

pub async fn delete(pool: &sqlx::PgPool, id: i64) -> anyhow::Result<()> {
  sqlx::query("DELETE FROM containers WHERE id = $1")
    .bind(id)
    .execute(pool)
    .await
    .context("failed to delete container row")?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::max_port_from_urls;

  #[test]
  fn max_port_from_urls_picks_highest_trailing_port() {
    let urls = ["10.0.0.1:30000", "10.0.0.1:30005", "10.0.0.1:30002"];
    assert_eq!(max_port_from_urls(urls.into_iter()), Some(30005));
  }

  #[test]
  fn max_port_from_urls_empty_is_none() {
    assert_eq!(max_port_from_urls(std::iter::empty()), None);
  }

  // The rest of port allocation (querying, row shape) is exercised
  // through integration tests against a live postgres instance.
}
