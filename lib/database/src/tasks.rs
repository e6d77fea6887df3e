//! Atomic claim / submit / fail operations over a project's dynamic
//! task and result tables (§4.2 of the design). This is the only
//! module allowed to hand out `FOR UPDATE SKIP LOCKED` semantics.

use std::collections::HashMap;

use anyhow::Context;
use dispider_client::entities::task::{Task, TaskCounts, TaskStatus};
use sqlx::{Column, Row, postgres::PgRow};

use crate::dynamic::{bulk_insert, result_table_name, task_table_name};

const FIXED: &[&str] = &["id", "status", "worker_id", "claimed_at", "retry_count"];

fn row_to_task(row: &PgRow) -> anyhow::Result<Task> {
  let id: i64 = row.try_get("id")?;
  let status_raw: String = row.try_get("status")?;
  let status: TaskStatus = status_raw.parse().context("invalid task status in row")?;
  let worker_id: Option<String> = row.try_get("worker_id")?;
  let claimed_at: Option<chrono::DateTime<chrono::Utc>> = row.try_get("claimed_at")?;
  let retry_count: i32 = row.try_get("retry_count")?;

  let mut columns = HashMap::new();
  for col in row.columns() {
    let name = col.name();
    if FIXED.contains(&name) {
      continue;
    }
    let value: Option<String> = row.try_get(name)?;
    columns.insert(name.to_string(), value);
  }

  Ok(Task { id, status, worker_id, claimed_at, retry_count, columns })
}

async fn table_exists(pool: &sqlx::PgPool, table: &str) -> anyhow::Result<bool> {
  let qualified = format!("public.{table}");
  let row: (Option<String>,) =
    sqlx::query_as("SELECT to_regclass($1)::text")
      .bind(&qualified)
      .fetch_one(pool)
      .await
      .context("failed to check table existence")?;
  Ok(row.0.is_some())
}

/// Returns an existing `in_progress` row already owned by `worker_id`
/// if one exists (idempotent reclaim), otherwise atomically claims the
/// lowest-id `pending` row and returns it. `None` if no candidate.
pub async fn claim_next_task(
  pool: &sqlx::PgPool,
  project_id: i64,
  worker_id: &str,
) -> anyhow::Result<Option<Task>> {
  let table = task_table_name(project_id);
  if !table_exists(pool, &table).await? {
    return Ok(None);
  }

  let existing = sqlx::query(&format!(
    "SELECT * FROM \"{table}\" WHERE status = 'in_progress' AND worker_id = $1 LIMIT 1"
  ))
  .bind(worker_id)
  .fetch_optional(pool)
  .await
  .context("failed to check for already-claimed task")?;
  if let Some(row) = existing {
    return Ok(Some(row_to_task(&row)?));
  }

  let mut tx = pool.begin().await.context("failed to open transaction")?;
  let candidate = sqlx::query(&format!(
    "SELECT id FROM \"{table}\" WHERE status = 'pending' \
     ORDER BY id ASC LIMIT 1 FOR UPDATE SKIP LOCKED"
  ))
  .fetch_optional(&mut *tx)
  .await
  .context("failed to select next pending task")?;

  let Some(candidate) = candidate else {
    tx.commit().await.ok();
    return Ok(None);
  };
  let id: i64 = candidate.try_get("id")?;

  let claimed = sqlx::query(&format!(
    "UPDATE \"{table}\" SET status = 'in_progress', worker_id = $1, claimed_at = now() \
     WHERE id = $2 RETURNING *"
  ))
  .bind(worker_id)
  .bind(id)
  .fetch_one(&mut *tx)
  .await
  .context("failed to claim task")?;

  tx.commit().await.context("failed to commit task claim")?;
  Ok(Some(row_to_task(&claimed)?))
}

/// Inserts result row(s) for `task_id` (backfilling the `task_id`
/// column) and transitions the task to `completed`, all in one
/// transaction. Empty `columnar` only updates the task's status.
pub async fn submit_result(
  pool: &sqlx::PgPool,
  project_id: i64,
  task_id: i64,
  note: Option<&str>,
  mut columnar: HashMap<String, Vec<String>>,
) -> anyhow::Result<()> {
  let task_table = task_table_name(project_id);
  let result_table = result_table_name(project_id);

  let mut tx = pool.begin().await.context("failed to open transaction")?;

  if !columnar.is_empty() {
    let row_count = columnar.values().next().map(|v| v.len()).unwrap_or(0);
    columnar
      .entry("task_id".to_string())
      .or_insert_with(|| vec![task_id.to_string(); row_count]);
    if let Some(note) = note {
      columnar
        .entry("note".to_string())
        .or_insert_with(|| vec![note.to_string(); row_count]);
    }
    bulk_insert(&mut *tx, &result_table, &columnar)
      .await
      .map_err(anyhow::Error::new)
      .context("failed to insert result rows")?;
  }

  sqlx::query(&format!(
    "UPDATE \"{task_table}\" SET status = 'completed' WHERE id = $1"
  ))
  .bind(task_id)
  .execute(&mut *tx)
  .await
  .context("failed to mark task completed")?;

  tx.commit().await.context("failed to commit result submission")?;
  Ok(())
}

/// Atomically increments `retry_count`; transitions to `failed` once
/// the post-increment value exceeds `ceiling`, otherwise back to
/// `pending` with the claim cleared. A no-op if the row is not
/// currently `in_progress`.
pub async fn report_failure(
  pool: &sqlx::PgPool,
  project_id: i64,
  task_id: i64,
  ceiling: i32,
) -> anyhow::Result<()> {
  let table = task_table_name(project_id);
  let mut tx = pool.begin().await.context("failed to open transaction")?;

  let row = sqlx::query(&format!(
    "SELECT status, retry_count FROM \"{table}\" WHERE id = $1 FOR UPDATE"
  ))
  .bind(task_id)
  .fetch_optional(&mut *tx)
  .await
  .context("failed to read task for failure report")?;

  let Some(row) = row else {
    tx.commit().await.ok();
    return Ok(());
  };
  let status: String = row.try_get("status")?;
  if status != "in_progress" {
    tx.commit().await.ok();
    return Ok(());
  }
  let retry_count: i32 = row.try_get("retry_count")?;
  let next_retry_count = retry_count + 1;

  if next_retry_count > ceiling {
    sqlx::query(&format!(
      "UPDATE \"{table}\" SET status = 'failed', retry_count = $1 WHERE id = $2"
    ))
    .bind(next_retry_count)
    .bind(task_id)
    .execute(&mut *tx)
    .await
    .context("failed to mark task failed")?;
  } else {
    sqlx::query(&format!(
      "UPDATE \"{table}\" SET status = 'pending', retry_count = $1, \
       worker_id = NULL, claimed_at = NULL WHERE id = $2"
    ))
    .bind(next_retry_count)
    .bind(task_id)
    .execute(&mut *tx)
    .await
    .context("failed to requeue task")?;
  }

  tx.commit().await.context("failed to commit failure report")?;
  Ok(())
}

/// Ratio of `completed` rows over total, rounded to four decimals.
/// `0.0` if the table does not exist or is empty.
pub async fn progress(pool: &sqlx::PgPool, project_id: i64) -> anyhow::Result<f64> {
  let table = task_table_name(project_id);
  if !table_exists(pool, &table).await? {
    return Ok(0.0);
  }
  let counts = task_counts(pool, project_id).await?;
  if counts.total() == 0 {
    return Ok(0.0);
  }
  let ratio = counts.completed as f64 / counts.total() as f64;
  Ok((ratio * 10000.0).round() / 10000.0)
}

pub async fn task_counts(pool: &sqlx::PgPool, project_id: i64) -> anyhow::Result<TaskCounts> {
  let table = task_table_name(project_id);
  if !table_exists(pool, &table).await? {
    return Ok(TaskCounts { pending: 0, in_progress: 0, completed: 0, failed: 0 });
  }
  let row = sqlx::query(&format!(
    "SELECT \
       COUNT(*) FILTER (WHERE status = 'pending') AS pending, \
       COUNT(*) FILTER (WHERE status = 'in_progress') AS in_progress, \
       COUNT(*) FILTER (WHERE status = 'completed') AS completed, \
       COUNT(*) FILTER (WHERE status = 'failed') AS failed \
     FROM \"{table}\""
  ))
  .fetch_one(pool)
  .await
  .context("failed to count tasks")?;

  Ok(TaskCounts {
    pending: row.try_get("pending")?,
    in_progress: row.try_get("in_progress")?,
    completed: row.try_get("completed")?,
    failed: row.try_get("failed")?,
  })
}

/// Total rows in the result table; `0` if the table does not exist.
pub async fn results_count(pool: &sqlx::PgPool, project_id: i64) -> anyhow::Result<i64> {
  let table = result_table_name(project_id);
  if !table_exists(pool, &table).await? {
    return Ok(0);
  }
  let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM \"{table}\""))
    .fetch_one(pool)
    .await
    .context("failed to count results")?;
  Ok(row.0)
}
