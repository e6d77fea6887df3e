//! Thin HTTP-facing wrapper around the dynamic-SQL and task-dispatch
//! query layers (§4.1, §4.2). Holds no state of its own; every call
//! resolves the shared pool from `state::db_client` and maps
//! `anyhow::Result` into `DispiderResult` at this boundary.

use std::collections::HashMap;

use dispider_client::entities::task::{Task, TaskCounts};
use dispider_client::error::{DispiderResult, ErrorKind, WithErrorKind};

use crate::config::core_config;
use crate::state::db_client;

pub async fn init_task_table(project_id: i64, columns: Vec<String>) -> DispiderResult<()> {
  database::dynamic::validate_task_column_names(&columns)?;
  database::dynamic::create_or_recreate_task_table(&db_client().pool, project_id, &columns)
    .await
    .kind(ErrorKind::Internal)
}

pub async fn init_result_table(project_id: i64, columns: Vec<String>) -> DispiderResult<()> {
  database::dynamic::validate_result_column_names(&columns)?;
  database::dynamic::create_or_recreate_result_table(&db_client().pool, project_id, &columns)
    .await
    .kind(ErrorKind::Internal)
}

pub async fn bulk_add_tasks(
  project_id: i64,
  columnar: HashMap<String, Vec<String>>,
) -> DispiderResult<u64> {
  let table = database::dynamic::task_table_name(project_id);
  database::dynamic::bulk_insert(&db_client().pool, &table, &columnar).await
}

pub async fn claim_next_task(project_id: i64, worker_id: &str) -> DispiderResult<Option<Task>> {
  database::tasks::claim_next_task(&db_client().pool, project_id, worker_id)
    .await
    .kind(ErrorKind::Internal)
}

pub async fn submit_result(
  project_id: i64,
  task_id: i64,
  note: Option<&str>,
  columnar: HashMap<String, Vec<String>>,
) -> DispiderResult<()> {
  database::tasks::submit_result(&db_client().pool, project_id, task_id, note, columnar)
    .await
    .kind(ErrorKind::Internal)
}

pub async fn report_failure(project_id: i64, task_id: i64) -> DispiderResult<()> {
  let ceiling = core_config().task_retry_ceiling;
  database::tasks::report_failure(&db_client().pool, project_id, task_id, ceiling)
    .await
    .kind(ErrorKind::Internal)
}

pub async fn progress(project_id: i64) -> DispiderResult<f64> {
  database::tasks::progress(&db_client().pool, project_id)
    .await
    .kind(ErrorKind::Internal)
}

pub async fn task_counts(project_id: i64) -> DispiderResult<TaskCounts> {
  database::tasks::task_counts(&db_client().pool, project_id)
    .await
    .kind(ErrorKind::Internal)
}

pub async fn results_count(project_id: i64) -> DispiderResult<i64> {
  database::tasks::results_count(&db_client().pool, project_id)
    .await
    .kind(ErrorKind::Internal)
}

#[cfg(test)]
mod tests {
  // Column validation and table-name derivation are unit tested in
  // `database::dynamic`; everything this module adds is a pool lookup
  // that needs a live postgres instance.
}
