//! Dynamic task table HTTP surface (§6): table initialization and
//! dispatch operations (claim/submit/fail) plus the read-only progress
//! queries. Worker-facing routes use `WorkerIdentity` per §9's
//! preserved decision that they are not authenticated by identity.

use std::collections::HashMap;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::routing::{get, post};
use dispider_client::entities::task::{
  CreateTablesRequest, InsertTasksRequest, ReportFailureRequest, SubmitResultRequest, Task,
  TaskCounts,
};
use dispider_client::entities::user::ProjectRole;
use serde::Deserialize;
use serde_json::json;

use crate::dispatch;
use crate::error::ApiResult;
use crate::helpers::identity::{AuthedIdentity, WorkerIdentity};

pub fn router() -> Router {
  Router::new()
    .route("/tasks/tables", post(init_tables))
    .route("/tasks/bulk", post(bulk_add_tasks))
    .route("/tasks/claim", post(claim_next_task))
    .route("/tasks/submit", post(submit_result))
    .route("/tasks/fail", post(report_failure))
    .route("/projects/{project_id}/tasks/progress", get(progress))
    .route("/projects/{project_id}/tasks/counts", get(task_counts))
    .route("/projects/{project_id}/tasks/results-count", get(results_count))
}

async fn init_tables(
  AuthedIdentity(identity): AuthedIdentity,
  Json(request): Json<CreateTablesRequest>,
) -> ApiResult<Json<serde_json::Value>> {
  identity.require_role(ProjectRole::Owner)?;
  let task_columns: Vec<String> = request.task_columns.into_iter().map(|c| c.name).collect();
  let result_columns: Vec<String> = request.result_columns.into_iter().map(|c| c.name).collect();
  dispatch::init_task_table(request.project_id, task_columns).await?;
  dispatch::init_result_table(request.project_id, result_columns).await?;
  Ok(Json(json!({"ack": true})))
}

async fn bulk_add_tasks(
  AuthedIdentity(identity): AuthedIdentity,
  Json(request): Json<InsertTasksRequest>,
) -> ApiResult<Json<serde_json::Value>> {
  identity.require_role(ProjectRole::Member)?;
  let columnar = rows_to_columnar(request.rows);
  let inserted = dispatch::bulk_add_tasks(request.project_id, columnar).await?;
  Ok(Json(json!({"inserted_count": inserted})))
}

fn rows_to_columnar(rows: Vec<HashMap<String, String>>) -> HashMap<String, Vec<String>> {
  let mut columnar: HashMap<String, Vec<String>> = HashMap::new();
  for row in &rows {
    for key in row.keys() {
      columnar.entry(key.clone()).or_default();
    }
  }
  for row in rows {
    for (column, values) in columnar.iter_mut() {
      values.push(row.get(column).cloned().unwrap_or_default());
    }
  }
  columnar
}

#[derive(Deserialize)]
struct ClaimRequest {
  project_id: i64,
  worker_id: String,
}

async fn claim_next_task(
  _worker: WorkerIdentity,
  Json(request): Json<ClaimRequest>,
) -> ApiResult<Json<Option<Task>>> {
  Ok(Json(dispatch::claim_next_task(request.project_id, &request.worker_id).await?))
}

async fn submit_result(
  _worker: WorkerIdentity,
  Json(request): Json<SubmitResultRequest>,
) -> ApiResult<Json<serde_json::Value>> {
  let columnar: HashMap<String, Vec<String>> =
    request.columns.into_iter().map(|(k, v)| (k, v.into_vec())).collect();
  dispatch::submit_result(request.project_id, request.task_id, request.note.as_deref(), columnar)
    .await?;
  Ok(Json(json!({"ack": true})))
}

async fn report_failure(
  _worker: WorkerIdentity,
  Json(request): Json<ReportFailureRequest>,
) -> ApiResult<Json<serde_json::Value>> {
  dispatch::report_failure(request.project_id, request.task_id).await?;
  Ok(Json(json!({"ack": true})))
}

async fn progress(
  AuthedIdentity(identity): AuthedIdentity,
  Path(project_id): Path<i64>,
) -> ApiResult<Json<f64>> {
  identity.require_role(ProjectRole::Member)?;
  Ok(Json(dispatch::progress(project_id).await?))
}

async fn task_counts(
  AuthedIdentity(identity): AuthedIdentity,
  Path(project_id): Path<i64>,
) -> ApiResult<Json<TaskCounts>> {
  identity.require_role(ProjectRole::Member)?;
  Ok(Json(dispatch::task_counts(project_id).await?))
}

async fn results_count(
  AuthedIdentity(identity): AuthedIdentity,
  Path(project_id): Path<i64>,
) -> ApiResult<Json<i64>> {
  identity.require_role(ProjectRole::Member)?;
  Ok(Json(dispatch::results_count(project_id).await?))
}

#[cfg(test)]
mod tests {
  use super::rows_to_columnar;
  use std::collections::HashMap;

  #[test]
  fn rows_to_columnar_aligns_missing_cells_with_empty_string() {
    let rows = vec![
      HashMap::from([("url".to_string(), "a".to_string())]),
      HashMap::from([
        ("url".to_string(), "b".to_string()),
        ("note".to_string(), "x".to_string()),
      ]),
    ];
    let columnar = rows_to_columnar(rows);
    assert_eq!(columnar.get("url"), Some(&vec!["a".to_string(), "b".to_string()]));
    assert_eq!(columnar.get("note"), Some(&vec![String::new(), "x".to_string()]));
  }

  #[test]
  fn rows_to_columnar_empty_input_yields_empty_map() {
    assert!(rows_to_columnar(Vec::new()).is_empty());
  }
}
