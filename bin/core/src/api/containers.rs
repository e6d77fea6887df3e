//! Container lifecycle HTTP surface (§6): batch create, visibility
//! listing, single-container stop/restart/remove, the unauthenticated
//! worker status report, and alert listing.

use axum::Json;
use axum::extract::Path;
use axum::routing::{get, post};
use axum::Router;
use dispider_client::entities::alert::AlertList;
use dispider_client::entities::container::{BatchCreateRequest, Container, WorkerReportedStatus};
use dispider_client::entities::user::ProjectRole;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::containers;
use crate::error::ApiResult;
use crate::helpers::identity::{AuthedIdentity, WorkerIdentity};
use crate::state::db_client;

pub fn router() -> Router {
  Router::new()
    .route("/projects/{project_id}/containers", post(batch_create).get(list_for_project))
    .route("/containers", get(list_visible))
    .route("/containers/{id}/stop", post(stop))
    .route("/containers/{id}/restart", post(restart))
    .route("/containers/{id}", axum::routing::delete(remove))
    .route("/containers/status", post(report_status))
    .route("/containers/alerts", get(list_alerts))
}

async fn batch_create(
  AuthedIdentity(identity): AuthedIdentity,
  Path(project_id): Path<i64>,
  Json(request): Json<BatchCreateRequest>,
) -> ApiResult<Json<Vec<Container>>> {
  identity.require_role(ProjectRole::Owner)?;
  Ok(Json(containers::batch_create(project_id, request).await?))
}

async fn list_for_project(
  AuthedIdentity(identity): AuthedIdentity,
  Path(project_id): Path<i64>,
) -> ApiResult<Json<Vec<Container>>> {
  let member_ids = member_project_ids(&identity.user_id).await?;
  if !identity.can_access_project(&member_ids, project_id) {
    return Err(
      dispider_client::error::DispiderError::new(
        dispider_client::error::ErrorKind::PermissionDenied,
        anyhow::anyhow!("caller is not a member of project {project_id}"),
      )
      .into(),
    );
  }
  let all = containers::list_visible(&identity, &member_ids).await?;
  Ok(Json(all.into_iter().filter(|c| c.project_id == project_id).collect()))
}

async fn list_visible(AuthedIdentity(identity): AuthedIdentity) -> ApiResult<Json<Vec<Container>>> {
  let member_ids = member_project_ids(&identity.user_id).await?;
  Ok(Json(containers::list_visible(&identity, &member_ids).await?))
}

async fn require_visible(identity: &dispider_client::entities::user::Identity, container_db_id: i64) -> ApiResult<()> {
  let project_id = containers::project_id_for(container_db_id).await?;
  let member_ids = member_project_ids(&identity.user_id).await?;
  if !identity.can_access_project(&member_ids, project_id) {
    return Err(
      dispider_client::error::DispiderError::new(
        dispider_client::error::ErrorKind::PermissionDenied,
        anyhow::anyhow!("caller cannot access container {container_db_id}"),
      )
      .into(),
    );
  }
  Ok(())
}

async fn stop(
  AuthedIdentity(identity): AuthedIdentity,
  Path(id): Path<i64>,
) -> ApiResult<Json<Container>> {
  require_visible(&identity, id).await?;
  Ok(Json(containers::stop_single(id).await?))
}

async fn restart(
  AuthedIdentity(identity): AuthedIdentity,
  Path(id): Path<i64>,
) -> ApiResult<Json<Container>> {
  require_visible(&identity, id).await?;
  Ok(Json(containers::restart_single(id).await?))
}

async fn remove(
  AuthedIdentity(identity): AuthedIdentity,
  Path(id): Path<i64>,
) -> ApiResult<axum::http::StatusCode> {
  require_visible(&identity, id).await?;
  containers::remove_single(id).await?;
  Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct ReportStatusBody {
  project_id: i64,
  worker_id: uuid::Uuid,
  status: WorkerReportedStatus,
  message: Option<String>,
}

async fn report_status(
  _worker: WorkerIdentity,
  Json(body): Json<ReportStatusBody>,
) -> ApiResult<Json<Value>> {
  containers::report_status(body.project_id, body.worker_id, body.status, body.message).await?;
  Ok(Json(json!({"ack": true})))
}

async fn list_alerts(AuthedIdentity(identity): AuthedIdentity) -> ApiResult<Json<AlertList>> {
  identity.require_role(ProjectRole::Member)?;
  Ok(Json(containers::list_alerts().await?))
}

async fn member_project_ids(user_id: &str) -> ApiResult<Vec<i64>> {
  Ok(database::projects::member_project_ids(&db_client().pool, user_id).await?)
}
