//! Proxy group manager HTTP surface (§6): all routes here require
//! super-admin, matching the table's "super-admin" role column for
//! every proxy operation except the diagnostics reads, which are also
//! restricted to super-admin per the same table.

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query};
use axum::routing::{get, post};
use dispider_client::entities::proxy::{
  ClashStatusReport, DiagnoseReport, ProxySystemSummary, SystemSummaryOnly,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiResult;
use crate::helpers::identity::AuthedIdentity;
use crate::proxy::{assign, config, diagnostics};

pub fn router() -> Router {
  Router::new()
    .route("/proxy/refresh", post(refresh))
    .route("/proxy/providers", post(upload_provider))
    .route("/proxy/groups/health", get(groups_health))
    .route("/proxy/containers", get(container_mappings))
    .route("/proxy/summary", get(system_summary))
    .route("/proxy/status", get(clash_status))
    .route("/proxy/diagnose", get(diagnose))
    .route("/proxy/reassign/{container_ip}", post(force_reassign))
    .route("/proxy/blacklist/clear", post(clear_blacklist))
    .route("/proxy/recover", post(recover))
}

async fn refresh(AuthedIdentity(identity): AuthedIdentity) -> ApiResult<Json<serde_json::Value>> {
  identity.require_super_admin()?;
  config::refresh().await?;
  Ok(Json(json!({"ack": true})))
}

#[derive(Deserialize)]
struct UploadProviderQuery {
  filename: String,
}

async fn upload_provider(
  AuthedIdentity(identity): AuthedIdentity,
  Query(query): Query<UploadProviderQuery>,
  body: Bytes,
) -> ApiResult<Json<serde_json::Value>> {
  identity.require_super_admin()?;

  validations::StringValidator::default().min_length(1).max_length(255).validate(&query.filename)?;
  let is_provider_file = query.filename.ends_with(".yml") || query.filename.ends_with(".yaml");
  if !is_provider_file || query.filename.contains('/') || query.filename.contains("..") {
    return Err(anyhow::anyhow!("filename must be a bare .yml/.yaml name: {}", query.filename).into());
  }

  let path =
    std::path::Path::new(&crate::config::core_config().providers_dir).join(&query.filename);
  std::fs::write(&path, &body)
    .map_err(|e| anyhow::anyhow!("failed writing provider file {}: {e}", query.filename))?;

  config::refresh().await?;
  Ok(Json(json!({"ack": true})))
}

async fn groups_health(
  AuthedIdentity(identity): AuthedIdentity,
) -> ApiResult<Json<ProxySystemSummary>> {
  identity.require_super_admin()?;
  Ok(Json(diagnostics::groups_health().await?))
}

async fn system_summary(
  AuthedIdentity(identity): AuthedIdentity,
) -> ApiResult<Json<SystemSummaryOnly>> {
  identity.require_super_admin()?;
  Ok(Json(diagnostics::system_summary().await?))
}

async fn container_mappings(
  AuthedIdentity(identity): AuthedIdentity,
) -> ApiResult<Json<Vec<diagnostics::ContainerMapping>>> {
  identity.require_super_admin()?;
  Ok(Json(diagnostics::container_mappings().await?))
}

async fn clash_status(AuthedIdentity(identity): AuthedIdentity) -> ApiResult<Json<ClashStatusReport>> {
  identity.require_super_admin()?;
  Ok(Json(diagnostics::clash_status().await))
}

async fn diagnose(AuthedIdentity(identity): AuthedIdentity) -> ApiResult<Json<DiagnoseReport>> {
  identity.require_super_admin()?;
  Ok(Json(diagnostics::diagnose().await))
}

async fn force_reassign(
  AuthedIdentity(identity): AuthedIdentity,
  Path(container_ip): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
  identity.require_super_admin()?;
  let (before, after) = assign::force_reassign(&container_ip).await?;
  Ok(Json(json!({"old": before, "new": after})))
}

#[derive(Deserialize)]
struct ClearBlacklistQuery {
  group_name: Option<String>,
}

async fn clear_blacklist(
  AuthedIdentity(identity): AuthedIdentity,
  Query(query): Query<ClearBlacklistQuery>,
) -> ApiResult<Json<Vec<String>>> {
  identity.require_super_admin()?;
  Ok(Json(assign::clear_blacklist(query.group_name.as_deref()).await?))
}

async fn recover(AuthedIdentity(identity): AuthedIdentity) -> ApiResult<Json<serde_json::Value>> {
  identity.require_super_admin()?;
  let recovered = config::recover_mappings().await?;
  Ok(Json(json!({"recovered": recovered})))
}
