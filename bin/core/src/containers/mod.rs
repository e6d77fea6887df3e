//! Container lifecycle coordinator (§4.3): batch create, visibility
//! filtering, single-container stop/restart/remove, project-wide bulk
//! stop, worker status reports and the alert feed they populate.

use std::collections::HashMap;

use anyhow::Context;
use dispider_client::entities::alert::{Alert, AlertList};
use dispider_client::entities::container::{
  BatchCreateRequest, Container, ContainerStatus, WorkerReportedStatus,
};
use dispider_client::entities::user::{Identity, ProjectRole};
use dispider_client::entities::{CONTAINER_ALERT_PREFIX, VNC_PORT_START};
use dispider_client::error::{DispiderError, DispiderResult, ErrorKind, WithErrorKind};
use runtime::{DockerClient, RunSpec, RuntimeError};
use uuid::Uuid;

use crate::config::core_config;
use crate::helpers::push::PushNotifier;
use crate::state::{db_client, docker_client, http_client, kv_store};

const WORKER_CONTAINER_PORT: u16 = 8080;
const WORKER_HOME_PATH: &str = "/home/user/task";

pub async fn batch_create(
  project_id: i64,
  request: BatchCreateRequest,
) -> DispiderResult<Vec<Container>> {
  let pool = &db_client().pool;
  let docker = docker_client();
  let config = core_config();

  if !docker
    .image_exists(&request.image)
    .await
    .kind(ErrorKind::Internal)?
  {
    return Err(DispiderError::new(
      ErrorKind::NotFound,
      anyhow::anyhow!("image '{}' not found, build or pull it first", request.image),
    ));
  }

  let next_port = database::containers::next_host_port(pool, VNC_PORT_START)
    .await
    .kind(ErrorKind::Internal)?;

  let mut created = Vec::with_capacity(request.count as usize);
  for i in 0..request.count {
    let worker_id = Uuid::new_v4();
    let name = format!("dispider-worker-{project_id}-{}", &worker_id.to_string()[..8]);
    let host_port = next_port + i as i32;
    let host_port_url = format!("{}:{host_port}", config.container_host);

    let row = database::containers::insert_creating(
      pool,
      project_id,
      worker_id,
      &name,
      &request.image,
      &host_port_url,
    )
    .await
    .kind(ErrorKind::Internal)?;

    let mut env = vec![
      ("PROJECT_ID".to_string(), project_id.to_string()),
      ("API_BASE_URL".to_string(), config.api_base_url.clone()),
      ("WORKER_ID".to_string(), worker_id.to_string()),
    ];
    env.extend(request.proxy_env.clone());

    let mut volumes = HashMap::new();
    let host_project_path = format!("{}/{project_id}", config.docker_space_outer());
    volumes.insert(host_project_path, WORKER_HOME_PATH.to_string());
    volumes.extend(request.volumes.clone());

    let spec = RunSpec {
      name: &name,
      image: &request.image,
      host_port,
      container_port: WORKER_CONTAINER_PORT,
      env,
      volumes,
    };

    match docker.run(spec).await {
      Ok(external_id) => {
        database::containers::mark_running(pool, row.id, &external_id)
          .await
          .kind(ErrorKind::Internal)?;
        let mut row = row;
        row.status = ContainerStatus::Running;
        row.external_id = external_id;
        created.push(row);
      }
      Err(err) => {
        tracing::error!(container = %name, error = %err, "failed to launch container");
        database::containers::set_status(pool, row.id, ContainerStatus::Error)
          .await
          .ok();
        return Err(DispiderError::new(
          ErrorKind::Internal,
          anyhow::anyhow!("failed launching container '{name}': {err:#}"),
        ));
      }
    }
  }

  tracing::info!(project_id, count = created.len(), "batch-created containers");
  Ok(created)
}

pub async fn list_visible(
  identity: &Identity,
  member_project_ids: &[i64],
) -> DispiderResult<Vec<Container>> {
  let pool = &db_client().pool;
  if identity.is_super_admin {
    database::containers::list_all(pool).await.kind(ErrorKind::Internal)
  } else if member_project_ids.is_empty() {
    Ok(Vec::new())
  } else {
    database::containers::list_for_projects(pool, member_project_ids)
      .await
      .kind(ErrorKind::Internal)
  }
}

async fn container_or_404(pool: &sqlx::PgPool, id: i64) -> DispiderResult<Container> {
  database::containers::get(pool, id)
    .await
    .kind(ErrorKind::Internal)?
    .ok_or_else(|| {
      DispiderError::new(ErrorKind::NotFound, anyhow::anyhow!("container {id} not found"))
    })
}

/// Looks up the owning project id so callers can check visibility
/// before stopping/restarting/removing a container.
pub async fn project_id_for(container_db_id: i64) -> DispiderResult<i64> {
  let pool = &db_client().pool;
  Ok(container_or_404(pool, container_db_id).await?.project_id)
}

pub async fn stop_single(container_db_id: i64) -> DispiderResult<Container> {
  let pool = &db_client().pool;
  let mut row = container_or_404(pool, container_db_id).await?;
  match docker_client().stop(&row.external_id).await {
    Ok(()) => {
      database::containers::set_status(pool, row.id, ContainerStatus::Exited)
        .await
        .kind(ErrorKind::Internal)?;
      row.status = ContainerStatus::Exited;
    }
    Err(RuntimeError::NotFound) => {
      tracing::warn!(container = %row.name, "not found in docker while stopping");
      database::containers::set_status(pool, row.id, ContainerStatus::Unknown)
        .await
        .kind(ErrorKind::Internal)?;
      row.status = ContainerStatus::Unknown;
    }
    Err(RuntimeError::Other(err)) => {
      return Err(DispiderError::new(ErrorKind::Internal, err));
    }
  }
  Ok(row)
}

pub async fn restart_single(container_db_id: i64) -> DispiderResult<Container> {
  let pool = &db_client().pool;
  let mut row = container_or_404(pool, container_db_id).await?;
  match docker_client().restart(&row.external_id).await {
    Ok(()) => {
      database::containers::set_status(pool, row.id, ContainerStatus::Running)
        .await
        .kind(ErrorKind::Internal)?;
      row.status = ContainerStatus::Running;
    }
    Err(RuntimeError::NotFound) => {
      tracing::warn!(container = %row.name, "not found in docker while restarting");
      database::containers::set_status(pool, row.id, ContainerStatus::Unknown)
        .await
        .kind(ErrorKind::Internal)?;
      row.status = ContainerStatus::Unknown;
    }
    Err(RuntimeError::Other(err)) => {
      return Err(DispiderError::new(ErrorKind::Internal, err));
    }
  }
  Ok(row)
}

pub async fn remove_single(container_db_id: i64) -> DispiderResult<()> {
  let pool = &db_client().pool;
  let row = container_or_404(pool, container_db_id).await?;
  match docker_client().remove(&row.external_id).await {
    Ok(()) | Err(RuntimeError::NotFound) => {}
    Err(RuntimeError::Other(err)) => return Err(DispiderError::new(ErrorKind::Internal, err)),
  }
  database::containers::delete(pool, row.id).await.kind(ErrorKind::Internal)?;
  Ok(())
}

/// Stops every active container in a project, skipping over individual
/// failures so one bad container never blocks the rest.
pub async fn bulk_stop_for_project(project_id: i64) -> DispiderResult<usize> {
  let pool = &db_client().pool;
  let targets = database::containers::list_stoppable_for_project(pool, project_id)
    .await
    .kind(ErrorKind::Internal)?;
  let mut stopped = 0;
  for container in targets {
    if let Err(err) = stop_single(container.id).await {
      tracing::error!(container_id = container.id, error = %err, "failed stopping container in bulk stop");
    } else {
      stopped += 1;
    }
  }
  Ok(stopped)
}

pub async fn report_status(
  project_id: i64,
  worker_id: Uuid,
  status: WorkerReportedStatus,
  message: Option<String>,
) -> anyhow::Result<()> {
  let key = format!("{CONTAINER_ALERT_PREFIX}{worker_id}");
  match status {
    WorkerReportedStatus::NeedsManualIntervention => {
      let alert = Alert {
        worker_id: worker_id.to_string(),
        status,
        message,
        project_id,
      };
      let payload = serde_json::to_string(&alert).context("failed to encode alert")?;
      kv_store().set(&key, &payload).await?;
      tracing::info!(worker_id = %worker_id, "recorded manual-intervention alert");

      let managers = match database::projects::members_at_least(
        &db_client().pool,
        project_id,
        ProjectRole::Member,
      )
      .await
      {
        Ok(managers) => managers,
        Err(err) => {
          tracing::error!(project_id, error = %err, "failed to look up project members to notify");
          Vec::new()
        }
      };
      if managers.is_empty() {
        tracing::error!(project_id, "no project members found to notify");
      }
      let notifier = PushNotifier::new(http_client().clone());
      let title = format!("container needs manual intervention (project {project_id})");
      let body = format!("worker id: {worker_id}");
      for member in managers {
        let Some(push_key) = member.push_key.filter(|k| !k.is_empty()) else {
          tracing::warn!(user_id = %member.user_id, "member has no push key configured");
          continue;
        };
        if let Err(err) = notifier.send(&push_key, &title, &body).await {
          tracing::error!(user_id = %member.user_id, error = %err, "push notification failed");
        }
      }
    }
    WorkerReportedStatus::Running => {
      if kv_store().get(&key).await?.is_some() {
        kv_store().del(&key).await?;
        tracing::info!(worker_id = %worker_id, "recovery reported, alert cleared");
      }
    }
  }
  Ok(())
}

pub async fn list_alerts() -> anyhow::Result<AlertList> {
  let keys = kv_store().keys_with_prefix(CONTAINER_ALERT_PREFIX).await?;
  let mut alerts = Vec::with_capacity(keys.len());
  for key in keys {
    let Some(raw) = kv_store().get(&key).await? else { continue };
    match serde_json::from_str::<Alert>(&raw) {
      Ok(alert) => alerts.push(alert),
      Err(err) => tracing::error!(key, error = %err, "failed to decode stored alert"),
    }
  }
  Ok(AlertList { alerts })
}

#[cfg(test)]
mod tests {
  // Docker and postgres calls require live collaborators; the one
  // pure piece worth isolating here -- key naming -- is covered by
  // the round trip implicit in `list_alerts`/`report_status` sharing
  // `CONTAINER_ALERT_PREFIX`.
}
