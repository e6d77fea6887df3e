//! Container runtime client: create, start, stop, restart, remove and
//! restart-by-name against an external container engine (§2, §6). A
//! thin wrapper over `bollard`, in the shape periphery's own docker
//! client takes -- a single struct holding the connected handle,
//! cloned cheaply per call site.

use std::collections::HashMap;

use anyhow::{Context, anyhow};
use bollard::Docker;
use bollard::container::Config;
use bollard::models::{HostConfig, PortBinding};
use bollard::query_parameters::{
  CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
  RemoveContainerOptions, RestartContainerOptions, StartContainerOptions,
  StopContainerOptions,
};

#[derive(Clone)]
pub struct DockerClient {
  docker: Docker,
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
  #[error("not found")]
  NotFound,
  #[error(transparent)]
  Other(#[from] anyhow::Error),
}

fn is_not_found(e: &bollard::errors::Error) -> bool {
  matches!(
    e,
    bollard::errors::Error::DockerResponseServerError { status_code, .. }
      if *status_code == 404
  )
}

pub struct RunSpec<'a> {
  pub name: &'a str,
  pub image: &'a str,
  pub host_port: i32,
  pub container_port: u16,
  pub env: Vec<(String, String)>,
  pub volumes: HashMap<String, String>,
}

impl DockerClient {
  pub fn connect() -> anyhow::Result<Self> {
    let docker = Docker::connect_with_defaults()
      .context("failed to connect to docker api")?;
    Ok(Self { docker })
  }

  pub async fn image_exists(&self, image: &str) -> anyhow::Result<bool> {
    match self.docker.inspect_image(image).await {
      Ok(_) => Ok(true),
      Err(e) if is_not_found(&e) => Ok(false),
      Err(e) => Err(e).context("failed to inspect image"),
    }
  }

  /// Creates and starts a container per `spec`, returning the
  /// runtime-assigned container id.
  pub async fn run(&self, spec: RunSpec<'_>) -> anyhow::Result<String> {
    let port_key = format!("{}/tcp", spec.container_port);
    let mut port_bindings = HashMap::new();
    port_bindings.insert(
      port_key.clone(),
      Some(vec![PortBinding {
        host_ip: None,
        host_port: Some(spec.host_port.to_string()),
      }]),
    );

    let binds = spec
      .volumes
      .iter()
      .map(|(host, container)| format!("{host}:{container}"))
      .collect::<Vec<_>>();

    let env = spec
      .env
      .iter()
      .map(|(k, v)| format!("{k}={v}"))
      .collect::<Vec<_>>();

    let mut exposed_ports = HashMap::new();
    exposed_ports.insert(port_key, HashMap::new());

    let config = Config {
      image: Some(spec.image.to_string()),
      env: Some(env),
      exposed_ports: Some(exposed_ports),
      host_config: Some(HostConfig {
        port_bindings: Some(port_bindings),
        binds: Some(binds),
        ..Default::default()
      }),
      ..Default::default()
    };

    let created = self
      .docker
      .create_container(
        Some(CreateContainerOptions {
          name: spec.name.to_string(),
          ..Default::default()
        }),
        config,
      )
      .await
      .context("failed to create container")?;

    self
      .docker
      .start_container(&created.id, None::<StartContainerOptions>)
      .await
      .context("failed to start container")?;

    Ok(created.id)
  }

  /// The container's IP on the default bridge network, if running.
  pub async fn container_ip(&self, id: &str) -> anyhow::Result<Option<String>> {
    let info = self
      .docker
      .inspect_container(id, None::<InspectContainerOptions>)
      .await
      .context("failed to inspect container")?;
    let ip = info
      .network_settings
      .and_then(|settings| settings.networks)
      .and_then(|networks| {
        networks.values().next().and_then(|n| n.ip_address.clone())
      })
      .filter(|ip| !ip.is_empty());
    Ok(ip)
  }

  pub async fn stop(&self, id: &str) -> Result<(), RuntimeError> {
    match self.docker.stop_container(id, None::<StopContainerOptions>).await {
      Ok(()) => Ok(()),
      Err(e) if is_not_found(&e) => Err(RuntimeError::NotFound),
      Err(e) => Err(RuntimeError::Other(
        anyhow::Error::new(e).context("failed to stop container"),
      )),
    }
  }

  pub async fn restart(&self, id: &str) -> Result<(), RuntimeError> {
    match self.docker.restart_container(id, None::<RestartContainerOptions>).await {
      Ok(()) => Ok(()),
      Err(e) if is_not_found(&e) => Err(RuntimeError::NotFound),
      Err(e) => Err(RuntimeError::Other(
        anyhow::Error::new(e).context("failed to restart container"),
      )),
    }
  }

  pub async fn remove(&self, id: &str) -> Result<(), RuntimeError> {
    let options = RemoveContainerOptions { force: true, ..Default::default() };
    match self.docker.remove_container(id, Some(options)).await {
      Ok(()) => Ok(()),
      Err(e) if is_not_found(&e) => Err(RuntimeError::NotFound),
      Err(e) => Err(RuntimeError::Other(
        anyhow::Error::new(e).context("failed to remove container"),
      )),
    }
  }

  /// Restarts the multiplexer container, looked up by its well-known
  /// name, as the on-disk-config reload mechanism (§4.4.1, §9).
  pub async fn restart_by_name(&self, name: &str) -> anyhow::Result<()> {
    let mut filters = HashMap::new();
    filters.insert("name".to_string(), vec![name.to_string()]);
    let containers = self
      .docker
      .list_containers(Some(ListContainersOptions {
        all: true,
        filters,
        ..Default::default()
      }))
      .await
      .context("failed to look up multiplexer container")?;
    let id = containers
      .first()
      .and_then(|c| c.id.clone())
      .ok_or_else(|| anyhow!("multiplexer container '{name}' not found"))?;
    self
      .docker
      .restart_container(&id, None::<RestartContainerOptions>)
      .await
      .context("failed to restart multiplexer container")
  }
}
