use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContainerStatus {
  Creating,
  Running,
  Exited,
  Error,
  Unknown,
  Restarting,
}

/// Stored as plain TEXT in the `containers` table (no native Postgres
/// enum type, so a migration never has to `ALTER TYPE ... ADD VALUE`).
impl sqlx::Type<sqlx::Postgres> for ContainerStatus {
  fn type_info() -> sqlx::postgres::PgTypeInfo {
    <String as sqlx::Type<sqlx::Postgres>>::type_info()
  }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ContainerStatus {
  fn decode(
    value: sqlx::postgres::PgValueRef<'r>,
  ) -> Result<Self, sqlx::error::BoxDynError> {
    let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
    Ok(s.parse()?)
  }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for ContainerStatus {
  fn encode_by_ref(
    &self,
    buf: &mut sqlx::postgres::PgArgumentBuffer,
  ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
    <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(
      &self.to_string(),
      buf,
    )
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Container {
  pub id: i64,
  pub external_id: String,
  pub name: String,
  pub image: String,
  pub status: ContainerStatus,
  pub host_port_url: String,
  pub worker_id: uuid::Uuid,
  pub project_id: i64,
}

/// Request body for batch-creating containers (spec §4.3, §6).
#[derive(Debug, Clone, Deserialize)]
pub struct BatchCreateRequest {
  pub count: u32,
  pub image: String,
  #[serde(default)]
  pub volumes: HashMap<String, String>,
  #[serde(default)]
  pub proxy_env: HashMap<String, String>,
}

/// Status reported by a worker process running inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkerReportedStatus {
  NeedsManualIntervention,
  Running,
}
