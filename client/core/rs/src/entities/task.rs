use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// The fixed columns every `project_<id>_tasks` table carries alongside
/// whatever TEXT columns the caller declared. These names are reserved
/// and rejected in user column declarations.
pub const TASK_FIXED_COLUMNS: &[&str] =
  &["id", "status", "worker_id", "claimed_at", "retry_count"];

/// The fixed columns every `project_<id>_results` table carries.
pub const RESULT_FIXED_COLUMNS: &[&str] = &["id", "task_id", "note"];

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
  Pending,
  InProgress,
  Completed,
  Failed,
}

impl sqlx::Type<sqlx::Postgres> for TaskStatus {
  fn type_info() -> sqlx::postgres::PgTypeInfo {
    <String as sqlx::Type<sqlx::Postgres>>::type_info()
  }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for TaskStatus {
  fn decode(
    value: sqlx::postgres::PgValueRef<'r>,
  ) -> Result<Self, sqlx::error::BoxDynError> {
    let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
    Ok(s.parse()?)
  }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for TaskStatus {
  fn encode_by_ref(
    &self,
    buf: &mut sqlx::postgres::PgArgumentBuffer,
  ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
    <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.to_string(), buf)
  }
}

/// A row out of a project's dynamic task table. `columns` holds every
/// user-declared TEXT column, keyed by column name; the fixed columns
/// are kept as typed fields so the dispatch engine never has to parse
/// them back out of a generic map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
  pub id: i64,
  pub status: TaskStatus,
  pub worker_id: Option<String>,
  pub claimed_at: Option<chrono::DateTime<chrono::Utc>>,
  pub retry_count: i32,
  #[serde(flatten)]
  pub columns: HashMap<String, Option<String>>,
}

/// A row out of a project's dynamic result table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
  pub id: i64,
  pub task_id: i64,
  pub note: Option<String>,
  #[serde(flatten)]
  pub columns: HashMap<String, Option<String>>,
}

/// A declaration of one user-defined TEXT column, supplied when a
/// project owner (re)creates its task/result tables.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnDecl {
  pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTablesRequest {
  pub project_id: i64,
  pub task_columns: Vec<ColumnDecl>,
  pub result_columns: Vec<ColumnDecl>,
}

/// Bulk-insert payload for seeding a project's task table.
#[derive(Debug, Clone, Deserialize)]
pub struct InsertTasksRequest {
  pub project_id: i64,
  pub rows: Vec<HashMap<String, String>>,
}

/// Accepts either a flat record (`"url": "http://a"`) or a columnar
/// batch (`"url": ["http://a", "http://b"]`), matching `submit_result`'s
/// own flat-or-columnar support.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResultRequest {
  pub project_id: i64,
  pub task_id: i64,
  pub note: Option<String>,
  #[serde(default)]
  pub columns: HashMap<String, ResultColumnValue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ResultColumnValue {
  Flat(String),
  Columnar(Vec<String>),
}

impl ResultColumnValue {
  pub fn into_vec(self) -> Vec<String> {
    match self {
      ResultColumnValue::Flat(value) => vec![value],
      ResultColumnValue::Columnar(values) => values,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportFailureRequest {
  pub project_id: i64,
  pub task_id: i64,
  pub error: Option<String>,
}

/// Aggregate counts used by the dispatch engine's progress queries.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TaskCounts {
  pub pending: i64,
  pub in_progress: i64,
  pub completed: i64,
  pub failed: i64,
}

impl TaskCounts {
  pub fn total(&self) -> i64 {
    self.pending + self.in_progress + self.completed + self.failed
  }
}
