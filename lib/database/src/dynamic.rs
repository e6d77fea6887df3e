//! Safely names, creates, drops, describes and bulk-inserts into the
//! per-project task/result tables whose column set is user-defined.
//! This is the only module that composes a table or column name into
//! a SQL string; every other caller goes through parameterized binds.

use std::collections::HashMap;

use anyhow::{Context, anyhow};
use dispider_client::{
  entities::task::{RESULT_FIXED_COLUMNS, TASK_FIXED_COLUMNS},
  error::{DispiderResult, ErrorKind, WithErrorKind},
};
use validations::{StringValidator, StringValidatorMatches};

pub fn task_table_name(project_id: i64) -> String {
  format!("project_{project_id}_tasks")
}

pub fn result_table_name(project_id: i64) -> String {
  format!("project_{project_id}_results")
}

/// Validates a single user-declared column name: must match the
/// identifier shape and must not collide with a fixed system column.
pub fn validate_column_name(
  name: &str,
  reserved: &[&str],
) -> DispiderResult<()> {
  StringValidator::default()
    .min_length(1)
    .max_length(63)
    .matches(StringValidatorMatches::ColumnIdentifier)
    .validate(name)
    .kind(ErrorKind::InvalidArgument)?;
  if reserved.contains(&name) {
    return Err(dispider_client::error::DispiderError::new(
      ErrorKind::InvalidArgument,
      anyhow!("column name '{name}' is reserved"),
    ));
  }
  Ok(())
}

pub fn validate_task_column_names(names: &[String]) -> DispiderResult<()> {
  for name in names {
    validate_column_name(name, TASK_FIXED_COLUMNS)?;
  }
  Ok(())
}

pub fn validate_result_column_names(names: &[String]) -> DispiderResult<()> {
  for name in names {
    validate_column_name(name, RESULT_FIXED_COLUMNS)?;
  }
  Ok(())
}

/// A validated, quote-safe identifier. The only way to construct one
/// is through [`validate_column_name`] or a name already known to be
/// a literal (table names, which are numeric-suffixed and never
/// user-controlled beyond the project id).
fn quote_ident(ident: &str) -> String {
  format!("\"{}\"", ident.replace('"', "\"\""))
}

pub async fn create_or_recreate_task_table(
  pool: &sqlx::PgPool,
  project_id: i64,
  columns: &[String],
) -> anyhow::Result<()> {
  let table = task_table_name(project_id);
  let user_cols = columns
    .iter()
    .map(|c| format!("{} TEXT", quote_ident(c)))
    .collect::<Vec<_>>()
    .join(", ");
  let user_cols_sql =
    if user_cols.is_empty() { String::new() } else { format!(", {user_cols}") };

  let mut tx = pool.begin().await.context("failed to open transaction")?;
  sqlx::query(&format!("DROP TABLE IF EXISTS {} CASCADE", quote_ident(&table)))
    .execute(&mut *tx)
    .await
    .context("failed to drop existing task table")?;
  sqlx::query(&format!(
    "CREATE TABLE {} (\
       id BIGSERIAL PRIMARY KEY, \
       status TEXT NOT NULL DEFAULT 'pending', \
       worker_id TEXT, \
       claimed_at TIMESTAMPTZ, \
       retry_count INT NOT NULL DEFAULT 0{user_cols_sql}\
     )",
    quote_ident(&table)
  ))
  .execute(&mut *tx)
  .await
  .context("failed to create task table")?;
  tx.commit().await.context("failed to commit table creation")?;
  Ok(())
}

pub async fn create_or_recreate_result_table(
  pool: &sqlx::PgPool,
  project_id: i64,
  columns: &[String],
) -> anyhow::Result<()> {
  let table = result_table_name(project_id);
  let user_cols = columns
    .iter()
    .map(|c| format!("{} TEXT", quote_ident(c)))
    .collect::<Vec<_>>()
    .join(", ");
  let user_cols_sql =
    if user_cols.is_empty() { String::new() } else { format!(", {user_cols}") };

  let mut tx = pool.begin().await.context("failed to open transaction")?;
  sqlx::query(&format!("DROP TABLE IF EXISTS {} CASCADE", quote_ident(&table)))
    .execute(&mut *tx)
    .await
    .context("failed to drop existing result table")?;
  sqlx::query(&format!(
    "CREATE TABLE {} (\
       id BIGSERIAL PRIMARY KEY, \
       task_id BIGINT NOT NULL, \
       note TEXT{user_cols_sql}\
     )",
    quote_ident(&table)
  ))
  .execute(&mut *tx)
  .await
  .context("failed to create result table")?;
  tx.commit().await.context("failed to commit table creation")?;
  Ok(())
}

/// Returns the user-declared columns of `table`, in catalog order,
/// with the fixed system columns filtered out. Empty if the table
/// does not exist.
pub async fn describe_user_columns(
  pool: &sqlx::PgPool,
  table: &str,
  fixed: &[&str],
) -> anyhow::Result<Vec<String>> {
  let rows: Vec<(String,)> = sqlx::query_as(
    "SELECT column_name FROM information_schema.columns \
     WHERE table_schema = 'public' AND table_name = $1 \
     ORDER BY ordinal_position",
  )
  .bind(table)
  .fetch_all(pool)
  .await
  .context("failed to describe table columns")?;

  Ok(
    rows
      .into_iter()
      .map(|(name,)| name)
      .filter(|name| !fixed.contains(&name.as_str()))
      .collect(),
  )
}

/// Bulk inserts a columnar batch `{column -> values}` into `table`.
/// All value lists must have equal, non-zero length; the column set
/// must be non-empty. Returns the number of rows inserted.
pub async fn bulk_insert<'e, E>(
  executor: E,
  table: &str,
  columnar: &HashMap<String, Vec<String>>,
) -> DispiderResult<u64>
where
  E: sqlx::PgExecutor<'e>,
{
  if columnar.is_empty() {
    return Err(dispider_client::error::DispiderError::new(
      ErrorKind::InvalidArgument,
      anyhow!("no columns supplied for bulk insert"),
    ));
  }
  let mut columns: Vec<&String> = columnar.keys().collect();
  columns.sort();
  let row_count = columnar[columns[0]].len();
  if row_count == 0 {
    return Err(dispider_client::error::DispiderError::new(
      ErrorKind::InvalidArgument,
      anyhow!("bulk insert requires at least one row"),
    ));
  }
  for col in &columns {
    if columnar[*col].len() != row_count {
      return Err(dispider_client::error::DispiderError::new(
        ErrorKind::InvalidArgument,
        anyhow!("column '{col}' length does not match the others"),
      ));
    }
  }

  let column_list = columns
    .iter()
    .map(|c| quote_ident(c))
    .collect::<Vec<_>>()
    .join(", ");
  let mut builder = sqlx::QueryBuilder::new(format!(
    "INSERT INTO {} ({column_list})",
    quote_ident(table)
  ));
  builder.push_values(0..row_count, |mut row, i| {
    for col in &columns {
      row.push_bind(columnar[*col][i].clone());
    }
  });

  let result = builder
    .build()
    .execute(executor)
    .await
    .context("bulk insert failed")
    .kind(ErrorKind::Internal)?;
  Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn table_names_follow_project_id() {
    assert_eq!(task_table_name(7), "project_7_tasks");
    assert_eq!(result_table_name(7), "project_7_results");
  }

  #[test]
  fn rejects_reserved_task_column() {
    assert!(validate_task_column_names(&["worker_id".to_string()]).is_err());
    assert!(validate_task_column_names(&["retry_count".to_string()]).is_err());
  }

  #[test]
  fn rejects_reserved_result_column() {
    assert!(validate_result_column_names(&["task_id".to_string()]).is_err());
  }

  #[test]
  fn accepts_user_column() {
    assert!(validate_task_column_names(&["url".to_string()]).is_ok());
  }

  #[test]
  fn rejects_invalid_shape() {
    assert!(validate_task_column_names(&["2cool".to_string()]).is_err());
    assert!(validate_task_column_names(&["bad;col".to_string()]).is_err());
  }

  #[test]
  fn quote_ident_escapes_quotes() {
    assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
  }
}
