use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

pub mod containers;
pub mod dynamic;
pub mod projects;
pub mod tasks;

/// Thin wrapper over a shared connection pool. Constructed once at
/// startup by the composition root and handed to request handlers by
/// reference (see `bin/core/src/state.rs::db_client`).
#[derive(Clone)]
pub struct Client {
  pub pool: sqlx::PgPool,
}

impl Client {
  pub async fn new(database_url: &str) -> anyhow::Result<Self> {
    let pool = PgPoolOptions::new()
      .max_connections(20)
      .acquire_timeout(Duration::from_secs(10))
      .connect(database_url)
      .await
      .context("failed to connect to postgres")?;
    Ok(Self { pool })
  }
}

#[cfg(test)]
mod pool_tests {
  // Connection-level behavior can only be exercised against a live
  // postgres instance; the query-building and state-machine logic in
  // `dynamic`, `tasks` and `containers` is what gets unit tested here.
}
