//! Thin wrapper over a Redis-class key-value store, providing hash,
//! list, key-value and counter operations with string values (§2,
//! §6). Every key name and hash-field convention used by the proxy
//! group manager and the alert store is owned by the caller; this
//! crate only knows how to move strings in and out of Redis.

use anyhow::Context;
use redis::{AsyncCommands, aio::MultiplexedConnection};

#[derive(Clone)]
pub struct KvStore {
  client: redis::Client,
}

impl KvStore {
  pub fn new(redis_url: &str) -> anyhow::Result<Self> {
    let client =
      redis::Client::open(redis_url).context("failed to build redis client")?;
    Ok(Self { client })
  }

  async fn conn(&self) -> anyhow::Result<MultiplexedConnection> {
    self
      .client
      .get_multiplexed_async_connection()
      .await
      .context("failed to open redis connection")
  }

  // -- key/value --

  pub async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
    let mut conn = self.conn().await?;
    conn.get(key).await.context("redis GET failed")
  }

  pub async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
    let mut conn = self.conn().await?;
    conn.set(key, value).await.context("redis SET failed")
  }

  pub async fn del(&self, key: &str) -> anyhow::Result<()> {
    let mut conn = self.conn().await?;
    let _: () = conn.del(key).await.context("redis DEL failed")?;
    Ok(())
  }

  pub async fn keys_with_prefix(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
    let mut conn = self.conn().await?;
    conn
      .keys(format!("{prefix}*"))
      .await
      .context("redis KEYS failed")
  }

  // -- counters --

  pub async fn incr(&self, key: &str) -> anyhow::Result<i64> {
    let mut conn = self.conn().await?;
    conn.incr(key, 1).await.context("redis INCR failed")
  }

  // -- hashes --

  pub async fn hget(&self, key: &str, field: &str) -> anyhow::Result<Option<String>> {
    let mut conn = self.conn().await?;
    conn.hget(key, field).await.context("redis HGET failed")
  }

  pub async fn hset(&self, key: &str, field: &str, value: &str) -> anyhow::Result<()> {
    let mut conn = self.conn().await?;
    conn.hset(key, field, value).await.context("redis HSET failed")
  }

  pub async fn hdel(&self, key: &str, field: &str) -> anyhow::Result<()> {
    let mut conn = self.conn().await?;
    let _: () = conn.hdel(key, field).await.context("redis HDEL failed")?;
    Ok(())
  }

  pub async fn hgetall(&self, key: &str) -> anyhow::Result<Vec<(String, String)>> {
    let mut conn = self.conn().await?;
    conn.hgetall(key).await.context("redis HGETALL failed")
  }

  // -- lists --

  pub async fn lrange_all(&self, key: &str) -> anyhow::Result<Vec<String>> {
    let mut conn = self.conn().await?;
    conn.lrange(key, 0, -1).await.context("redis LRANGE failed")
  }

  /// Atomically replaces the list at `key` with `values`, preserving
  /// order.
  pub async fn replace_list(&self, key: &str, values: &[String]) -> anyhow::Result<()> {
    let mut conn = self.conn().await?;
    let mut pipe = redis::pipe();
    pipe.atomic().del(key);
    if !values.is_empty() {
      pipe.rpush(key, values);
    }
    pipe
      .query_async::<()>(&mut conn)
      .await
      .context("redis list replace pipeline failed")
  }
}

#[cfg(test)]
mod tests {
  // Exercised against a live redis instance in integration tests; no
  // pure logic lives in this crate to unit test in isolation.
}
