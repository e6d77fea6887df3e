pub mod entities;
pub mod error;

/// Unix timestamp, in milliseconds, matching the wire format used
/// throughout the relational store and KV store.
pub fn dispider_timestamp() -> i64 {
  chrono::Utc::now().timestamp_millis()
}

pub fn optional_string(s: impl Into<String>) -> Option<String> {
  let s = s.into();
  if s.is_empty() { None } else { Some(s) }
}
