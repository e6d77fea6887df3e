pub mod alert;
pub mod config;
pub mod container;
pub mod logger;
pub mod project;
pub mod proxy;
pub mod task;
pub mod user;

/// Sentinel used for a container's runtime-assigned id before the
/// container engine has actually started it.
pub const PENDING_EXTERNAL_ID: &str = "pending";

/// First host port handed out when no container has been allocated yet.
pub const VNC_PORT_START: i32 = 30000;

/// Prefix of every alert key stored in the KV store.
pub const CONTAINER_ALERT_PREFIX: &str = "container_alert:";
