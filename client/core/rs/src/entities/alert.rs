use serde::{Deserialize, Serialize};

use super::container::WorkerReportedStatus;

/// The value stored at KV key `container_alert:<worker_id>`. Created
/// when a worker reports `needs_manual_intervention`; removed when the
/// same worker subsequently reports `running`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
  pub worker_id: String,
  pub status: WorkerReportedStatus,
  pub message: Option<String>,
  pub project_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertList {
  pub alerts: Vec<Alert>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn alert_roundtrips_through_json() {
    let alert = Alert {
      worker_id: "9f2c".to_string(),
      status: WorkerReportedStatus::NeedsManualIntervention,
      message: Some("captcha wall".to_string()),
      project_id: 7,
    };
    let encoded = serde_json::to_string(&alert).unwrap();
    let decoded: Alert = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded.worker_id, alert.worker_id);
    assert_eq!(decoded.status, alert.status);
    assert_eq!(decoded.message, alert.message);
    assert_eq!(decoded.project_id, alert.project_id);
  }
}
