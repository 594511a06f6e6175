pub mod config;
pub mod container;
pub mod error;
pub mod logger;
pub mod stage;
pub mod update;

use update::Log;

/// Unix timestamp in milliseconds.
pub fn brinx_timestamp() -> i64 {
  chrono::Utc::now().timestamp_millis()
}

pub fn all_logs_success(logs: &[Log]) -> bool {
  logs.iter().all(|log| log.success)
}
