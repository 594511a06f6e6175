use brinx_client::entities::update::Log;
use formatting::{failed, muted, success};

/// Emits a finished step at INFO (with the `SUCCESS` tag)
/// or at ERROR with the trimmed failure output.
pub fn log_step(log: &Log) {
  let elapsed = log.end_ts.saturating_sub(log.start_ts);
  if log.success {
    info!(
      "{} {} {}",
      success(),
      log.stage,
      muted(format!("({elapsed}ms) {}", log.command))
    );
    if !log.stdout.trim().is_empty() {
      debug!("{}: {}", log.stage, log.stdout.trim());
    }
  } else {
    error!(
      "{} {} | {} {}",
      failed(),
      log.stage,
      log.failure_reason(),
      muted(&log.command)
    );
  }
}
