use serde::{Deserialize, Serialize};

use super::brinx_timestamp;

/// Record of one external invocation (or synthetic step)
/// made during a bootstrap run.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Log {
  /// A short description of the step.
  pub stage: String,
  /// The command which was executed.
  pub command: String,
  /// The output of the command in the standard channel.
  pub stdout: String,
  /// The output of the command in the error channel.
  pub stderr: String,
  /// Whether the command run was successful.
  pub success: bool,
  /// The start time of the command execution.
  pub start_ts: i64,
  /// The end time of the command execution.
  pub end_ts: i64,
}

impl Log {
  pub fn simple(stage: &str, msg: String) -> Log {
    let ts = brinx_timestamp();
    Log {
      stage: stage.to_string(),
      stdout: msg,
      success: true,
      start_ts: ts,
      end_ts: ts,
      ..Default::default()
    }
  }

  pub fn error(stage: &str, msg: String) -> Log {
    let ts = brinx_timestamp();
    Log {
      stage: stage.to_string(),
      stderr: msg,
      start_ts: ts,
      end_ts: ts,
      success: false,
      ..Default::default()
    }
  }

  /// The trimmed stderr, falling back to stdout when stderr is empty.
  /// Used as the failure reason when a command does not succeed.
  pub fn failure_reason(&self) -> String {
    let stderr = self.stderr.trim();
    if stderr.is_empty() {
      self.stdout.trim().to_string()
    } else {
      stderr.to_string()
    }
  }
}
