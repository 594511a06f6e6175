use std::{path::Path, time::Duration};

use anyhow::anyhow;
use brinx_client::entities::{brinx_timestamp, update::Log};
use command::{
  run_logged_shell_command_with_timeout, run_standard_command,
};
use formatting::{bold, muted};

pub struct LatestCommit {
  pub hash: String,
  pub message: String,
}

/// Shallow-clones `url` into `destination`, or fast-forwards
/// an existing clone there. Both the clone and the pull are
/// bounded by `timeout`.
///
/// Returns the logs in order. The last log is the failed one
/// if any step fails.
#[tracing::instrument("PullOrClone", skip(timeout))]
pub async fn pull_or_clone(
  url: &str,
  destination: &Path,
  timeout: Duration,
) -> Vec<Log> {
  let mut logs = Vec::new();

  if destination.join(".git").is_dir() {
    let log = run_logged_shell_command_with_timeout(
      "Git Pull",
      destination,
      "git pull --ff-only",
      timeout,
    )
    .await;
    let success = log.success;
    logs.push(log);
    if !success {
      return logs;
    }
  } else {
    if let Some(parent) = destination.parent()
      && let Err(e) = tokio::fs::create_dir_all(parent).await
    {
      logs.push(Log::error(
        "Create Clone Directory",
        format!(
          "Failed to create {} | {e:?}",
          parent.display()
        ),
      ));
      return logs;
    }
    let log = run_logged_shell_command_with_timeout(
      "Git Clone",
      None,
      format!(
        "git clone --depth 1 '{url}' '{}'",
        destination.display()
      ),
      timeout,
    )
    .await;
    let success = log.success;
    logs.push(log);
    if !success {
      return logs;
    }
  }

  match get_commit_hash_log(destination).await {
    Ok(log) => logs.push(log),
    Err(e) => {
      tracing::warn!("failed to read installer commit | {e:#}")
    }
  }

  logs
}

pub async fn get_commit_hash_info(
  repo_dir: &Path,
) -> anyhow::Result<LatestCommit> {
  let hash =
    run_standard_command("git rev-parse --short HEAD", repo_dir)
      .await;
  let hash = if hash.status.success() {
    hash.stdout.trim().to_string()
  } else {
    return Err(anyhow!(
      "Failed to get short hash | {}",
      hash.stderr
    ));
  };
  let message =
    run_standard_command("git log -1 --pretty=%B", repo_dir).await;
  let message = if message.status.success() {
    message.stdout.trim().to_string()
  } else {
    return Err(anyhow!(
      "Failed to get commit message | {}",
      message.stderr
    ));
  };
  Ok(LatestCommit { hash, message })
}

pub async fn get_commit_hash_log(
  repo_dir: &Path,
) -> anyhow::Result<Log> {
  let start_ts = brinx_timestamp();
  let LatestCommit { hash, message } =
    get_commit_hash_info(repo_dir).await?;
  Ok(Log {
    stage: "Latest Commit".into(),
    command: String::from(
      "git rev-parse --short HEAD && git log -1 --pretty=%B",
    ),
    stdout: format!(
      "{} {}\n{} {}",
      muted("hash:"),
      bold(&hash),
      muted("message:"),
      bold(&message),
    ),
    stderr: String::new(),
    success: true,
    start_ts,
    end_ts: brinx_timestamp(),
  })
}
