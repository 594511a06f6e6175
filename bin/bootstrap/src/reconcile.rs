use brinx_client::entities::{
  container::{ContainerListItem, DesiredContainer, Outcome},
  error::BootstrapError,
  update::Log,
};

use crate::host::HostEnvironment;

#[derive(Debug)]
pub struct ReconcileReport {
  pub name: String,
  pub outcome: Outcome,
  pub logs: Vec<Log>,
}

/// Leaves exactly one running container named `desired.name`,
/// created from `desired`.
///
/// 1. Looks up every container with the name, in any state.
/// 2. Stops (if not already stopped) and removes each. Any
///    failure here ends the reconcile with
///    [BootstrapError::TeardownError], and nothing is created.
/// 3. Creates and starts the container.
/// 4. Verifies the runtime reports it running, otherwise
///    [BootstrapError::StartError].
///
/// Running it again with the same `desired` tears down the
/// first run's container and ends in the same state.
pub async fn reconcile<H: HostEnvironment>(
  host: &H,
  desired: &DesiredContainer,
) -> ReconcileReport {
  reconcile_with(host, &desired.name, || {
    std::future::ready(Ok(desired.clone()))
  })
  .await
}

/// [reconcile], with the container built by `build` once the
/// old ones are gone. Anything they held, like published host
/// ports, is free again when `build` runs.
///
/// A `build` error ends the reconcile with nothing created.
#[instrument("Reconcile", skip_all, fields(container = name))]
pub async fn reconcile_with<H, F, Fut>(
  host: &H,
  name: &str,
  build: F,
) -> ReconcileReport
where
  H: HostEnvironment,
  F: FnOnce() -> Fut,
  Fut: Future<Output = Result<DesiredContainer, BootstrapError>>,
{
  let mut logs = Vec::new();
  let outcome =
    match reconcile_inner(host, name, build, &mut logs).await {
      Ok(outcome) => outcome,
      Err(e) => Outcome::Failed(e),
    };
  ReconcileReport {
    name: name.to_string(),
    outcome,
    logs,
  }
}

async fn reconcile_inner<H, F, Fut>(
  host: &H,
  name: &str,
  build: F,
  logs: &mut Vec<Log>,
) -> Result<Outcome, BootstrapError>
where
  H: HostEnvironment,
  F: FnOnce() -> Fut,
  Fut: Future<Output = Result<DesiredContainer, BootstrapError>>,
{
  let existing = host
    .list_containers()
    .await
    .map_err(|e| BootstrapError::TeardownError {
      name: name.to_string(),
      reason: format!("Failed to look up existing containers | {e:#}"),
    })?
    .into_iter()
    .filter(|container| container.name == name)
    .collect::<Vec<_>>();

  for container in &existing {
    teardown(host, container, logs).await?;
  }
  if !existing.is_empty() {
    debug!("removed {} existing container(s)", existing.len());
  }

  let desired = build().await?;
  debug!("creating from {}", desired.image);

  let run = host.run_container(&desired).await;
  let started = run.success;
  let reason = run.failure_reason();
  logs.push(run);
  if !started {
    return Err(BootstrapError::StartError {
      name: name.to_string(),
      reason,
    });
  }

  match host.container_running(name).await {
    Ok(true) => {}
    Ok(false) => {
      return Err(BootstrapError::StartError {
        name: name.to_string(),
        reason: String::from("container is not running after start"),
      });
    }
    Err(e) => {
      return Err(BootstrapError::StartError {
        name: name.to_string(),
        reason: format!("{e:#}"),
      });
    }
  }

  if existing.is_empty() {
    Ok(Outcome::Created)
  } else {
    Ok(Outcome::Recreated)
  }
}

/// Stop (unless already stopped), then remove.
async fn teardown<H: HostEnvironment>(
  host: &H,
  container: &ContainerListItem,
  logs: &mut Vec<Log>,
) -> Result<(), BootstrapError> {
  let teardown_error = |log: &Log| BootstrapError::TeardownError {
    name: container.name.clone(),
    reason: log.failure_reason(),
  };

  if container.state.needs_stop() {
    let log = host.stop_container(&container.name).await;
    let res = if log.success {
      Ok(())
    } else {
      Err(teardown_error(&log))
    };
    logs.push(log);
    res?;
  }

  let log = host.remove_container(&container.name).await;
  let res = if log.success {
    Ok(())
  } else {
    Err(teardown_error(&log))
  };
  logs.push(log);
  res
}

#[derive(Debug)]
pub struct RemovalReport {
  pub name: String,
  pub image: String,
  pub result: Result<(), BootstrapError>,
  pub logs: Vec<Log>,
}

/// Stops and removes every container whose name or image
/// contains `pattern`. Everything else is left alone.
/// An empty pattern matches nothing.
///
/// Errors only when the container list can't be read.
/// Individual removal failures are in the per-container reports.
#[instrument("EnsureAbsent", skip(host))]
pub async fn ensure_absent<H: HostEnvironment>(
  host: &H,
  pattern: &str,
) -> Result<Vec<RemovalReport>, BootstrapError> {
  if pattern.is_empty() {
    warn!("empty stale container pattern, skipping cleanup");
    return Ok(Vec::new());
  }

  let matching = host
    .list_containers()
    .await
    .map_err(|e| BootstrapError::TeardownError {
      name: pattern.to_string(),
      reason: format!("Failed to list containers | {e:#}"),
    })?
    .into_iter()
    .filter(|container| {
      container.name.contains(pattern)
        || container.image.contains(pattern)
    });

  let mut reports = Vec::new();
  for container in matching {
    let mut logs = Vec::new();
    let result = teardown(host, &container, &mut logs).await;
    reports.push(RemovalReport {
      name: container.name,
      image: container.image,
      result,
      logs,
    });
  }
  Ok(reports)
}
