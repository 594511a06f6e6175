use std::time::Duration;

use brinx_client::entities::{
  all_logs_success, config::BootstrapConfig, error::BootstrapError,
  update::Log,
};

use crate::host::HostEnvironment;

const RUNTIME_TOOL: &str = "docker";

/// Installs the container runtime if `docker` isn't callable,
/// then pulls the primary worker image.
#[instrument("EnsureRuntime", skip_all)]
pub async fn ensure_runtime<H: HostEnvironment>(
  host: &H,
  config: &BootstrapConfig,
  logs: &mut Vec<Log>,
) -> Result<(), BootstrapError> {
  if host.tool_available(RUNTIME_TOOL).await {
    logs.push(Log::simple(
      "Container Runtime",
      String::from("docker already installed"),
    ));
  } else {
    info!(
      "docker not found, installing {}",
      config.runtime_packages.join(", ")
    );
    let log = host.install_packages(&config.runtime_packages).await;
    let success = log.success;
    let reason = log.failure_reason();
    logs.push(log);
    if !success {
      return Err(BootstrapError::InstallError(format!(
        "Failed to install container runtime | {reason}"
      )));
    }
    if !host.tool_available(RUNTIME_TOOL).await {
      return Err(BootstrapError::InstallError(String::from(
        "docker is still not callable after package install",
      )));
    }
  }

  let log = host.pull_image(&config.worker_image).await;
  let success = log.success;
  let reason = log.failure_reason();
  logs.push(log);
  if !success {
    return Err(BootstrapError::InstallError(format!(
      "Failed to pull {} | {reason}",
      config.worker_image
    )));
  }

  Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuSupport {
  NotDetected,
  Installed,
}

/// Detects an NVIDIA GPU and, if one is present, installs
/// and registers the container runtime extension.
#[instrument("EnsureGpuRuntime", skip_all)]
pub async fn ensure_gpu_runtime<H: HostEnvironment>(
  host: &H,
  config: &BootstrapConfig,
  logs: &mut Vec<Log>,
) -> Result<GpuSupport, BootstrapError> {
  let present = host
    .gpu_present()
    .await
    .map_err(BootstrapError::host_query)?;
  if !present {
    logs.push(Log::simple(
      "GPU Detect",
      String::from("No NVIDIA GPU detected, running CPU only"),
    ));
    return Ok(GpuSupport::NotDetected);
  }

  info!("NVIDIA GPU detected");
  let log = host.install_packages(&config.gpu_packages).await;
  let success = log.success;
  let reason = log.failure_reason();
  logs.push(log);
  if !success {
    return Err(BootstrapError::InstallError(format!(
      "Failed to install {} | {reason}",
      config.gpu_packages.join(", ")
    )));
  }

  let configure = host.configure_gpu_runtime().await;
  let success = all_logs_success(&configure);
  let reason = configure
    .iter()
    .find(|log| !log.success)
    .map(Log::failure_reason)
    .unwrap_or_default();
  logs.extend(configure);
  if !success {
    return Err(BootstrapError::InstallError(format!(
      "Failed to configure GPU runtime | {reason}"
    )));
  }

  Ok(GpuSupport::Installed)
}

/// Fetches the external installer repository and runs its
/// install script. The exit code is the only signal read.
#[instrument(
  "ExternalInstall",
  skip_all,
  fields(repo = %config.installer.repo)
)]
pub async fn run_external_installer<H: HostEnvironment>(
  host: &H,
  config: &BootstrapConfig,
  logs: &mut Vec<Log>,
) -> Result<(), BootstrapError> {
  let installer = &config.installer;
  let timeout = Duration::from_secs(installer.timeout);
  let directory = config.workdir.join(&installer.directory);

  let fetch = host
    .fetch_installer(&installer.repo, &directory, timeout)
    .await;
  let success = !fetch.is_empty() && all_logs_success(&fetch);
  let reason = fetch
    .iter()
    .find(|log| !log.success)
    .map(Log::failure_reason)
    .unwrap_or_default();
  logs.extend(fetch);
  if !success {
    return Err(BootstrapError::InstallError(format!(
      "Failed to fetch installer from {} | {reason}",
      installer.repo
    )));
  }

  let log = host
    .run_installer(&directory, &installer.script, timeout)
    .await;
  let success = log.success;
  let reason = log.failure_reason();
  logs.push(log);
  if !success {
    return Err(BootstrapError::InstallError(format!(
      "{} failed | {reason}",
      installer.script
    )));
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use super::*;
  use crate::host::mock::{Failure, MockHost};

  #[tokio::test]
  async fn present_runtime_only_pulls_worker() {
    let host = MockHost::new();
    let config = BootstrapConfig::default();
    ensure_runtime(&host, &config, &mut Vec::new()).await.unwrap();
    let state = host.state();
    assert!(state.installed_packages.is_empty());
    assert_eq!(state.pulled, ["admier/brinxai_nodes-worker:latest"]);
  }

  #[tokio::test]
  async fn missing_runtime_is_installed() {
    let host = MockHost::with(|state| {
      state.tools.remove("docker");
    });
    let config = BootstrapConfig::default();
    ensure_runtime(&host, &config, &mut Vec::new()).await.unwrap();
    assert_eq!(host.state().installed_packages, ["docker.io"]);
  }

  #[tokio::test]
  async fn runtime_install_failure_is_fatal_error() {
    let host = MockHost::with(|state| {
      state.tools.remove("docker");
      state.failures.insert(Failure::InstallPackages);
    });
    let res =
      ensure_runtime(&host, &BootstrapConfig::default(), &mut Vec::new())
        .await;
    assert!(matches!(res, Err(BootstrapError::InstallError(_))));
    assert!(host.state().pulled.is_empty());
  }

  #[tokio::test]
  async fn no_gpu_installs_nothing() {
    let host = MockHost::new();
    let res = ensure_gpu_runtime(
      &host,
      &BootstrapConfig::default(),
      &mut Vec::new(),
    )
    .await;
    assert_eq!(res, Ok(GpuSupport::NotDetected));
    assert!(host.state().installed_packages.is_empty());
  }

  #[tokio::test]
  async fn gpu_installs_toolkit_and_configures() {
    let host = MockHost::with(|state| state.gpu = true);
    let res = ensure_gpu_runtime(
      &host,
      &BootstrapConfig::default(),
      &mut Vec::new(),
    )
    .await;
    assert_eq!(res, Ok(GpuSupport::Installed));
    let state = host.state();
    assert_eq!(state.installed_packages, ["nvidia-container-toolkit"]);
    assert!(state.gpu_runtime_configured);
  }

  #[tokio::test]
  async fn installer_is_cloned_into_workdir_then_run() {
    let host = MockHost::new();
    let config = BootstrapConfig {
      workdir: PathBuf::from("/tmp/brinx"),
      ..Default::default()
    };
    run_external_installer(&host, &config, &mut Vec::new())
      .await
      .unwrap();
    let state = host.state();
    assert_eq!(
      state.fetched_installer.as_deref(),
      Some(PathBuf::from("/tmp/brinx/BrinxAI-Worker-Nodes").as_path())
    );
    assert_eq!(state.installer_runs, 1);
  }

  #[tokio::test]
  async fn failed_fetch_never_runs_script() {
    let host = MockHost::with(|state| {
      state.failures.insert(Failure::FetchInstaller);
    });
    let res = run_external_installer(
      &host,
      &BootstrapConfig::default(),
      &mut Vec::new(),
    )
    .await;
    assert!(matches!(res, Err(BootstrapError::InstallError(_))));
    assert_eq!(host.state().installer_runs, 0);
  }
}
