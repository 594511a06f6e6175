use std::{
  collections::HashSet, path::Path, sync::OnceLock, time::Duration,
};

use anyhow::{Context, anyhow};
use bollard::{
  Docker,
  query_parameters::{
    InspectContainerOptions, ListContainersOptions,
    ListNetworksOptions,
  },
};
use brinx_client::entities::{
  config::FirewallRule,
  container::{ContainerListItem, ContainerState, DesiredContainer},
  update::Log,
};
use command::{
  command_exists, run_logged_shell_command,
  run_logged_shell_command_with_timeout,
  run_logged_standard_command, run_standard_command,
};

use crate::docker::{
  docker_run_command, remove_container_command,
  stop_container_command,
};

use super::{
  FirewallStatus, HostEnvironment,
  parse::{lspci_has_nvidia, parse_listening_ports, parse_ufw_status},
};

/// The real host. Runtime reads go through the docker api,
/// everything else through the system tools.
#[derive(Default)]
pub struct SystemHost {
  docker: OnceLock<Docker>,
}

impl SystemHost {
  /// The runtime may be installed mid-run, so the client
  /// is only built on first use.
  fn docker(&self) -> anyhow::Result<&Docker> {
    if let Some(docker) = self.docker.get() {
      return Ok(docker);
    }
    let docker = Docker::connect_with_defaults()
      .context("Failed to connect to docker api")?;
    Ok(self.docker.get_or_init(|| docker))
  }
}

/// Reads stdout of a query command, or errors with its stderr.
async fn query_stdout(command: &str) -> anyhow::Result<String> {
  let output = run_standard_command(command, None).await;
  if output.success() {
    Ok(output.stdout)
  } else {
    Err(anyhow!(
      "'{command}' failed | {}",
      output.stderr.trim()
    ))
  }
}

fn convert_container_state(
  state: bollard::models::ContainerSummaryStateEnum,
) -> ContainerState {
  use bollard::models::ContainerSummaryStateEnum as State;
  match state {
    State::EMPTY => ContainerState::Unknown,
    State::CREATED => ContainerState::Created,
    State::RUNNING => ContainerState::Running,
    State::PAUSED => ContainerState::Paused,
    State::RESTARTING => ContainerState::Restarting,
    State::REMOVING => ContainerState::Removing,
    State::EXITED => ContainerState::Exited,
    State::DEAD => ContainerState::Dead,
  }
}

impl HostEnvironment for SystemHost {
  async fn tool_available(&self, tool: &str) -> bool {
    command_exists(tool).await
  }

  async fn architecture(&self) -> anyhow::Result<String> {
    query_stdout("uname -m")
      .await
      .map(|arch| arch.trim().to_string())
  }

  async fn gpu_present(&self) -> anyhow::Result<bool> {
    query_stdout("lspci")
      .await
      .map(|output| lspci_has_nvidia(&output))
  }

  async fn bound_ports(&self) -> anyhow::Result<HashSet<u16>> {
    query_stdout("ss -Htuln")
      .await
      .map(|output| parse_listening_ports(&output))
  }

  async fn list_containers(
    &self,
  ) -> anyhow::Result<Vec<ContainerListItem>> {
    let containers = self
      .docker()?
      .list_containers(Some(ListContainersOptions {
        all: true,
        ..Default::default()
      }))
      .await
      .context("Failed to query for container list")?
      .into_iter()
      .map(|container| ContainerListItem {
        name: container
          .names
          .and_then(|names| names.into_iter().next())
          .map(|name| name.trim_start_matches('/').to_string())
          .unwrap_or_default(),
        image: container.image.unwrap_or_default(),
        state: container
          .state
          .map(convert_container_state)
          .unwrap_or_default(),
      })
      .collect();
    Ok(containers)
  }

  async fn container_running(&self, name: &str) -> anyhow::Result<bool> {
    let container = self
      .docker()?
      .inspect_container(name, Option::<InspectContainerOptions>::None)
      .await
      .with_context(|| {
        format!("Failed to inspect container {name}")
      })?;
    // A restarting container also reports running.
    let running = container.state.is_some_and(|state| {
      state.running.unwrap_or_default()
        && !state.restarting.unwrap_or_default()
        && !state.paused.unwrap_or_default()
    });
    Ok(running)
  }

  async fn stop_container(&self, name: &str) -> Log {
    run_logged_standard_command(
      "Docker Stop",
      None,
      stop_container_command(name),
    )
    .await
  }

  async fn remove_container(&self, name: &str) -> Log {
    run_logged_standard_command(
      "Docker Remove",
      None,
      remove_container_command(name),
    )
    .await
  }

  async fn run_container(&self, container: &DesiredContainer) -> Log {
    match docker_run_command(container) {
      Ok(command) => {
        run_logged_standard_command("Docker Run", None, command).await
      }
      Err(e) => Log::error(
        "Docker Run",
        format!("Unable to generate valid docker run command | {e:#}"),
      ),
    }
  }

  async fn pull_image(&self, image: &str) -> Log {
    run_logged_standard_command(
      "Docker Pull",
      None,
      format!("docker pull {image}"),
    )
    .await
  }

  async fn network_exists(&self, network: &str) -> anyhow::Result<bool> {
    let networks = self
      .docker()?
      .list_networks(Option::<ListNetworksOptions>::None)
      .await
      .context("Failed to query for network list")?;
    Ok(
      networks
        .iter()
        .any(|existing| existing.name.as_deref() == Some(network)),
    )
  }

  async fn create_network(&self, network: &str) -> Log {
    run_logged_standard_command(
      "Create Network",
      None,
      format!("docker network create {network}"),
    )
    .await
  }

  async fn firewall_status(&self) -> anyhow::Result<FirewallStatus> {
    query_stdout("ufw status")
      .await
      .map(|output| parse_ufw_status(&output))
  }

  async fn allow_firewall_rule(&self, rule: FirewallRule) -> Log {
    run_logged_standard_command(
      "Firewall Allow",
      None,
      format!("ufw allow {rule}"),
    )
    .await
  }

  async fn enable_firewall(&self) -> Log {
    run_logged_standard_command(
      "Firewall Enable",
      None,
      "ufw --force enable",
    )
    .await
  }

  async fn install_packages(&self, packages: &[String]) -> Log {
    run_logged_shell_command(
      "Install Packages",
      None,
      format!(
        "DEBIAN_FRONTEND=noninteractive apt-get update \
         && DEBIAN_FRONTEND=noninteractive apt-get install -y {}",
        packages.join(" ")
      ),
    )
    .await
  }

  async fn configure_gpu_runtime(&self) -> Vec<Log> {
    let mut logs = Vec::new();
    let configure = run_logged_standard_command(
      "Configure GPU Runtime",
      None,
      "nvidia-ctk runtime configure --runtime=docker",
    )
    .await;
    let success = configure.success;
    logs.push(configure);
    if success {
      logs.push(
        run_logged_standard_command(
          "Restart Docker",
          None,
          "systemctl restart docker",
        )
        .await,
      );
    }
    logs
  }

  async fn fetch_installer(
    &self,
    repo: &str,
    destination: &Path,
    timeout: Duration,
  ) -> Vec<Log> {
    git::pull_or_clone(repo, destination, timeout).await
  }

  async fn run_installer(
    &self,
    directory: &Path,
    script: &str,
    timeout: Duration,
  ) -> Log {
    run_logged_shell_command_with_timeout(
      "Run Installer",
      directory,
      format!("chmod +x ./{script} && ./{script}"),
      timeout,
    )
    .await
  }
}
