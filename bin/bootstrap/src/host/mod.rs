use std::{collections::HashSet, path::Path, time::Duration};

use brinx_client::entities::{
  config::FirewallRule,
  container::{ContainerListItem, DesiredContainer},
  update::Log,
};

mod parse;
mod system;

#[cfg(test)]
pub mod mock;

pub use system::SystemHost;

/// Current firewall state as reported by the firewall tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FirewallStatus {
  pub active: bool,
  pub rules: HashSet<FirewallRule>,
}

/// The single handle to everything mutable on the host:
/// the container runtime, the firewall, the package manager,
/// and host introspection.
///
/// Every component takes one of these, so side effects
/// are visible at the call sites. Mutating calls return a [Log]
/// of what ran, queries return a result.
pub trait HostEnvironment {
  /// Whether `tool` is callable on the PATH.
  async fn tool_available(&self, tool: &str) -> bool;

  /// Machine hardware name, as `uname -m` reports it.
  async fn architecture(&self) -> anyhow::Result<String>;

  /// Whether an NVIDIA device shows up on the PCI bus.
  async fn gpu_present(&self) -> anyhow::Result<bool>;

  /// Every TCP / UDP port currently bound on any interface.
  async fn bound_ports(&self) -> anyhow::Result<HashSet<u16>>;

  // =========
  //  RUNTIME
  // =========

  /// All containers in any state.
  async fn list_containers(
    &self,
  ) -> anyhow::Result<Vec<ContainerListItem>>;

  /// Up and not restarting or paused.
  async fn container_running(&self, name: &str) -> anyhow::Result<bool>;

  async fn stop_container(&self, name: &str) -> Log;

  async fn remove_container(&self, name: &str) -> Log;

  /// Create and start in one step.
  async fn run_container(&self, container: &DesiredContainer) -> Log;

  async fn pull_image(&self, image: &str) -> Log;

  async fn network_exists(&self, network: &str) -> anyhow::Result<bool>;

  async fn create_network(&self, network: &str) -> Log;

  // ==========
  //  FIREWALL
  // ==========

  async fn firewall_status(&self) -> anyhow::Result<FirewallStatus>;

  async fn allow_firewall_rule(&self, rule: FirewallRule) -> Log;

  async fn enable_firewall(&self) -> Log;

  // ==========
  //  PACKAGES
  // ==========

  async fn install_packages(&self, packages: &[String]) -> Log;

  /// Registers the NVIDIA runtime with the container
  /// runtime and restarts it.
  async fn configure_gpu_runtime(&self) -> Vec<Log>;

  // ====================
  //  EXTERNAL INSTALLER
  // ====================

  /// Clone (or update) the installer repository.
  async fn fetch_installer(
    &self,
    repo: &str,
    destination: &Path,
    timeout: Duration,
  ) -> Vec<Log>;

  /// Runs `script` with the clone at `directory` as working dir.
  async fn run_installer(
    &self,
    directory: &Path,
    script: &str,
    timeout: Duration,
  ) -> Log;
}
