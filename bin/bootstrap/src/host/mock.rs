//! In-memory host for tests.

use std::{
  collections::HashSet,
  path::{Path, PathBuf},
  sync::{Mutex, MutexGuard},
  time::Duration,
};

use anyhow::anyhow;
use brinx_client::entities::{
  config::FirewallRule,
  container::{
    ContainerListItem, ContainerState, DesiredContainer, PortBinding,
  },
  update::Log,
};

use super::{FirewallStatus, HostEnvironment};

/// Calls the mock can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Failure {
  BoundPorts,
  ListContainers,
  Stop,
  Remove,
  Run,
  /// `run` succeeds but the container exits right away.
  ExitsAfterStart,
  CreateNetwork,
  FirewallStatus,
  FirewallAllow,
  InstallPackages,
  GpuQuery,
  FetchInstaller,
  RunInstaller,
}

#[derive(Debug, Clone)]
pub struct MockContainer {
  pub name: String,
  pub image: String,
  pub state: ContainerState,
  pub ports: Vec<PortBinding>,
}

impl MockContainer {
  pub fn is_running(&self) -> bool {
    self.state.is_running()
  }
}

#[derive(Debug, Default)]
pub struct MockState {
  pub tools: HashSet<String>,
  pub architecture: String,
  pub gpu: bool,
  /// Ports held by processes other than containers.
  pub host_ports: HashSet<u16>,
  pub containers: Vec<MockContainer>,
  pub networks: HashSet<String>,
  pub firewall_active: bool,
  pub firewall_rules: HashSet<FirewallRule>,
  pub installed_packages: Vec<String>,
  pub pulled: Vec<String>,
  pub gpu_runtime_configured: bool,
  pub fetched_installer: Option<PathBuf>,
  pub installer_runs: u32,
  pub failures: HashSet<Failure>,
  /// Like `failures`, cleared after the first hit.
  pub fail_once: HashSet<Failure>,
  /// Names of mutating calls, in order.
  pub calls: Vec<String>,
}

impl MockState {
  pub fn add_container(
    &mut self,
    name: &str,
    image: &str,
    running: bool,
    ports: Vec<PortBinding>,
  ) {
    let state = if running {
      ContainerState::Running
    } else {
      ContainerState::Exited
    };
    self.add_container_in_state(name, image, state, ports);
  }

  pub fn add_container_in_state(
    &mut self,
    name: &str,
    image: &str,
    state: ContainerState,
    ports: Vec<PortBinding>,
  ) {
    self.containers.push(MockContainer {
      name: name.to_string(),
      image: image.to_string(),
      state,
      ports,
    });
  }

  pub fn named(&self, name: &str) -> Vec<&MockContainer> {
    self
      .containers
      .iter()
      .filter(|container| container.name == name)
      .collect()
  }

  fn fails(&self, failure: Failure) -> bool {
    self.failures.contains(&failure)
  }

  fn fails_now(&mut self, failure: Failure) -> bool {
    self.fails(failure) || self.fail_once.remove(&failure)
  }

  fn all_bound(&self) -> HashSet<u16> {
    let mut bound = self.host_ports.clone();
    // Docker keeps the published ports of crash looping
    // and paused containers reserved.
    for container in
      self.containers.iter().filter(|c| c.state.needs_stop())
    {
      bound.extend(container.ports.iter().map(|port| port.host_port));
    }
    bound
  }
}

pub struct MockHost {
  state: Mutex<MockState>,
}

impl MockHost {
  /// A host with every required tool, docker included,
  /// on `x86_64` without a GPU.
  pub fn new() -> MockHost {
    MockHost::with(|_| {})
  }

  pub fn with(configure: impl FnOnce(&mut MockState)) -> MockHost {
    let mut state = MockState {
      tools: ["git", "ufw", "ss", "docker", "lspci"]
        .map(String::from)
        .into(),
      architecture: String::from("x86_64"),
      ..Default::default()
    };
    configure(&mut state);
    MockHost {
      state: Mutex::new(state),
    }
  }

  pub fn state(&self) -> MutexGuard<'_, MockState> {
    self.state.lock().unwrap()
  }
}

fn ok(stage: &str, msg: impl Into<String>) -> Log {
  Log::simple(stage, msg.into())
}

fn err(stage: &str, msg: impl Into<String>) -> Log {
  Log::error(stage, msg.into())
}

impl HostEnvironment for MockHost {
  async fn tool_available(&self, tool: &str) -> bool {
    self.state().tools.contains(tool)
  }

  async fn architecture(&self) -> anyhow::Result<String> {
    Ok(self.state().architecture.clone())
  }

  async fn gpu_present(&self) -> anyhow::Result<bool> {
    let state = self.state();
    if state.fails(Failure::GpuQuery) {
      return Err(anyhow!("lspci: command not found"));
    }
    Ok(state.gpu)
  }

  async fn bound_ports(&self) -> anyhow::Result<HashSet<u16>> {
    let state = self.state();
    if state.fails(Failure::BoundPorts) {
      return Err(anyhow!("ss: command not found"));
    }
    Ok(state.all_bound())
  }

  async fn list_containers(
    &self,
  ) -> anyhow::Result<Vec<ContainerListItem>> {
    let mut state = self.state();
    if state.fails_now(Failure::ListContainers) {
      return Err(anyhow!("Cannot connect to the Docker daemon"));
    }
    Ok(
      state
        .containers
        .iter()
        .map(|container| ContainerListItem {
          name: container.name.clone(),
          image: container.image.clone(),
          state: container.state,
        })
        .collect(),
    )
  }

  async fn container_running(&self, name: &str) -> anyhow::Result<bool> {
    self
      .state()
      .named(name)
      .first()
      .map(|container| container.is_running())
      .ok_or_else(|| anyhow!("No such container: {name}"))
  }

  async fn stop_container(&self, name: &str) -> Log {
    let mut state = self.state();
    state.calls.push(format!("stop {name}"));
    if state.fails(Failure::Stop) {
      return err("Docker Stop", "permission denied");
    }
    let mut found = false;
    for container in
      state.containers.iter_mut().filter(|c| c.name == name)
    {
      container.state = ContainerState::Exited;
      found = true;
    }
    if found {
      ok("Docker Stop", name)
    } else {
      err("Docker Stop", format!("No such container: {name}"))
    }
  }

  async fn remove_container(&self, name: &str) -> Log {
    let mut state = self.state();
    state.calls.push(format!("rm {name}"));
    if state.fails(Failure::Remove) {
      return err("Docker Remove", "device or resource busy");
    }
    if let Some(container) = state
      .named(name)
      .into_iter()
      .find(|container| container.state.needs_stop())
    {
      return err(
        "Docker Remove",
        format!(
          "cannot remove container \"/{name}\": container is {}",
          container.state
        ),
      );
    }
    let before = state.containers.len();
    state.containers.retain(|container| container.name != name);
    if state.containers.len() < before {
      ok("Docker Remove", name)
    } else {
      err("Docker Remove", format!("No such container: {name}"))
    }
  }

  async fn run_container(&self, container: &DesiredContainer) -> Log {
    let mut state = self.state();
    state.calls.push(format!("run {}", container.name));
    if state.fails(Failure::Run) {
      return err("Docker Run", "image not found");
    }
    if !state.named(&container.name).is_empty() {
      return err(
        "Docker Run",
        format!(
          "Conflict. The container name \"/{}\" is already in use",
          container.name
        ),
      );
    }
    if let Some(network) = &container.network
      && !state.networks.contains(network)
    {
      return err("Docker Run", format!("network {network} not found"));
    }
    let bound = state.all_bound();
    if let Some(port) = container
      .ports
      .iter()
      .find(|port| bound.contains(&port.host_port))
    {
      return err(
        "Docker Run",
        format!("port {} is already allocated", port.host_port),
      );
    }
    let running = !state.fails(Failure::ExitsAfterStart);
    let ports = container.ports.clone();
    state.add_container(
      &container.name,
      &container.image,
      running,
      ports,
    );
    ok("Docker Run", &container.name)
  }

  async fn pull_image(&self, image: &str) -> Log {
    let mut state = self.state();
    state.calls.push(format!("pull {image}"));
    state.pulled.push(image.to_string());
    ok("Docker Pull", image)
  }

  async fn network_exists(&self, network: &str) -> anyhow::Result<bool> {
    Ok(self.state().networks.contains(network))
  }

  async fn create_network(&self, network: &str) -> Log {
    let mut state = self.state();
    state.calls.push(format!("network create {network}"));
    if state.fails(Failure::CreateNetwork) {
      return err("Create Network", "Cannot connect to the Docker daemon");
    }
    state.networks.insert(network.to_string());
    ok("Create Network", network)
  }

  async fn firewall_status(&self) -> anyhow::Result<FirewallStatus> {
    let state = self.state();
    if state.fails(Failure::FirewallStatus) {
      return Err(anyhow!(
        "ERROR: You need to be root to run this script"
      ));
    }
    Ok(FirewallStatus {
      active: state.firewall_active,
      rules: state.firewall_rules.clone(),
    })
  }

  async fn allow_firewall_rule(&self, rule: FirewallRule) -> Log {
    let mut state = self.state();
    state.calls.push(format!("ufw allow {rule}"));
    if state.fails(Failure::FirewallAllow) {
      return err("Firewall Allow", "ERROR: Couldn't update rules");
    }
    state.firewall_rules.insert(rule);
    ok("Firewall Allow", rule.to_string())
  }

  async fn enable_firewall(&self) -> Log {
    let mut state = self.state();
    state.calls.push(String::from("ufw enable"));
    state.firewall_active = true;
    ok("Firewall Enable", "Firewall is active")
  }

  async fn install_packages(&self, packages: &[String]) -> Log {
    let mut state = self.state();
    state.calls.push(format!("install {}", packages.join(" ")));
    if state.fails(Failure::InstallPackages) {
      return err("Install Packages", "E: Unable to locate package");
    }
    for package in packages {
      if package.starts_with("docker") {
        state.tools.insert(String::from("docker"));
      }
      state.installed_packages.push(package.clone());
    }
    ok("Install Packages", packages.join(" "))
  }

  async fn configure_gpu_runtime(&self) -> Vec<Log> {
    let mut state = self.state();
    state.calls.push(String::from("nvidia-ctk configure"));
    state.gpu_runtime_configured = true;
    vec![ok("Configure GPU Runtime", "nvidia runtime registered")]
  }

  async fn fetch_installer(
    &self,
    repo: &str,
    destination: &Path,
    _: Duration,
  ) -> Vec<Log> {
    let mut state = self.state();
    state.calls.push(format!("clone {repo}"));
    if state.fails(Failure::FetchInstaller) {
      return vec![err("Git Clone", "fatal: repository not found")];
    }
    state.fetched_installer = Some(destination.to_path_buf());
    vec![ok("Git Clone", repo)]
  }

  async fn run_installer(
    &self,
    directory: &Path,
    script: &str,
    _: Duration,
  ) -> Log {
    let mut state = self.state();
    state
      .calls
      .push(format!("run {}/{script}", directory.display()));
    if state.fails(Failure::RunInstaller) {
      return err("Run Installer", "install failed with exit code 1");
    }
    state.installer_runs += 1;
    ok("Run Installer", "worker installed")
  }
}
