use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::error::BootstrapError;

/// Declarative description of one container the
/// reconciler should leave running.
///
/// Built once per bootstrap run and never mutated afterwards.
/// The `name` is both the runtime container name and the
/// reconciliation key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredContainer {
  pub name: String,
  /// Image reference, `registry/name:tag`.
  pub image: String,
  /// Logical network to attach to.
  #[serde(default)]
  pub network: Option<String>,
  /// Published ports, in the order they are passed to the runtime.
  #[serde(default)]
  pub ports: Vec<PortBinding>,
  #[serde(default)]
  pub resource_limits: Option<ResourceLimits>,
  /// Extra kernel capabilities, eg. `NET_ADMIN`.
  #[serde(default)]
  pub capabilities: BTreeSet<String>,
}

impl DesiredContainer {
  pub fn new(
    name: impl Into<String>,
    image: impl Into<String>,
  ) -> DesiredContainer {
    DesiredContainer {
      name: name.into(),
      image: image.into(),
      network: None,
      ports: Vec::new(),
      resource_limits: None,
      capabilities: BTreeSet::new(),
    }
  }

  pub fn network(mut self, network: impl Into<String>) -> Self {
    self.network = Some(network.into());
    self
  }

  pub fn port(mut self, binding: PortBinding) -> Self {
    self.ports.push(binding);
    self
  }

  pub fn limits(mut self, limits: ResourceLimits) -> Self {
    self.resource_limits = Some(limits);
    self
  }

  pub fn capability(mut self, capability: impl Into<String>) -> Self {
    self.capabilities.insert(capability.into());
    self
  }
}

/// Which host interfaces a published port is bound to.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BindScope {
  /// Reachable only from the host itself.
  #[default]
  Loopback,
  /// Reachable from the network.
  AllInterfaces,
}

impl BindScope {
  /// Host ip prefix used in `-p {ip}:{host}:{container}`.
  pub fn host_ip(&self) -> Option<&'static str> {
    match self {
      BindScope::Loopback => Some("127.0.0.1"),
      BindScope::AllInterfaces => None,
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Protocol {
  #[default]
  Tcp,
  Udp,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct PortBinding {
  pub host_port: u16,
  pub container_port: u16,
  #[serde(default)]
  pub protocol: Protocol,
  #[serde(default)]
  pub scope: BindScope,
}

impl PortBinding {
  pub fn loopback(
    host_port: u16,
    container_port: u16,
    protocol: Protocol,
  ) -> PortBinding {
    PortBinding {
      host_port,
      container_port,
      protocol,
      scope: BindScope::Loopback,
    }
  }

  pub fn public(
    host_port: u16,
    container_port: u16,
    protocol: Protocol,
  ) -> PortBinding {
    PortBinding {
      host_port,
      container_port,
      protocol,
      scope: BindScope::AllInterfaces,
    }
  }

  /// Formats the binding as passed to `docker run -p`.
  /// Eg. `127.0.0.1:7000:7000/tcp`, `1194:1194/udp`.
  pub fn publish_arg(&self) -> String {
    let PortBinding {
      host_port,
      container_port,
      protocol,
      scope,
    } = self;
    match scope.host_ip() {
      Some(ip) => {
        format!("{ip}:{host_port}:{container_port}/{protocol}")
      }
      None => format!("{host_port}:{container_port}/{protocol}"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
  /// CPU share as a number of cores, passed as `--cpus`.
  pub cpus: f64,
  /// Hard memory cap, passed as `--memory`.
  pub memory_bytes: u64,
}

/// Runtime state of a container, as the docker api reports it.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContainerState {
  #[default]
  Unknown,
  Created,
  Running,
  Paused,
  Restarting,
  Removing,
  Exited,
  Dead,
}

impl ContainerState {
  pub fn is_running(&self) -> bool {
    matches!(self, ContainerState::Running)
  }

  /// The runtime refuses `rm` in these states until the
  /// container is stopped. Unknown is stopped to be sure.
  pub fn needs_stop(&self) -> bool {
    matches!(
      self,
      ContainerState::Running
        | ContainerState::Paused
        | ContainerState::Restarting
        | ContainerState::Unknown
    )
  }
}

/// A container as reported by the runtime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerListItem {
  /// Name without the leading `/` the runtime api reports.
  pub name: String,
  pub image: String,
  pub state: ContainerState,
}

/// Result of reconciling one [DesiredContainer].
#[derive(Debug, Clone, PartialEq, Display)]
pub enum Outcome {
  /// No container with the name existed.
  Created,
  /// An existing container with the name was torn down first.
  Recreated,
  #[strum(to_string = "Failed")]
  Failed(BootstrapError),
}

impl Outcome {
  pub fn is_failed(&self) -> bool {
    matches!(self, Outcome::Failed(_))
  }
}
