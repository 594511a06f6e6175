use std::fmt::Write;

use anyhow::Context;
use brinx_client::entities::container::{
  DesiredContainer, ResourceLimits,
};

/// Containers come back after a host reboot.
const RESTART_POLICY: &str = "unless-stopped";

pub fn docker_run_command(
  DesiredContainer {
    name,
    image,
    network,
    ports,
    resource_limits,
    capabilities,
  }: &DesiredContainer,
) -> anyhow::Result<String> {
  let mut res = format!(
    "docker run -d --name {name} --restart {RESTART_POLICY}"
  );

  if let Some(network) = network {
    write!(&mut res, " --network {network}")
      .context("Failed to write network")?;
  }

  for port in ports {
    write!(&mut res, " -p {}", port.publish_arg())
      .context("Failed to write port")?;
  }

  if let Some(limits) = resource_limits {
    push_limits(&mut res, limits)?;
  }

  for capability in capabilities {
    write!(&mut res, " --cap-add {capability}")
      .context("Failed to write capability")?;
  }

  write!(&mut res, " {image}")?;

  Ok(res)
}

fn push_limits(
  command: &mut String,
  ResourceLimits { cpus, memory_bytes }: &ResourceLimits,
) -> anyhow::Result<()> {
  write!(command, " --cpus {cpus} --memory {memory_bytes}b")
    .context("Failed to write resource limits")
}

pub fn stop_container_command(container_name: &str) -> String {
  format!("docker stop {container_name}")
}

pub fn remove_container_command(container_name: &str) -> String {
  format!("docker rm {container_name}")
}

#[cfg(test)]
mod tests {
  use brinx_client::entities::container::{PortBinding, Protocol};

  use super::*;

  #[test]
  fn auxiliary_run_command_is_loopback_and_limited() {
    let container = DesiredContainer::new(
      "rembg",
      "admier/brinxai_nodes-rembg:latest",
    )
    .network("brinxai-network")
    .port(PortBinding::loopback(7001, 7000, Protocol::Tcp))
    .limits(ResourceLimits {
      cpus: 2.0,
      memory_bytes: 2147483648,
    });
    assert_eq!(
      docker_run_command(&container).unwrap(),
      "docker run -d --name rembg --restart unless-stopped \
       --network brinxai-network -p 127.0.0.1:7001:7000/tcp \
       --cpus 2 --memory 2147483648b admier/brinxai_nodes-rembg:latest"
    );
  }

  #[test]
  fn relay_run_command_publishes_with_capability() {
    let container = DesiredContainer::new(
      "brinxai_relay",
      "admier/brinxai_nodes-relay:arm64",
    )
    .port(PortBinding::public(1194, 1194, Protocol::Udp))
    .capability("NET_ADMIN");
    assert_eq!(
      docker_run_command(&container).unwrap(),
      "docker run -d --name brinxai_relay --restart unless-stopped \
       -p 1194:1194/udp --cap-add NET_ADMIN \
       admier/brinxai_nodes-relay:arm64"
    );
  }
}
