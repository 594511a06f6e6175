//! # Configuring the BrinxAI Node Bootstrapper
//!
//! The bootstrap configuration is passed in three ways:
//! 1. Command line args ([CliArgs])
//! 2. Environment Variables ([Env])
//! 3. Configuration File ([BootstrapConfig])
//!
//! The final configuration is built by combining parameters
//! passed through the different methods. The priority of the args is
//! strictly hierarchical, meaning params passed with [CliArgs] have top priority,
//! followed by those passed in the environment, followed by those passed in
//! the configuration file.

use std::{
  num::{NonZeroU16, NonZeroU32},
  path::PathBuf,
};

use clap::Parser;
use serde::Deserialize;

use super::{
  container::{
    DesiredContainer, PortBinding, Protocol, ResourceLimits,
  },
  logger::{LogConfig, LogLevel, StdioLogMode},
  stage::Stage,
};

/// # Bootstrap Command Line Arguments.
///
/// Example command:
/// ```sh
/// brinx-bootstrap \
///   --config-path /etc/brinxai/bootstrap.toml \
///   --skip gpu-detect \
///   --log-level debug
/// ```
#[derive(Debug, Parser)]
#[command(name = "brinx-bootstrap", author, about, version)]
pub struct CliArgs {
  /// Sets the path of the config file to use.
  #[arg(long, short = 'c')]
  pub config_path: Option<PathBuf>,

  /// Skip a stage. Can use multiple times.
  #[arg(long, value_enum)]
  pub skip: Vec<Stage>,

  /// Directory the external installer is cloned into.
  #[arg(long)]
  pub workdir: Option<PathBuf>,

  /// Upper bound in seconds for the installer clone and script run.
  #[arg(long)]
  pub installer_timeout: Option<u64>,

  /// Configure the logging level: error, warn, info, debug, trace.
  /// Default: info
  /// If passed, will override any other log_level set.
  #[arg(long)]
  pub log_level: Option<tracing::Level>,
}

/// # Bootstrap Environment Variables
///
/// The variables should be passed in the traditional `UPPER_SNAKE_CASE` format,
/// although the lower case format can still be parsed. If equivalent paramater is passed
/// in [CliArgs], the value passed to the environment will be ignored in favor of the cli arg.
#[derive(Debug, Default, Deserialize)]
pub struct Env {
  /// Specify the config file used to build up the final [BootstrapConfig].
  /// If not provided, will use Default config.
  pub brinx_config_path: Option<PathBuf>,

  /// Override `network`
  pub brinx_network: Option<String>,
  /// Override `stale_pattern`
  pub brinx_stale_pattern: Option<String>,
  /// Override `port_scan_window`
  pub brinx_port_scan_window: Option<NonZeroU32>,
  /// Override `workdir`
  pub brinx_workdir: Option<PathBuf>,
  /// Override `installer.repo`
  pub brinx_installer_repo: Option<String>,
  /// Override `installer.timeout`
  pub brinx_installer_timeout: Option<u64>,

  // LOGGING
  /// Override `logging.level`
  pub brinx_logging_level: Option<LogLevel>,
  /// Override `logging.stdio`
  pub brinx_logging_stdio: Option<StdioLogMode>,
  /// Override `logging.pretty`
  pub brinx_logging_pretty: Option<bool>,
  /// Override `logging.location`
  pub brinx_logging_location: Option<bool>,
  /// Override `logging.ansi`
  pub brinx_logging_ansi: Option<bool>,
}

/// # Bootstrap Configuration File
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
  /// Shared network the auxiliary services attach to.
  /// Default: `brinxai-network`
  #[serde(default = "default_network")]
  pub network: String,

  /// Containers whose name or image contain this
  /// are removed during stale cleanup.
  /// Default: `admier/brinxai_nodes`
  #[serde(default = "default_stale_pattern")]
  pub stale_pattern: String,

  /// Tools which must be callable before anything runs.
  /// `lspci` is left out, a host without it just skips
  /// GPU setup.
  /// Default: `git`, `ufw`, `ss`
  #[serde(default = "default_required_tools")]
  pub required_tools: Vec<String>,

  /// Ports opened in the firewall during FirewallEnsure.
  /// Default: `22/tcp`, `5011/tcp`
  #[serde(default = "default_firewall_ports")]
  pub firewall_ports: Vec<FirewallRule>,

  /// Packages installed when the container runtime is absent.
  /// Default: `docker.io`
  #[serde(default = "default_runtime_packages")]
  pub runtime_packages: Vec<String>,

  /// Packages installed when an NVIDIA GPU is detected.
  /// Default: `nvidia-container-toolkit`
  #[serde(default = "default_gpu_packages")]
  pub gpu_packages: Vec<String>,

  /// The primary worker image, pulled during RuntimeInstall.
  #[serde(default = "default_worker_image")]
  pub worker_image: String,

  /// Upper bound on ports checked per allocation. Must be
  /// at least 1.
  /// Default: `1000`
  #[serde(default = "default_port_scan_window")]
  pub port_scan_window: NonZeroU32,

  /// Working directory for the installer clone.
  /// Default: `/opt/brinxai`
  #[serde(default = "default_workdir")]
  pub workdir: PathBuf,

  #[serde(default)]
  pub installer: InstallerConfig,

  /// Auxiliary containers, reconciled in order.
  #[serde(default = "default_services", alias = "service")]
  pub services: Vec<AuxiliaryServiceConfig>,

  #[serde(default)]
  pub relay: RelayConfig,

  /// Stages not to run.
  #[serde(default)]
  pub skip_stages: Vec<Stage>,

  /// Logging configuration
  #[serde(default)]
  pub logging: LogConfig,
}

fn default_network() -> String {
  String::from("brinxai-network")
}

fn default_stale_pattern() -> String {
  String::from("admier/brinxai_nodes")
}

fn default_required_tools() -> Vec<String> {
  ["git", "ufw", "ss"].map(String::from).to_vec()
}

fn default_firewall_ports() -> Vec<FirewallRule> {
  vec![
    FirewallRule::new(22, Protocol::Tcp),
    FirewallRule::new(5011, Protocol::Tcp),
  ]
}

fn default_runtime_packages() -> Vec<String> {
  vec![String::from("docker.io")]
}

fn default_gpu_packages() -> Vec<String> {
  vec![String::from("nvidia-container-toolkit")]
}

fn default_worker_image() -> String {
  String::from("admier/brinxai_nodes-worker:latest")
}

fn default_port_scan_window() -> NonZeroU32 {
  PORT_SCAN_WINDOW
}

fn default_workdir() -> PathBuf {
  PathBuf::from("/opt/brinxai")
}

/// 2 GiB
const DEFAULT_SERVICE_MEMORY: u64 = 2 * 1024 * 1024 * 1024;

const PORT_SCAN_WINDOW: NonZeroU32 = NonZeroU32::new(1000).unwrap();

const REMBG_PORT: NonZeroU16 = NonZeroU16::new(7000).unwrap();
const UPSCALER_PORT: NonZeroU16 = NonZeroU16::new(3000).unwrap();

fn default_services() -> Vec<AuxiliaryServiceConfig> {
  vec![
    AuxiliaryServiceConfig {
      name: String::from("rembg"),
      image: String::from("admier/brinxai_nodes-rembg:latest"),
      container_port: REMBG_PORT.get(),
      start_port: REMBG_PORT,
      cpus: 2.0,
      memory_bytes: DEFAULT_SERVICE_MEMORY,
    },
    AuxiliaryServiceConfig {
      name: String::from("upscaler"),
      image: String::from("admier/brinxai_nodes-upscaler:latest"),
      container_port: UPSCALER_PORT.get(),
      start_port: UPSCALER_PORT,
      cpus: 2.0,
      memory_bytes: DEFAULT_SERVICE_MEMORY,
    },
  ]
}

impl Default for BootstrapConfig {
  fn default() -> Self {
    Self {
      network: default_network(),
      stale_pattern: default_stale_pattern(),
      required_tools: default_required_tools(),
      firewall_ports: default_firewall_ports(),
      runtime_packages: default_runtime_packages(),
      gpu_packages: default_gpu_packages(),
      worker_image: default_worker_image(),
      port_scan_window: default_port_scan_window(),
      workdir: default_workdir(),
      installer: Default::default(),
      services: default_services(),
      relay: Default::default(),
      skip_stages: Default::default(),
      logging: Default::default(),
    }
  }
}

/// A firewall allow rule, eg. `5011/tcp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct FirewallRule {
  pub port: u16,
  #[serde(default)]
  pub protocol: Protocol,
}

impl FirewallRule {
  pub fn new(port: u16, protocol: Protocol) -> FirewallRule {
    FirewallRule { port, protocol }
  }
}

impl std::fmt::Display for FirewallRule {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}/{}", self.port, self.protocol)
  }
}

/// The external repository whose installer sets
/// up the primary worker.
#[derive(Debug, Clone, Deserialize)]
pub struct InstallerConfig {
  /// Default: `https://github.com/admier1/BrinxAI-Worker-Nodes`
  #[serde(default = "default_installer_repo")]
  pub repo: String,
  /// Clone directory name inside `workdir`.
  /// Default: `BrinxAI-Worker-Nodes`
  #[serde(default = "default_installer_directory")]
  pub directory: String,
  /// Script run from the clone root.
  /// Default: `install_ubuntu.sh`
  #[serde(default = "default_installer_script")]
  pub script: String,
  /// Seconds allowed for the clone and the script each.
  /// Default: `1800`
  #[serde(default = "default_installer_timeout")]
  pub timeout: u64,
}

fn default_installer_repo() -> String {
  String::from("https://github.com/admier1/BrinxAI-Worker-Nodes")
}

fn default_installer_directory() -> String {
  String::from("BrinxAI-Worker-Nodes")
}

fn default_installer_script() -> String {
  String::from("install_ubuntu.sh")
}

fn default_installer_timeout() -> u64 {
  1800
}

impl Default for InstallerConfig {
  fn default() -> Self {
    Self {
      repo: default_installer_repo(),
      directory: default_installer_directory(),
      script: default_installer_script(),
      timeout: default_installer_timeout(),
    }
  }
}

/// One loopback-only auxiliary service.
#[derive(Debug, Clone, Deserialize)]
pub struct AuxiliaryServiceConfig {
  pub name: String,
  pub image: String,
  /// The port the service listens on inside the container.
  pub container_port: u16,
  /// Host port allocation starts here.
  pub start_port: NonZeroU16,
  #[serde(default = "default_service_cpus")]
  pub cpus: f64,
  #[serde(default = "default_service_memory")]
  pub memory_bytes: u64,
}

fn default_service_cpus() -> f64 {
  2.0
}

fn default_service_memory() -> u64 {
  DEFAULT_SERVICE_MEMORY
}

impl AuxiliaryServiceConfig {
  /// The desired container once a host port is allocated.
  pub fn desired(
    &self,
    host_port: u16,
    network: &str,
  ) -> DesiredContainer {
    DesiredContainer::new(&self.name, &self.image)
      .network(network)
      .port(PortBinding::loopback(
        host_port,
        self.container_port,
        Protocol::Tcp,
      ))
      .limits(ResourceLimits {
        cpus: self.cpus,
        memory_bytes: self.memory_bytes,
      })
  }
}

/// The externally reachable relay.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
  /// Default: `brinxai_relay`
  #[serde(default = "default_relay_name")]
  pub name: String,
  /// Image used on `x86_64`.
  #[serde(default = "default_relay_image_amd64")]
  pub image_amd64: String,
  /// Image used on `aarch64` / `arm64`.
  #[serde(default = "default_relay_image_arm64")]
  pub image_arm64: String,
  /// Default: `1194`
  #[serde(default = "default_relay_port")]
  pub port: u16,
  /// Default: `udp`
  #[serde(default = "default_relay_protocol")]
  pub protocol: Protocol,
  /// Default: `NET_ADMIN`
  #[serde(default = "default_relay_capabilities")]
  pub capabilities: Vec<String>,
}

fn default_relay_name() -> String {
  String::from("brinxai_relay")
}

fn default_relay_image_amd64() -> String {
  String::from("admier/brinxai_nodes-relay:latest")
}

fn default_relay_image_arm64() -> String {
  String::from("admier/brinxai_nodes-relay:arm64")
}

fn default_relay_port() -> u16 {
  1194
}

fn default_relay_protocol() -> Protocol {
  Protocol::Udp
}

fn default_relay_capabilities() -> Vec<String> {
  vec![String::from("NET_ADMIN")]
}

impl Default for RelayConfig {
  fn default() -> Self {
    Self {
      name: default_relay_name(),
      image_amd64: default_relay_image_amd64(),
      image_arm64: default_relay_image_arm64(),
      port: default_relay_port(),
      protocol: default_relay_protocol(),
      capabilities: default_relay_capabilities(),
    }
  }
}

impl RelayConfig {
  pub fn firewall_rule(&self) -> FirewallRule {
    FirewallRule::new(self.port, self.protocol)
  }

  /// The relay published on all interfaces, with the given image.
  pub fn desired(&self, image: &str) -> DesiredContainer {
    self.capabilities.iter().fold(
      DesiredContainer::new(&self.name, image).port(
        PortBinding::public(self.port, self.port, self.protocol),
      ),
      |container, capability| container.capability(capability),
    )
  }
}
