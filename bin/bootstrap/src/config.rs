use std::path::Path;

use anyhow::Context;
use brinx_client::entities::{
  config::{BootstrapConfig, CliArgs, Env, InstallerConfig},
  logger::{LogConfig, LogLevel},
};
use formatting::{Color, colored};

/// Builds the final config. Args win over env, env wins over
/// the config file, and the file wins over defaults.
pub fn bootstrap_config(
  args: &CliArgs,
) -> anyhow::Result<BootstrapConfig> {
  let env: Env = envy::from_env()
    .context("Failed to parse bootstrap environment")?;

  let config_path =
    args.config_path.as_ref().or(env.brinx_config_path.as_ref());

  let config = match config_path {
    Some(path) => read_config_file(path)?,
    None => {
      println!(
        "{}: No config path found, using default config",
        colored("INFO", Color::Green),
      );
      BootstrapConfig::default()
    }
  };

  Ok(merge(args, env, config))
}

fn read_config_file(path: &Path) -> anyhow::Result<BootstrapConfig> {
  let contents = std::fs::read_to_string(path).with_context(|| {
    format!("Failed to read config file at {path:?}")
  })?;
  toml::from_str(&contents)
    .with_context(|| format!("Failed to parse config file at {path:?}"))
}

fn merge(
  args: &CliArgs,
  env: Env,
  config: BootstrapConfig,
) -> BootstrapConfig {
  let InstallerConfig {
    repo,
    directory,
    script,
    timeout,
  } = config.installer;

  let mut skip_stages = config.skip_stages;
  for stage in &args.skip {
    if !skip_stages.contains(stage) {
      skip_stages.push(*stage);
    }
  }

  BootstrapConfig {
    network: env.brinx_network.unwrap_or(config.network),
    stale_pattern: env
      .brinx_stale_pattern
      .unwrap_or(config.stale_pattern),
    required_tools: config.required_tools,
    firewall_ports: config.firewall_ports,
    runtime_packages: config.runtime_packages,
    gpu_packages: config.gpu_packages,
    worker_image: config.worker_image,
    port_scan_window: env
      .brinx_port_scan_window
      .unwrap_or(config.port_scan_window),
    workdir: args
      .workdir
      .clone()
      .or(env.brinx_workdir)
      .unwrap_or(config.workdir),
    installer: InstallerConfig {
      repo: env.brinx_installer_repo.unwrap_or(repo),
      directory,
      script,
      timeout: args
        .installer_timeout
        .or(env.brinx_installer_timeout)
        .unwrap_or(timeout),
    },
    services: config.services,
    relay: config.relay,
    skip_stages,
    logging: LogConfig {
      level: args
        .log_level
        .map(LogLevel::from)
        .or(env.brinx_logging_level)
        .unwrap_or(config.logging.level),
      stdio: env.brinx_logging_stdio.unwrap_or(config.logging.stdio),
      pretty: env.brinx_logging_pretty.unwrap_or(config.logging.pretty),
      location: env
        .brinx_logging_location
        .unwrap_or(config.logging.location),
      ansi: env.brinx_logging_ansi.unwrap_or(config.logging.ansi),
    },
  }
}
