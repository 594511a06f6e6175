use brinx_client::entities::{
  brinx_timestamp,
  config::{AuxiliaryServiceConfig, BootstrapConfig, RelayConfig},
  container::Outcome,
  error::BootstrapError,
  stage::{
    BootstrapOutcome, BootstrapReport, Stage, StageRecord, StageStatus,
  },
  update::Log,
};
use formatting::{bold, failed, muted, success};

use crate::{
  firewall,
  helpers::log_step,
  host::HostEnvironment,
  install::{self, GpuSupport},
  port::find_available_port,
  reconcile::{ensure_absent, reconcile, reconcile_with},
};

/// Runs the bootstrap stages in order against a host.
///
/// Fatal stage failures end the run. Advisory stages
/// ([Stage::is_advisory]) log their failure and the run moves on.
/// Nothing is rolled back.
pub struct Orchestrator<'a, H> {
  host: &'a H,
  config: &'a BootstrapConfig,
}

impl<'a, H: HostEnvironment> Orchestrator<'a, H> {
  pub fn new(host: &'a H, config: &'a BootstrapConfig) -> Self {
    Self { host, config }
  }

  pub async fn run(&self) -> BootstrapOutcome {
    let mut report = BootstrapReport::default();

    for stage in Stage::ordered() {
      if self.config.skip_stages.contains(&stage) {
        info!("{} {}", bold(stage), muted("skipped"));
        let ts = brinx_timestamp();
        report.push(StageRecord {
          stage,
          status: StageStatus::Skipped,
          logs: Vec::new(),
          start_ts: ts,
          end_ts: ts,
        });
        continue;
      }

      info!("{} ...", bold(stage));
      let start_ts = brinx_timestamp();
      let mut logs = Vec::new();
      let res = self
        .run_stage(stage, &mut logs, &mut report.containers)
        .await;
      let end_ts = brinx_timestamp();

      logs.iter().for_each(log_step);

      let status = match &res {
        Ok(_) => StageStatus::Completed,
        Err(_) if stage.is_advisory() => StageStatus::AdvisoryFailed,
        Err(_) => StageStatus::Failed,
      };
      report.push(StageRecord {
        stage,
        status,
        logs,
        start_ts,
        end_ts,
      });

      match res {
        Ok(()) => info!("{} {stage}", success()),
        Err(e) if stage.is_advisory() => {
          warn!("{stage} failed, continuing | {e}")
        }
        Err(error) => {
          error!("{} {stage} | {error}", failed());
          return BootstrapOutcome::Failed {
            stage,
            error,
            report,
          };
        }
      }
    }

    BootstrapOutcome::Succeeded(report)
  }

  #[instrument("Stage", skip(self, logs, containers))]
  async fn run_stage(
    &self,
    stage: Stage,
    logs: &mut Vec<Log>,
    containers: &mut Vec<(String, Outcome)>,
  ) -> Result<(), BootstrapError> {
    let config = self.config;
    match stage {
      Stage::DependencyCheck => self.check_dependencies(logs).await,
      Stage::NetworkEnsure => self.ensure_network(logs).await,
      Stage::StaleCleanup => self.remove_stale(logs).await,
      Stage::FirewallEnsure => {
        firewall::ensure_rules(self.host, &config.firewall_ports, logs)
          .await
      }
      Stage::RuntimeInstall => {
        install::ensure_runtime(self.host, config, logs).await
      }
      Stage::GpuDetect => {
        match install::ensure_gpu_runtime(self.host, config, logs)
          .await?
        {
          GpuSupport::Installed => {
            info!("GPU support installed, containers can use the GPU")
          }
          GpuSupport::NotDetected => debug!("no GPU, running CPU only"),
        }
        Ok(())
      }
      Stage::ExternalInstall => {
        install::run_external_installer(self.host, config, logs).await
      }
      Stage::AuxiliaryServices => {
        self.start_auxiliary_services(logs, containers).await
      }
      Stage::RelayStart => self.start_relay(logs, containers).await,
    }
  }

  async fn check_dependencies(
    &self,
    logs: &mut Vec<Log>,
  ) -> Result<(), BootstrapError> {
    let mut missing = Vec::new();
    for tool in &self.config.required_tools {
      if !self.host.tool_available(tool).await {
        missing.push(tool.clone());
      }
    }
    if !missing.is_empty() {
      return Err(BootstrapError::DependencyMissing(missing));
    }
    logs.push(Log::simple(
      "Dependency Check",
      format!("found {}", self.config.required_tools.join(", ")),
    ));
    Ok(())
  }

  async fn ensure_network(
    &self,
    logs: &mut Vec<Log>,
  ) -> Result<(), BootstrapError> {
    let network = &self.config.network;
    let network_error =
      |reason: String| BootstrapError::NetworkCreateError {
        network: network.clone(),
        reason,
      };

    let exists = self
      .host
      .network_exists(network)
      .await
      .map_err(|e| network_error(format!("{e:#}")))?;
    if exists {
      logs.push(Log::simple(
        "Network",
        format!("{network} already exists"),
      ));
      return Ok(());
    }

    let log = self.host.create_network(network).await;
    let success = log.success;
    let reason = log.failure_reason();
    logs.push(log);
    if success {
      Ok(())
    } else {
      Err(network_error(reason))
    }
  }

  async fn remove_stale(
    &self,
    logs: &mut Vec<Log>,
  ) -> Result<(), BootstrapError> {
    let reports =
      ensure_absent(self.host, &self.config.stale_pattern).await?;
    if reports.is_empty() {
      logs.push(Log::simple(
        "Stale Cleanup",
        String::from("no stale containers"),
      ));
    }

    let mut first_error = None;
    for report in reports {
      match report.result {
        Ok(()) => info!(
          "removed stale container {} ({})",
          report.name, report.image
        ),
        Err(e) => {
          warn!(
            "failed to remove stale container {} | {e}",
            report.name
          );
          first_error.get_or_insert(e);
        }
      }
      logs.extend(report.logs);
    }

    match first_error {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }

  /// Every service is attempted. The first failure is
  /// returned after the rest have run.
  async fn start_auxiliary_services(
    &self,
    logs: &mut Vec<Log>,
    containers: &mut Vec<(String, Outcome)>,
  ) -> Result<(), BootstrapError> {
    let mut first_error = None;
    for service in &self.config.services {
      let outcome = self.start_auxiliary_service(service, logs).await;
      if let Outcome::Failed(e) = &outcome {
        error!("{} failed, continuing | {e}", service.name);
        first_error.get_or_insert_with(|| e.clone());
      }
      containers.push((service.name.clone(), outcome));
    }
    match first_error {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }

  #[instrument(
    "AuxiliaryService",
    skip_all,
    fields(service = %service.name)
  )]
  async fn start_auxiliary_service(
    &self,
    service: &AuxiliaryServiceConfig,
    logs: &mut Vec<Log>,
  ) -> Outcome {
    self.pull(&service.image, logs).await;

    // Allocated after teardown, so the port held by the
    // container being replaced can be reused.
    let report = reconcile_with(self.host, &service.name, || async {
      let host_port = find_available_port(
        self.host,
        service.start_port,
        self.config.port_scan_window,
      )
      .await;
      host_port.map(|host_port| {
        info!(
          "{} allocated 127.0.0.1:{host_port} -> {}",
          service.name, service.container_port
        );
        service.desired(host_port, &self.config.network)
      })
    })
    .await;
    logs.extend(report.logs);
    report.outcome
  }

  /// The architecture is checked before the firewall is touched,
  /// so an unsupported host fails without side effects.
  #[instrument("RelayStart", skip_all)]
  async fn start_relay(
    &self,
    logs: &mut Vec<Log>,
    containers: &mut Vec<(String, Outcome)>,
  ) -> Result<(), BootstrapError> {
    let relay = &self.config.relay;
    let architecture = self
      .host
      .architecture()
      .await
      .map_err(BootstrapError::host_query)?;
    let image = relay_image(relay, &architecture)?;
    debug!("using relay image {image} for {}", architecture.trim());

    firewall::ensure_rules(self.host, &[relay.firewall_rule()], logs)
      .await?;

    self.pull(image, logs).await;

    let report = reconcile(self.host, &relay.desired(image)).await;
    logs.extend(report.logs);
    containers.push((report.name, report.outcome.clone()));
    match report.outcome {
      Outcome::Failed(e) => Err(e),
      Outcome::Created | Outcome::Recreated => Ok(()),
    }
  }

  /// A failed pull is not fatal. The run falls back to a local
  /// image, and `docker run` pulls again if there is none.
  async fn pull(&self, image: &str, logs: &mut Vec<Log>) {
    let log = self.host.pull_image(image).await;
    if !log.success {
      warn!("failed to pull {image}, using local image if present");
    }
    logs.push(log);
  }
}

/// Relay image variant for a `uname -m` architecture.
pub fn relay_image<'r>(
  relay: &'r RelayConfig,
  architecture: &str,
) -> Result<&'r str, BootstrapError> {
  match architecture.trim() {
    "x86_64" | "amd64" => Ok(relay.image_amd64.as_str()),
    "aarch64" | "arm64" => Ok(relay.image_arm64.as_str()),
    other => {
      Err(BootstrapError::UnsupportedArchitecture(other.to_string()))
    }
  }
}
