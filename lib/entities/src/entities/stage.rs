use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use super::{
  container::Outcome, error::BootstrapError, update::Log,
};

/// The bootstrap stages, in execution order.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  clap::ValueEnum,
)]
#[strum(ascii_case_insensitive)]
pub enum Stage {
  DependencyCheck,
  NetworkEnsure,
  StaleCleanup,
  FirewallEnsure,
  RuntimeInstall,
  GpuDetect,
  ExternalInstall,
  AuxiliaryServices,
  RelayStart,
}

impl Stage {
  /// All stages in execution order.
  pub fn ordered() -> impl Iterator<Item = Stage> {
    Stage::iter()
  }

  /// Advisory stages log their failure and let the run continue.
  pub fn is_advisory(&self) -> bool {
    matches!(
      self,
      Stage::StaleCleanup | Stage::GpuDetect | Stage::AuxiliaryServices
    )
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StageStatus {
  Completed,
  /// Advisory stage failed, the run continued.
  AdvisoryFailed,
  Failed,
  Skipped,
}

#[derive(Debug, Clone)]
pub struct StageRecord {
  pub stage: Stage,
  pub status: StageStatus,
  pub logs: Vec<Log>,
  pub start_ts: i64,
  pub end_ts: i64,
}

/// Ordered record of what a bootstrap run did.
/// Lives for the process only.
#[derive(Debug, Clone, Default)]
pub struct BootstrapReport {
  pub stages: Vec<StageRecord>,
  /// Reconcile outcome per container name, in run order.
  pub containers: Vec<(String, Outcome)>,
}

impl BootstrapReport {
  pub fn push(&mut self, record: StageRecord) {
    self.stages.push(record);
  }

  pub fn outcome_of(&self, name: &str) -> Option<&Outcome> {
    self
      .containers
      .iter()
      .find(|(container, _)| container == name)
      .map(|(_, outcome)| outcome)
  }

  pub fn status_of(&self, stage: Stage) -> Option<StageStatus> {
    self
      .stages
      .iter()
      .find(|record| record.stage == stage)
      .map(|record| record.status)
  }

  pub fn completed(&self) -> Vec<Stage> {
    self
      .stages
      .iter()
      .filter(|record| record.status == StageStatus::Completed)
      .map(|record| record.stage)
      .collect()
  }
}

/// Terminal state of a bootstrap run.
#[derive(Debug)]
pub enum BootstrapOutcome {
  Succeeded(BootstrapReport),
  Failed {
    stage: Stage,
    error: BootstrapError,
    report: BootstrapReport,
  },
}

impl BootstrapOutcome {
  pub fn report(&self) -> &BootstrapReport {
    match self {
      BootstrapOutcome::Succeeded(report) => report,
      BootstrapOutcome::Failed { report, .. } => report,
    }
  }

  pub fn exit_code(&self) -> i32 {
    match self {
      BootstrapOutcome::Succeeded(_) => 0,
      BootstrapOutcome::Failed { .. } => 1,
    }
  }
}
