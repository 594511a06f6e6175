use thiserror::Error;

/// Error taxonomy for a bootstrap run.
///
/// Internals work with [anyhow] and are converted into one
/// of these at the stage boundary, so the orchestrator can
/// name what went wrong in its terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BootstrapError {
  #[error("Required tool(s) not found on host: {}", .0.join(", "))]
  DependencyMissing(Vec<String>),

  #[error("Failed to create network '{network}' | {reason}")]
  NetworkCreateError { network: String, reason: String },

  #[error("Failed to tear down container '{name}' | {reason}")]
  TeardownError { name: String, reason: String },

  #[error("Failed to start container '{name}' | {reason}")]
  StartError { name: String, reason: String },

  #[error("Firewall error | {0}")]
  FirewallError(String),

  #[error("Install error | {0}")]
  InstallError(String),

  #[error(
    "No free port in {start}..={end} ({checked} checked)"
  )]
  ResourceExhausted { start: u16, end: u16, checked: u32 },

  #[error("Unsupported host architecture '{0}'")]
  UnsupportedArchitecture(String),

  /// Reading host state (listening sockets, GPU, architecture) failed.
  #[error("Failed to query host | {0}")]
  HostQueryError(String),
}

impl BootstrapError {
  pub fn firewall(e: impl std::fmt::Display) -> BootstrapError {
    BootstrapError::FirewallError(format!("{e:#}"))
  }

  pub fn host_query(e: impl std::fmt::Display) -> BootstrapError {
    BootstrapError::HostQueryError(format!("{e:#}"))
  }

  /// Short kind name, without the details.
  pub fn kind(&self) -> &'static str {
    match self {
      BootstrapError::DependencyMissing(_) => "DependencyMissing",
      BootstrapError::NetworkCreateError { .. } => {
        "NetworkCreateError"
      }
      BootstrapError::TeardownError { .. } => "TeardownError",
      BootstrapError::StartError { .. } => "StartError",
      BootstrapError::FirewallError(_) => "FirewallError",
      BootstrapError::InstallError(_) => "InstallError",
      BootstrapError::ResourceExhausted { .. } => "ResourceExhausted",
      BootstrapError::UnsupportedArchitecture(_) => {
        "UnsupportedArchitecture"
      }
      BootstrapError::HostQueryError(_) => "HostQueryError",
    }
  }
}
