use brinx_client::entities::{
  config::CliArgs, stage::BootstrapOutcome,
};
use clap::Parser;
use formatting::{failed, success};

use crate::{host::SystemHost, orchestrator::Orchestrator};

#[macro_use]
extern crate tracing;

mod config;
mod docker;
mod firewall;
mod helpers;
mod host;
mod install;
mod orchestrator;
mod port;
mod reconcile;

async fn app(args: &CliArgs) -> anyhow::Result<i32> {
  let config = config::bootstrap_config(args)?;
  logger::init(&config.logging)?;

  info!("BrinxAI Bootstrap version: v{}", env!("CARGO_PKG_VERSION"));

  if config.logging.pretty {
    info!("{config:#?}");
  } else {
    info!("{config:?}");
  }

  let host = SystemHost::default();
  let outcome = Orchestrator::new(&host, &config).run().await;

  for (name, container) in &outcome.report().containers {
    if container.is_failed() {
      warn!("{name}: {container}");
    } else {
      info!("{name}: {container}");
    }
  }

  match &outcome {
    BootstrapOutcome::Succeeded(report) => {
      info!(
        "{} bootstrap finished | {} stage(s) completed",
        success(),
        report.completed().len()
      );
    }
    BootstrapOutcome::Failed { stage, error, .. } => {
      error!(
        "{} bootstrap stopped at {stage} ({}) | {error}",
        failed(),
        error.kind()
      );
    }
  }

  Ok(outcome.exit_code())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();
  let args = CliArgs::parse();

  let mut term_signal = tokio::signal::unix::signal(
    tokio::signal::unix::SignalKind::terminate(),
  )?;

  // Dropping the app future kills any child process still running.
  let code = tokio::select! {
    res = app(&args) => res?,
    _ = term_signal.recv() => {
      warn!("Received SIGTERM, exiting before bootstrap finished");
      143
    },
    _ = tokio::signal::ctrl_c() => {
      warn!("Interrupted, exiting before bootstrap finished");
      130
    },
  };

  if code != 0 {
    std::process::exit(code);
  }

  Ok(())
}
