use anyhow::Context;
use brinx_client::entities::logger::{LogConfig, StdioLogMode};
use tracing::{Subscriber, level_filters::LevelFilter};
use tracing_subscriber::{
  Layer, Registry,
  fmt::time::{SystemTime, Uptime},
  layer::SubscriberExt,
  registry::LookupSpan,
  util::SubscriberInitExt,
};

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Installs the global subscriber. Fails if one is already set.
pub fn init(config: &LogConfig) -> anyhow::Result<()> {
  let log_level: tracing::Level = config.level.into();

  Registry::default()
    .with(LevelFilter::from(log_level))
    .with(stdio_layer(config))
    .try_init()
    .context("failed to init logger")
}

/// Standard lines are stamped with the time since start, so
/// the length of each stage reads straight off the log.
/// Json lines carry the wall clock time instead.
fn stdio_layer<S>(config: &LogConfig) -> Option<BoxedLayer<S>>
where
  S: Subscriber + for<'a> LookupSpan<'a>,
{
  let layer = match (config.stdio, config.pretty) {
    (StdioLogMode::Standard, true) => tracing_subscriber::fmt::layer()
      .pretty()
      .with_timer(Uptime::default())
      .with_level(true)
      .with_file(false)
      .with_line_number(false)
      .with_target(config.location)
      .with_ansi(config.ansi)
      .boxed(),
    (StdioLogMode::Standard, false) => tracing_subscriber::fmt::layer()
      .with_timer(Uptime::default())
      .with_level(true)
      .with_file(false)
      .with_line_number(false)
      .with_target(config.location)
      .with_ansi(config.ansi)
      .boxed(),
    (StdioLogMode::Json, _) => tracing_subscriber::fmt::layer()
      .json()
      .with_timer(SystemTime)
      .with_level(true)
      .with_target(config.location)
      .with_current_span(true)
      .boxed(),
    (StdioLogMode::None, _) => return None,
  };
  Some(layer)
}
