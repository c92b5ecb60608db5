use crate::config::{LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use shared::metrics_defs::describe_all;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const METRICS_PREFIX: &str = "linkgate";

#[derive(thiserror::Error, Debug)]
pub enum ObservabilityError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    #[error("could not install log subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
    #[error("could not set up statsd exporter: {0}")]
    Statsd(#[from] metrics_exporter_statsd::StatsdError),
    #[error("metrics recorder already installed")]
    RecorderInstalled,
}

/// Installs the log subscriber, with Sentry reporting when a DSN is configured.
///
/// The returned guard flushes pending Sentry events on drop and must live as
/// long as the process.
pub fn init_logging(
    config: Option<&LoggingConfig>,
) -> Result<Option<sentry::ClientInitGuard>, ObservabilityError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.map_or("info", |c| c.level.as_str()))?,
    };

    let guard = config.and_then(|c| c.sentry_dsn.as_deref()).map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(guard.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .try_init()?;

    Ok(guard)
}

/// Exports metrics to statsd. Without configuration metrics are discarded.
pub fn init_metrics(config: Option<&MetricsConfig>) -> Result<(), ObservabilityError> {
    let Some(config) = config else {
        tracing::info!("No metrics configured");
        return Ok(());
    };

    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some(METRICS_PREFIX))?;
    metrics::set_global_recorder(recorder).map_err(|_| ObservabilityError::RecorderInstalled)?;

    describe_all(registry::metrics_defs::ALL_METRICS);
    describe_all(redirector::metrics_defs::ALL_METRICS);
    tracing::info!(host = %config.statsd_host, port = config.statsd_port, "Exporting metrics to statsd");

    Ok(())
}
