use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing_subscriber::{
    Layer, Registry, fmt, fmt::time::OffsetTime, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::logger::{config::LoggerConfig, error::LoggerError, format::LoggerFormat};

type Output = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Build the output layer for `cfg` and install it as the global subscriber.
pub(crate) fn install(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    let filter = cfg.env_filter()?;
    let output = output_layer(cfg)?;
    tracing_subscriber::registry()
        .with(output.with_filter(filter))
        .try_init()
        .map_err(LoggerError::from_install)
}

fn output_layer(cfg: &LoggerConfig) -> Result<Output, LoggerError> {
    let layer = match cfg.format {
        // span fields carry the run id and command name into every line
        LoggerFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(cfg.use_color)
            .with_target(cfg.with_targets)
            .with_timer(local_timer())
            .boxed(),
        LoggerFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(std::io::stderr)
            .with_target(cfg.with_targets)
            .with_timer(local_timer())
            .boxed(),
        LoggerFormat::Journald => journald_layer()?,
    };
    Ok(layer)
}

fn local_timer() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn journald_layer() -> Result<Output, LoggerError> {
    let layer = tracing_journald::layer()
        .map_err(|e| LoggerError::Journald(e.to_string()))?
        .with_syslog_identifier("acctrun".to_string());
    Ok(layer.boxed())
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn journald_layer() -> Result<Output, LoggerError> {
    Err(LoggerError::JournaldUnavailable)
}
