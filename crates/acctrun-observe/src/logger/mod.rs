mod config;
mod error;
mod format;
mod install;

pub use config::LoggerConfig;
pub use error::LoggerError;
pub use format::LoggerFormat;

/// Install the global tracing subscriber described by `cfg`.
///
/// Can succeed only once per process; later calls return [`LoggerError::AlreadyInitialized`].
pub fn logger_init(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    install::install(cfg)
}
