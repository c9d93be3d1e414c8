use thiserror::Error;

/// Why the process logger could not be installed.
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format '{0}', expected text, json or journald")]
    UnknownFormat(String),
    #[error("journald output needs Linux and the `journald` feature of acctrun-observe")]
    JournaldUnavailable,
    #[error("cannot connect to journald: {0}")]
    Journald(String),
    #[error("invalid log filter '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },
    #[error("a logger is already installed in this process")]
    AlreadyInitialized,
    #[error("cannot install logger: {0}")]
    Install(String),
}

impl LoggerError {
    pub(crate) fn from_install(e: impl std::fmt::Display) -> Self {
        let msg = e.to_string();
        if msg.contains("global default") {
            LoggerError::AlreadyInitialized
        } else {
            LoggerError::Install(msg)
        }
    }
}
