//! Error types for configuration loading and daemon startup.

use chaos_server::error::ChaosServerError;
use thiserror::Error;

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Figment parsing error.
    #[error("configuration parsing error: {0}")]
    Parsing(#[from] Box<figment::Error>),

    /// A value parsed but is not acceptable.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// I/O error.
    #[error("configuration I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for SettingsError {
    fn from(err: figment::Error) -> Self {
        SettingsError::Parsing(Box::new(err))
    }
}

/// Anything that stops the daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Bad configuration.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// The server could not start or failed while running.
    #[error(transparent)]
    Server(#[from] ChaosServerError),

    /// Any other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
