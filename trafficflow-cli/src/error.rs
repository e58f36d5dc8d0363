//! CLI error type.

use thiserror::Error;
use trafficflow::config::ConfigError;
use trafficflow::logging::LoggingError;
use trafficflow::orchestrator::CollectorError;
use trafficflow::transport::TransportError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error(transparent)]
    Collector(#[from] CollectorError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),
}
