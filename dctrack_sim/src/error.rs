//! Simulation harness errors.

use dctrack_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Invalid setup: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),
}
