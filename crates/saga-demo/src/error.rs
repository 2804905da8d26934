use std::path::PathBuf;

use saga_executor::{OrchestratorError, SagaError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read config file '{}'", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{}'", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("saga error")]
    Saga(#[from] SagaError),

    #[error("orchestrator error")]
    Orchestrator(#[from] OrchestratorError),

    #[error("failed to serialize output")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
