use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to read file: {path}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    WriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse suppressions file: {path} - {message}")]
    SuppressionParse { path: String, message: String },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AuditError>;
