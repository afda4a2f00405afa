//! Core error types.

use thiserror::Error;

use crate::driver::StoreError;
use crate::query::TransactionKind;

/// Errors surfaced by the data-access core.
#[derive(Debug, Error)]
pub enum Error {
    /// A required setting is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A model lacks a required schema annotation.
    #[error("model {model} is missing required metadata: {attribute}")]
    MissingRequiredMetadata { model: String, attribute: String },

    /// A predicate node could not be translated.
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),

    /// The evaluator was asked for an operation it does not dispatch on this path.
    #[error("unsupported transaction: {0:?}")]
    UnsupportedTransaction(TransactionKind),

    /// A parameter-based select was issued without usable parameters.
    #[error("invalid number of parameters for {0}")]
    InvalidNumberOfParameters(String),

    /// Failure reported by the procedure-execution capability.
    #[error("store error: {0}")]
    UnderlyingStore(#[from] StoreError),

    /// Row access error.
    #[error("protocol error: {0}")]
    Protocol(#[from] onedata_proto::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error while reading configuration or model files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking operation spawned by an async wrapper panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    pub(crate) fn missing_metadata(model: &str, attribute: &str) -> Self {
        Error::MissingRequiredMetadata {
            model: model.to_string(),
            attribute: attribute.to_string(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
