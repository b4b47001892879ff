//! Bridge error taxonomy
//!
//! Every variant is fatal for the run: nothing here is retried. The host is
//! expected to stop stepping and let the federate be destroyed.

use crate::config::ConfigError;
use crate::marshal::MarshalError;
use thiserror::Error;

/// Errors surfaced to the host by any bridge component
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BridgeError {
    /// Configuration artifact unreadable, invalid, or rejected by the bus
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Lifecycle or exchange calls made out of order
    #[error("Sequence error: {0}")]
    Sequence(String),

    /// Endpoint selector did not resolve
    #[error("Endpoint not found: {selector}: {message}")]
    NotFound { selector: String, message: String },

    /// Operation on a federate that is not (or no longer) valid
    #[error("Invalid federate: {0}")]
    InvalidFederate(String),

    /// Bus reported a state violation, or returned an inconsistent grant
    #[error("Federate state error: {0}")]
    State(String),

    /// Federate destroyed twice
    #[error("Federate '{0}' was already destroyed")]
    DoubleFree(String),

    /// Buffer/value conversion failure
    #[error("Marshalling error: {0}")]
    Marshal(#[from] MarshalError),
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
