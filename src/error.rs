//! Error types for the annotation engine.

use thiserror::Error;

/// Errors that can occur in the annotation engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Invalid viewport or engine setup, e.g. a zero-area container
    #[error("invalid configuration: {message}")]
    Configuration {
        /// Description of the configuration problem
        message: String,
    },

    /// Network operation failed; retryable by the operator
    #[error("network operation failed: {message}")]
    Network {
        /// Description of the transport failure
        message: String,
    },

    /// Malformed server response, e.g. missing image dimensions
    #[error("malformed server response: {message}")]
    Protocol {
        /// Description of the protocol violation
        message: String,
    },

    /// Rejected input, e.g. a bad fill value or a wrong-length markup array
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the rejected input
        message: String,
    },

    /// A paint write arrived while no markup array is bound.
    ///
    /// This is a precondition violation: `activate()` must run first.
    #[error("no markup array is bound; activate the layer before painting")]
    NoActiveMarkup,
}

impl EngineError {
    /// Create a configuration error with a message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a network error with a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a protocol error with a message.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create an invalid input error with a message.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}
