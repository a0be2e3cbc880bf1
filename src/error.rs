//! Error types for the Cloud Metrics Library
//!
//! Defines all error types used throughout the library with clear error messages
//! and context for debugging.

use thiserror::Error;

use crate::monitor::model::{Provider, ResourceKind};

/// HTTP status a provider returns when the caller is rate limited
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// HTTP status a provider returns on an internal failure
pub const STATUS_INTERNAL_SERVER_ERROR: u16 = 500;

/// Main error type for the Cloud Metrics Library
#[derive(Error, Debug)]
pub enum MetricsError {
    /// No usable credential for the provider and principal
    #[error("No credential found for provider {provider} and principal '{principal_id}'")]
    CredentialNotFound {
        /// Provider the credential was requested for
        provider: Provider,
        /// Principal the credential was requested for
        principal_id: String,
    },

    /// A credential was found but lacks a variable the backend needs
    #[error("Credential for provider {provider} is missing variable '{variable}'")]
    IncompleteCredential {
        /// Provider the credential belongs to
        provider: Provider,
        /// Missing variable name
        variable: String,
    },

    /// Provider call failed terminally (retries exhausted or not retryable)
    #[error("Provider call '{operation}' failed after {attempts} attempt(s): {source}")]
    ProviderCommunication {
        /// Name of the provider operation
        operation: String,
        /// Number of attempts made
        attempts: u32,
        /// Last failure reported by the provider
        #[source]
        source: ProviderError,
    },

    /// The resource kind cannot be monitored
    #[error("Resource {resource_id} of kind {kind} is not supported for monitoring")]
    ResourceNotSupported {
        /// Identifier of the rejected resource
        resource_id: String,
        /// Kind of the rejected resource
        kind: ResourceKind,
    },

    /// The request is malformed
    #[error("Invalid metrics request: {0}")]
    InvalidRequest(String),

    /// No backend registered for the provider
    #[error("No metrics backend registered for provider {0}")]
    BackendNotRegistered(Provider),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] MetricsConfigError),
}

impl MetricsError {
    /// Provider error carried by a communication failure, if any
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            MetricsError::ProviderCommunication { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Failures reported by a provider client for a single call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Provider answered with a status classified as transient
    #[error("Transient provider error (status {status}): {message}")]
    Transient {
        /// HTTP-equivalent status code
        status: u16,
        /// Provider message
        message: String,
    },

    /// Provider rejected the request (auth, malformed request, not found)
    #[error("Provider rejected request (status {status}): {message}")]
    Rejected {
        /// HTTP-equivalent status code
        status: u16,
        /// Provider message
        message: String,
    },

    /// Network-level failure before a response was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response could not be decoded
    #[error("Failed to decode provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Status code carried by the failure, if the provider answered
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Transient { status, .. } | ProviderError::Rejected { status, .. } => {
                Some(*status)
            }
            ProviderError::Transport(_) | ProviderError::Decode(_) => None,
        }
    }

    /// Whether the failure is classified as transient by the provider client
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient { .. })
    }

    /// Classify an HTTP status into a provider error
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            STATUS_TOO_MANY_REQUESTS | STATUS_INTERNAL_SERVER_ERROR => {
                ProviderError::Transient { status, message }
            }
            _ => ProviderError::Rejected { status, message },
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum MetricsConfigError {
    /// Invalid retry settings
    #[error("Invalid retry configuration: {0}")]
    InvalidRetry(String),

    /// Invalid query window settings
    #[error("Invalid window configuration: {0}")]
    InvalidWindow(String),

    /// Invalid URL format
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),

    /// Missing required configuration field
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// Configuration file could not be read
    #[error("Failed to read configuration: {0}")]
    Io(String),
}

impl From<anyhow::Error> for MetricsError {
    fn from(err: anyhow::Error) -> Self {
        MetricsError::InvalidRequest(err.to_string())
    }
}
