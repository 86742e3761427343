//! Error handling for route-coverage operations.
//!
//! Only the request paths can fail: coverage and scoring always return a
//! well-defined (possibly zeroed) value.

use thiserror::Error;

use crate::providers::ProviderKind;

/// Error type for routing requests and aggregation.
#[derive(Debug, Clone, Error)]
pub enum RouteError {
    /// Provider needs an API key that was not configured
    #[error("{provider}: missing API key")]
    MissingCredential { provider: ProviderKind },

    /// Network or transport level failure
    #[error("{provider}: request failed: {message}")]
    Request {
        provider: ProviderKind,
        message: String,
    },

    /// Non-2xx HTTP status
    #[error("{provider}: HTTP {status}: {message}")]
    Http {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    /// Body could not be decoded into the provider's response shape
    #[error("{provider}: malformed response: {message}")]
    MalformedResponse {
        provider: ProviderKind,
        message: String,
    },

    /// Provider answered with its own error payload
    #[error("{provider}: {message}")]
    Provider {
        provider: ProviderKind,
        message: String,
    },

    /// Single-provider request for a provider the aggregator was not built with
    #[error("{0} is not configured")]
    ProviderNotConfigured(ProviderKind),

    /// Hybrid request with an empty provider set
    #[error("no routing providers configured")]
    NoProviders,

    /// Every provider of a hybrid request failed
    #[error("all routing providers failed: {}", join_messages(.0))]
    AllProvidersFailed(Vec<RouteError>),

    /// HTTP client could not be constructed
    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

impl RouteError {
    /// Provider the error originated from, if any.
    pub fn provider(&self) -> Option<ProviderKind> {
        match self {
            RouteError::MissingCredential { provider }
            | RouteError::Request { provider, .. }
            | RouteError::Http { provider, .. }
            | RouteError::MalformedResponse { provider, .. }
            | RouteError::Provider { provider, .. } => Some(*provider),
            RouteError::ProviderNotConfigured(kind) => Some(*kind),
            _ => None,
        }
    }
}

fn join_messages(errors: &[RouteError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for route-coverage operations.
pub type Result<T> = std::result::Result<T, RouteError>;
