//! Error types for provider API calls.

use thiserror::Error;

/// Errors returned by provider calls.
#[derive(Debug, Error)]
pub enum CloudError {
    /// The provider rejected the access token.
    #[error("{service} rejected the request as unauthenticated")]
    Unauthenticated { service: &'static str },

    /// The provider returned a non-success status.
    #[error("{service} API error ({status} {code}): {message}")]
    Api {
        service: &'static str,
        status: u16,
        code: String,
        message: String,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A success response could not be decoded.
    #[error("failed to decode {service} response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    /// A long-running operation finished with an error status.
    #[error("operation {name} failed ({code}): {message}")]
    OperationFailed {
        name: String,
        code: i32,
        message: String,
    },

    /// A long-running operation was still running when polling gave up.
    #[error("operation {name} did not finish within {waited_secs}s")]
    OperationTimeout { name: String, waited_secs: u64 },

    #[error("failed to obtain access token: {0}")]
    Auth(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl CloudError {
    /// Create an API error from response details.
    pub fn api(
        service: &'static str,
        status: u16,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Api {
            service,
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            CloudError::Api { status, .. } => Some(*status),
            CloudError::Unauthenticated { .. } => Some(401),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

/// Map a 404 to `Ok(None)`.
pub(crate) fn optional<T>(result: Result<T, CloudError>) -> Result<Option<T>, CloudError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
