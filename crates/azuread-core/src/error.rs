//! Error types for the provider
//!
//! Backend clients produce the low-level variants (`NotFound`, `Api`,
//! `Throttled`, ...). Handlers decide what absence means for their operation
//! and wrap everything else with [`BackendContext::backend_context`].

use std::time::Duration;

use thiserror::Error;

/// Result type alias for provider operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the provider
#[derive(Error, Debug)]
pub enum Error {
    /// The directory object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Client-side conflict detected before any write was sent
    #[error("{0}")]
    ValidationConflict(String),

    /// A write did not become visible within the replication window
    #[error(
        "Timed out after {}s waiting for {object} to replicate (last observed: {last_observed})",
        timeout.as_secs()
    )]
    ReplicationTimeout {
        /// What was being waited on
        object: String,
        /// The configured upper bound
        timeout: Duration,
        /// Last value or error seen by the poller
        last_observed: String,
    },

    /// Any other backend failure, annotated with what was being done
    #[error("{operation} {object_id}: {message}")]
    Backend {
        /// Human readable operation, e.g. "Updating group"
        operation: String,
        /// Object the operation targeted
        object_id: String,
        /// Underlying failure
        message: String,
    },

    /// Non-success response from a directory API
    #[error("API error ({status}) {code}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// OData error code, empty when the body carried none
        code: String,
        /// OData error message or raw body
        message: String,
    },

    /// Authentication or authorization errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The directory asked us to slow down
    #[error("Throttled: {0}")]
    Throttled(String),

    /// Malformed resource identifier
    #[error("Invalid ID: {0}")]
    InvalidId(String),

    /// Configuration failed schema validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The operation exceeded its timeout
    #[error("{operation} did not finish within {}s", timeout.as_secs())]
    Timeout {
        /// Operation name
        operation: String,
        /// The configured upper bound
        timeout: Duration,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a client-side conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::ValidationConflict(msg.into())
    }

    /// Conflict raised when the object to be created already exists
    pub fn already_exists(resource_type: &str, id: &str) -> Self {
        Self::ValidationConflict(format!(
            "A resource with the ID {id:?} already exists - to be managed via Terraform this resource needs to be imported into the State. Please see the resource documentation for {resource_type:?} for more information."
        ))
    }

    /// Create a replication timeout error
    pub fn replication_timeout(
        object: impl Into<String>,
        timeout: Duration,
        last_observed: impl Into<String>,
    ) -> Self {
        Self::ReplicationTimeout {
            object: object.into(),
            timeout,
            last_observed: last_observed.into(),
        }
    }

    /// Create a wrapped backend error
    pub fn backend(
        operation: impl Into<String>,
        object_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Backend {
            operation: operation.into(),
            object_id: object_id.into(),
            message: message.into(),
        }
    }

    /// Create an API error from a response
    pub fn api(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a throttling error
    pub fn throttled(msg: impl Into<String>) -> Self {
        Self::Throttled(msg.into())
    }

    /// Create an invalid ID error
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// True for a 404 from the directory
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Errors worth retrying while waiting for replication: absence,
    /// throttling and server-side failures.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NotFound(_) | Self::Throttled(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Annotates low-level backend failures with the operation and object.
///
/// Client-side conflicts, replication timeouts and validation errors pass
/// through untouched so callers can still tell them apart.
pub trait BackendContext<T> {
    fn backend_context(self, operation: &str, object_id: &str) -> Result<T>;
}

impl<T> BackendContext<T> for Result<T> {
    fn backend_context(self, operation: &str, object_id: &str) -> Result<T> {
        self.map_err(|err| match err {
            Error::ValidationConflict(_)
            | Error::ReplicationTimeout { .. }
            | Error::Validation(_)
            | Error::InvalidId(_)
            | Error::Timeout { .. }
            | Error::Backend { .. } => err,
            other => Error::backend(operation, object_id, other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(Error::not_found("x").is_transient());
        assert!(Error::throttled("slow down").is_transient());
        assert!(Error::api(503, "", "unavailable").is_transient());
        assert!(!Error::api(400, "Request_BadRequest", "bad").is_transient());
        assert!(!Error::auth("forbidden").is_transient());
    }

    #[test]
    fn backend_context_wraps_api_errors_only() {
        let wrapped: Result<()> = Err(Error::api(400, "Request_BadRequest", "bad"));
        let err = wrapped.backend_context("Updating group", "abc").unwrap_err();
        assert!(matches!(err, Error::Backend { ref operation, .. } if operation == "Updating group"));

        let conflict: Result<()> = Err(Error::conflict("duplicate"));
        let err = conflict.backend_context("Creating group", "abc").unwrap_err();
        assert!(matches!(err, Error::ValidationConflict(_)));
    }
}
