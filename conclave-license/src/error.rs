//! Error types for the licensing module.

use conclave_storage::StorageError;
use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Sign-in succeeded but produced no usable user identifier.
    #[error("invalid user identity: {0}")]
    InvalidUserIdentity(String),

    /// Network, service or identity provider failure. Retried on next launch.
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// The remote record carried a status this client does not recognize.
    #[error("malformed remote status: {0}")]
    MalformedRemoteStatus(String),

    /// Application identifier was empty.
    #[error("invalid application id: {0:?}")]
    InvalidApplicationId(String),

    /// No remote service is bound to this gate.
    #[error("remote service not configured: {0}")]
    NotConfigured(String),

    /// Local preference storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LicenseError {
    /// Returns true for failures that a later launch may get past on its own.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_))
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
