//! Error types for the build-configuration client.
//!
//! # Design
//! `Upload` is kept apart from `Api` because it is only ever raised after a
//! version record already exists on the server. A caller matching on it knows
//! an orphaned version was left behind, while an `Api` error from the same
//! call means nothing was created.

use thiserror::Error;

/// Errors returned by `BuildConfigRequests` parse methods and by
/// `BuildConfigClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response was obtained: connection, DNS or I/O failure.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Api { status: u16, message: Option<String> },

    /// The response body did not match the expected JSON shape.
    #[error("decoding response failed: {0}")]
    Decode(String),

    /// The template payload could not be delivered to the upload path.
    #[error("uploading to {upload_path} failed: {reason}")]
    Upload { upload_path: String, reason: String },

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ApiError {
    /// Status code of an `Api` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Errors raised while loading `ClientConfig` from the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid ATLAS_TIMEOUT_SECS value {0:?}: expected whole seconds")]
    InvalidTimeout(String),
}
