//! Ceph client errors

use thiserror::Error;

/// Errors that can occur when talking to the Ceph cluster
#[derive(Debug, Error)]
pub enum CephError {
    /// The command did not complete or the cluster rejected it
    #[error("Ceph command '{prefix}' failed: {message}")]
    QueryFailed {
        /// Command prefix, e.g. `mgr services`
        prefix: String,
        /// Transport or cluster error message
        message: String,
    },

    /// The response did not have the expected JSON shape
    #[error("Failed to decode response of '{prefix}': {source}")]
    DecodeFailed {
        /// Command prefix, e.g. `mgr services`
        prefix: String,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// The command object could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
