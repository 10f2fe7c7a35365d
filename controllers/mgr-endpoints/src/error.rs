//! Controller-specific error types.
//!
//! Errors from the Ceph and Kubernetes clients are wrapped with enough
//! context (service, namespace, object name) to be diagnosed from the log
//! line alone.

use crate::resolver::ResolveError;
use crate::store::StoreError;
use ceph_client::{CephError, MgrService};
use thiserror::Error;

/// Errors that can occur in the mgr endpoints controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// An external system could not be reached at startup
    #[error("Connection error: {0}")]
    Connection(String),

    /// `mgr services` could not be queried or decoded
    #[error("Service discovery failed: {0}")]
    Discovery(#[from] CephError),

    /// A service with a configured target is not advertised by the mgr
    #[error("Service unavailable: {0} URL not found in ceph mgr services")]
    ServiceUnavailable(MgrService),

    /// A service URL could not be turned into an endpoint
    #[error("Failed to resolve {service} URL: {source}")]
    AddressResolution {
        /// Service whose URL was rejected
        service: MgrService,
        /// Why it was rejected
        #[source]
        source: ResolveError,
    },

    /// Writing the EndpointSlice failed
    #[error("Failed to publish {service} endpoints {namespace}/{name}: {source}")]
    Publish {
        /// Service being published
        service: MgrService,
        /// Target namespace
        namespace: String,
        /// Target EndpointSlice name
        name: String,
        /// Store error
        #[source]
        source: StoreError,
    },

    /// One or more services failed to publish in a cycle
    #[error("{failed} of {total} services failed to publish: {}", targets.join(", "))]
    PartialPublish {
        /// Number of failed services
        failed: usize,
        /// Number of services attempted
        total: usize,
        /// EndpointSlices that were not published
        targets: Vec<String>,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
