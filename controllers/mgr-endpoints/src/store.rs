//! EndpointStore trait for mocking
//!
//! The reconciler reads and writes EndpointSlices through this trait. The
//! Kubernetes-backed implementation is [`KubeEndpointStore`]; unit tests use
//! an in-memory store.

use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::discovery::v1::EndpointSlice;
use kube::api::PostParams;
use kube::{Api, Client};
use thiserror::Error;
use tracing::debug;

/// Errors returned by an [`EndpointStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Kubernetes API error (including optimistic-concurrency conflicts)
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// The object to replace does not exist (anymore)
    #[error("{0} not found")]
    NotFound(String),

    /// Store-level error without a Kubernetes cause
    #[error("Store error: {0}")]
    Api(String),
}

/// Object store holding the published EndpointSlices.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait EndpointStore: Send + Sync {
    /// Fetch an EndpointSlice, `None` if it does not exist.
    async fn get_slice(&self, namespace: &str, name: &str) -> Result<Option<EndpointSlice>, StoreError>;

    /// Create a new EndpointSlice.
    async fn create_slice(&self, namespace: &str, slice: &EndpointSlice) -> Result<EndpointSlice, StoreError>;

    /// Replace an existing EndpointSlice.
    ///
    /// `slice.metadata.resource_version` must carry the version that was
    /// read; a concurrent writer makes this fail with a conflict. A slice
    /// that no longer exists fails with [`StoreError::NotFound`].
    async fn replace_slice(&self, namespace: &str, name: &str, slice: &EndpointSlice) -> Result<EndpointSlice, StoreError>;

    /// UID of a Service, `None` if it does not exist.
    async fn get_service_uid(&self, namespace: &str, name: &str) -> Result<Option<String>, StoreError>;
}

/// [`EndpointStore`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeEndpointStore {
    client: Client,
}

impl std::fmt::Debug for KubeEndpointStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEndpointStore").finish_non_exhaustive()
    }
}

impl KubeEndpointStore {
    /// Wrap an existing client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn slices(&self, namespace: &str) -> Api<EndpointSlice> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait::async_trait]
impl EndpointStore for KubeEndpointStore {
    async fn get_slice(&self, namespace: &str, name: &str) -> Result<Option<EndpointSlice>, StoreError> {
        debug!(namespace, name, "Fetching EndpointSlice");
        Ok(self.slices(namespace).get_opt(name).await?)
    }

    async fn create_slice(&self, namespace: &str, slice: &EndpointSlice) -> Result<EndpointSlice, StoreError> {
        Ok(self.slices(namespace).create(&PostParams::default(), slice).await?)
    }

    async fn replace_slice(&self, namespace: &str, name: &str, slice: &EndpointSlice) -> Result<EndpointSlice, StoreError> {
        match self.slices(namespace).replace(name, &PostParams::default(), slice).await {
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                Err(StoreError::NotFound(format!("endpointslices \"{name}\"")))
            }
            result => Ok(result?),
        }
    }

    async fn get_service_uid(&self, namespace: &str, name: &str) -> Result<Option<String>, StoreError> {
        let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        Ok(services.get_opt(name).await?.and_then(|svc| svc.metadata.uid))
    }
}
