//! Reconciliation logic for published EndpointSlices.
//!
//! Each [`PublishIntent`] is compared against the EndpointSlice currently
//! stored in the cluster. A slice that already matches is left alone; any
//! difference leads to a full overwrite of the slice (or a create when it
//! does not exist). Intents are reconciled independently so one failing
//! write does not hold back the others.

use crate::error::ControllerError;
use crate::intent::PublishIntent;
use crate::store::{EndpointStore, StoreError};
use ceph_client::MgrService;
use k8s_openapi::api::discovery::v1::{Endpoint, EndpointConditions, EndpointPort, EndpointSlice};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// Label binding an EndpointSlice to its Service.
pub const SERVICE_NAME_LABEL: &str = "kubernetes.io/service-name";
/// Label telling the built-in EndpointSlice controller to keep its hands off.
pub const MANAGED_BY_LABEL: &str = "endpointslice.kubernetes.io/managed-by";
/// Value of [`MANAGED_BY_LABEL`].
pub const MANAGED_BY: &str = "mgr-endpoints-controller";
/// Transport protocol of every published port.
pub const PROTOCOL: &str = "TCP";

/// What reconciling one intent did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Already up to date, nothing written
    Unchanged,
    /// The slice did not exist and was created
    Created,
    /// The slice was overwritten
    Updated,
}

/// Result of reconciling one service.
#[derive(Debug)]
pub struct ServiceResult {
    /// Service that was reconciled
    pub service: MgrService,
    /// Target EndpointSlice name
    pub target: String,
    /// What happened
    pub result: Result<Outcome, ControllerError>,
}

/// Results of one cycle, one entry per intent.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Per-service results, in intent order
    pub results: Vec<ServiceResult>,
}

impl CycleReport {
    /// Number of services whose publish failed.
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.result.is_err()).count()
    }

    /// Outcome for `service`, `None` if it failed or was not reconciled.
    pub fn outcome(&self, service: MgrService) -> Option<Outcome> {
        self.results
            .iter()
            .find(|r| r.service == service)
            .and_then(|r| r.result.as_ref().ok().copied())
    }

    /// Fold into a single result, failing if any service failed.
    pub fn into_result(self) -> Result<(), ControllerError> {
        let failed = self.failed();
        if failed == 0 {
            return Ok(());
        }
        let total = self.results.len();
        let targets = self
            .results
            .iter()
            .filter(|r| r.result.is_err())
            .map(|r| r.target.clone())
            .collect();
        // A single failure keeps its own error
        if failed == 1 {
            if let Some(Err(e)) = self.results.into_iter().map(|r| r.result).find(Result::is_err) {
                return Err(e);
            }
        }
        Err(ControllerError::PartialPublish { failed, total, targets })
    }
}

/// Whether `slice` already publishes exactly what `intent` asks for.
///
/// Checks the service-name label, the address type, a single endpoint with
/// a single address, and a single port with matching name, number and
/// protocol. Anything extra counts as a mismatch.
pub fn slice_matches(slice: &EndpointSlice, intent: &PublishIntent, parent_service: &str) -> bool {
    let parent_matches = slice
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(SERVICE_NAME_LABEL))
        .is_some_and(|value| value == parent_service);
    if !parent_matches {
        return false;
    }

    if slice.address_type != intent.address.address_type() {
        return false;
    }

    let [endpoint] = slice.endpoints.as_slice() else {
        return false;
    };
    let [address] = endpoint.addresses.as_slice() else {
        return false;
    };
    if *address != intent.address.ip.to_string() {
        return false;
    }

    let Some([port]) = slice.ports.as_deref() else {
        return false;
    };
    port.name.as_deref() == Some(intent.record.port_name())
        && port.port == Some(i32::from(intent.address.port))
        && port.protocol.as_deref() == Some(PROTOCOL)
}

/// Build the complete EndpointSlice for `intent`.
pub fn desired_slice(
    intent: &PublishIntent,
    namespace: &str,
    parent_service: &str,
    owner_uid: Option<String>,
) -> EndpointSlice {
    let labels = BTreeMap::from([
        (SERVICE_NAME_LABEL.to_string(), parent_service.to_string()),
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string()),
    ]);

    let owner_references = owner_uid.map(|uid| {
        vec![OwnerReference {
            api_version: "v1".to_string(),
            kind: "Service".to_string(),
            name: parent_service.to_string(),
            uid,
            controller: Some(true),
            ..Default::default()
        }]
    });

    EndpointSlice {
        metadata: ObjectMeta {
            name: Some(intent.record.target.clone()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            owner_references,
            ..Default::default()
        },
        address_type: intent.address.address_type().to_string(),
        endpoints: vec![Endpoint {
            addresses: vec![intent.address.ip.to_string()],
            conditions: Some(EndpointConditions {
                ready: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        }],
        ports: Some(vec![EndpointPort {
            name: Some(intent.record.port_name().to_string()),
            port: Some(i32::from(intent.address.port)),
            protocol: Some(PROTOCOL.to_string()),
            ..Default::default()
        }]),
    }
}

/// Reconciles published EndpointSlices for one cycle.
pub struct Reconciler<'a, S> {
    store: &'a S,
    namespace: &'a str,
    parent_service: &'a str,
}

impl<S> std::fmt::Debug for Reconciler<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("namespace", &self.namespace)
            .field("parent_service", &self.parent_service)
            .finish_non_exhaustive()
    }
}

impl<'a, S: EndpointStore> Reconciler<'a, S> {
    /// Creates a new reconciler instance.
    pub fn new(store: &'a S, namespace: &'a str, parent_service: &'a str) -> Self {
        Self {
            store,
            namespace,
            parent_service,
        }
    }

    /// Reconciles every intent independently and reports each outcome.
    pub async fn reconcile_all(&self, intents: &[PublishIntent]) -> CycleReport {
        let mut report = CycleReport::default();
        for intent in intents {
            let result = self.reconcile(intent).await;
            if let Err(e) = &result {
                error!(
                    service = %intent.record.service,
                    namespace = self.namespace,
                    name = %intent.record.target,
                    error = %e,
                    "Failed to reconcile endpoints"
                );
            }
            report.results.push(ServiceResult {
                service: intent.record.service,
                target: intent.record.target.clone(),
                result,
            });
        }
        report
    }

    /// Reconciles one intent.
    ///
    /// This method:
    /// 1. Fetches the existing EndpointSlice (absent means create)
    /// 2. Returns early if it already matches
    /// 3. Looks up the parent Service for an owner reference (best effort)
    /// 4. Replaces the slice with the full desired object, or creates it
    ///    when it is absent or was deleted after step 1
    pub async fn reconcile(&self, intent: &PublishIntent) -> Result<Outcome, ControllerError> {
        let service = intent.record.service;
        let name = intent.record.target.as_str();
        let publish_error = |source| ControllerError::Publish {
            service,
            namespace: self.namespace.to_string(),
            name: name.to_string(),
            source,
        };

        let existing = self
            .store
            .get_slice(self.namespace, name)
            .await
            .map_err(publish_error)?;

        if let Some(existing) = &existing {
            if slice_matches(existing, intent, self.parent_service) {
                debug!(%service, namespace = self.namespace, name, "Endpoints already up-to-date");
                return Ok(Outcome::Unchanged);
            }
        }

        let owner_uid = match self.store.get_service_uid(self.namespace, self.parent_service).await {
            Ok(Some(uid)) => Some(uid),
            Ok(None) => {
                warn!(
                    namespace = self.namespace,
                    parent = self.parent_service,
                    "Parent service not found, publishing without owner reference"
                );
                None
            }
            Err(e) => {
                warn!(
                    namespace = self.namespace,
                    parent = self.parent_service,
                    error = %e,
                    "Failed to look up parent service, publishing without owner reference"
                );
                None
            }
        };

        let mut desired = desired_slice(intent, self.namespace, self.parent_service, owner_uid);

        match existing {
            Some(existing) => {
                desired.metadata.resource_version = existing.metadata.resource_version;
                let replaced = self.store.replace_slice(self.namespace, name, &desired).await;
                match replaced {
                    Ok(_) => {
                        info!(
                            %service,
                            namespace = self.namespace,
                            name,
                            address = %intent.address,
                            "Updated endpoints"
                        );
                        Ok(Outcome::Updated)
                    }
                    // Deleted since the get
                    Err(StoreError::NotFound(_)) => {
                        debug!(%service, namespace = self.namespace, name, "Endpoints disappeared, creating");
                        desired.metadata.resource_version = None;
                        self.create(intent, &desired).await
                    }
                    Err(e) => Err(publish_error(e)),
                }
            }
            None => self.create(intent, &desired).await,
        }
    }

    async fn create(&self, intent: &PublishIntent, desired: &EndpointSlice) -> Result<Outcome, ControllerError> {
        let service = intent.record.service;
        let name = intent.record.target.as_str();
        self.store
            .create_slice(self.namespace, desired)
            .await
            .map_err(|source| ControllerError::Publish {
                service,
                namespace: self.namespace.to_string(),
                name: name.to_string(),
                source,
            })?;
        info!(
            %service,
            namespace = self.namespace,
            name,
            address = %intent.address,
            "Created endpoints"
        );
        Ok(Outcome::Created)
    }
}
