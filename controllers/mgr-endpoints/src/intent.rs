//! Desired state for one cycle.
//!
//! Combines the `mgr services` answer with the configured targets into one
//! [`PublishIntent`] per published service. Any configured service that is
//! missing or unresolvable aborts the whole cycle, before anything is
//! written.

use crate::config::RunConfig;
use crate::error::ControllerError;
use crate::resolver::{resolve_service_url, EndpointAddress};
use ceph_client::{MgrService, MgrServices};
use tracing::debug;

/// A tracked service bound to the EndpointSlice it is published as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    /// Which mgr service
    pub service: MgrService,
    /// Target EndpointSlice name
    pub target: String,
}

impl ServiceRecord {
    /// Port name used in the EndpointSlice.
    pub fn port_name(&self) -> &'static str {
        port_name(self.service)
    }
}

/// EndpointSlice port name for `service`.
pub fn port_name(service: MgrService) -> &'static str {
    match service {
        MgrService::Dashboard => "dashboard",
        MgrService::Prometheus => "http-metrics",
    }
}

/// What one service should look like in the cluster after this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishIntent {
    /// Service and target name
    pub record: ServiceRecord,
    /// Resolved address
    pub address: EndpointAddress,
}

/// Build the intents for every service with a configured target.
pub async fn build_intents(
    services: &MgrServices,
    config: &RunConfig,
) -> Result<Vec<PublishIntent>, ControllerError> {
    for service in MgrService::ALL {
        let url = services.url(service);
        if !url.is_empty() {
            debug!(%service, url, "Discovered service");
        }
    }

    let mut intents = Vec::new();
    for service in MgrService::ALL {
        let target = config.target(service);
        if target.is_empty() {
            continue;
        }

        let url = services.url(service);
        if url.is_empty() {
            return Err(ControllerError::ServiceUnavailable(service));
        }

        let address = resolve_service_url(url, config.hostname_policy)
            .await
            .map_err(|source| ControllerError::AddressResolution { service, source })?;

        intents.push(PublishIntent {
            record: ServiceRecord {
                service,
                target: target.to_string(),
            },
            address,
        });
    }

    Ok(intents)
}
