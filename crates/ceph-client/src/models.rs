//! Ceph command and response models

use serde::{Deserialize, Serialize};
use std::fmt;

/// A mon/mgr command in the JSON form accepted by `rados_mon_command`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonCommand {
    /// Command name, e.g. `mgr services`
    pub prefix: String,
    /// Output format, always `json` for this client
    pub format: String,
}

impl MonCommand {
    /// Create a command that asks for JSON output.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            format: "json".to_string(),
        }
    }

    /// Serialize to the wire form, e.g. `{"prefix":"mgr services","format":"json"}`.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Services published by the active mgr that this client knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MgrService {
    /// The Ceph dashboard module
    Dashboard,
    /// The Prometheus exporter module
    Prometheus,
}

impl MgrService {
    /// Every tracked service, in a stable order.
    pub const ALL: [MgrService; 2] = [MgrService::Dashboard, MgrService::Prometheus];

    /// Key used for this service in the `mgr services` response.
    pub fn name(self) -> &'static str {
        match self {
            MgrService::Dashboard => "dashboard",
            MgrService::Prometheus => "prometheus",
        }
    }
}

impl fmt::Display for MgrService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Response of `mgr services`.
///
/// A module that is disabled or not yet started is simply absent from the
/// response; absent keys decode to an empty URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MgrServices {
    /// Dashboard URL, e.g. `https://10.0.0.5:8443/`
    #[serde(default)]
    pub dashboard: String,
    /// Prometheus exporter URL, e.g. `http://10.0.0.5:9283/`
    #[serde(default)]
    pub prometheus: String,
}

impl MgrServices {
    /// URL advertised for `service`, empty if the service is not running.
    pub fn url(&self, service: MgrService) -> &str {
        match service {
            MgrService::Dashboard => &self.dashboard,
            MgrService::Prometheus => &self.prometheus,
        }
    }
}
