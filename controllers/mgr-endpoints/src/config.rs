//! Runtime configuration.
//!
//! Configuration is read from the environment once at startup. When
//! `CONFIG_FILE` is set, the YAML file it names is layered on top and
//! re-read on every scheduler tick, so the interval, debug flag and targets
//! can change without a restart.

use crate::error::ControllerError;
use crate::resolver::HostnamePolicy;
use ceph_client::MgrService;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_NAMESPACE: &str = "ceph";

/// Immutable snapshot of the controller configuration.
///
/// The scheduler swaps whole snapshots between cycles; a cycle only ever
/// sees one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Namespace the EndpointSlices live in
    pub namespace: String,
    /// Service the EndpointSlices are attached to
    pub parent_service: String,
    /// EndpointSlice name for the dashboard, empty to skip publishing it
    pub dashboard_target: String,
    /// EndpointSlice name for prometheus, empty to skip publishing it
    pub prometheus_target: String,
    /// Polling interval, zero runs a single cycle
    pub interval: Duration,
    /// Debug logging
    pub debug: bool,
    /// Handling of hostnames in service URLs
    pub hostname_policy: HostnamePolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            parent_service: String::new(),
            dashboard_target: String::new(),
            prometheus_target: String::new(),
            interval: Duration::ZERO,
            debug: false,
            hostname_policy: HostnamePolicy::Reject,
        }
    }
}

impl RunConfig {
    /// Target EndpointSlice name for `service`, empty if not published.
    pub fn target(&self, service: MgrService) -> &str {
        match service {
            MgrService::Dashboard => &self.dashboard_target,
            MgrService::Prometheus => &self.prometheus_target,
        }
    }

    /// Whether any service is configured to be published.
    pub fn publishes_anything(&self) -> bool {
        MgrService::ALL.iter().any(|s| !self.target(*s).is_empty())
    }

    /// Reject configurations that name a target without a place to put it.
    pub fn validate(&self) -> Result<(), ControllerError> {
        if !self.publishes_anything() {
            return Ok(());
        }
        if self.namespace.is_empty() {
            return Err(ControllerError::InvalidConfig(
                "namespace is required when an endpoint slice target is set".to_string(),
            ));
        }
        if self.parent_service.is_empty() {
            return Err(ControllerError::InvalidConfig(
                "parent service is required when an endpoint slice target is set".to_string(),
            ));
        }
        Ok(())
    }

    /// Field-by-field comparison against the next snapshot.
    pub fn diff(&self, next: &RunConfig) -> ConfigDiff {
        let mut other = Vec::new();
        if self.namespace != next.namespace {
            other.push("namespace");
        }
        if self.parent_service != next.parent_service {
            other.push("parentService");
        }
        if self.dashboard_target != next.dashboard_target {
            other.push("dashboardEndpointSlice");
        }
        if self.prometheus_target != next.prometheus_target {
            other.push("prometheusEndpointSlice");
        }
        if self.hostname_policy != next.hostname_policy {
            other.push("hostnamePolicy");
        }

        ConfigDiff {
            debug: (self.debug != next.debug).then_some(next.debug),
            interval: (self.interval != next.interval).then_some(next.interval),
            other,
        }
    }

    /// Build from `KEY=value` pairs (normally the process environment).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ControllerError> {
        let get = |key: &str| vars.get(key).map(|v| v.trim().to_string());
        let mut config = RunConfig::default();

        if let Some(namespace) = get("NAMESPACE") {
            config.namespace = namespace;
        }
        if let Some(parent) = get("PARENT_SERVICE") {
            config.parent_service = parent;
        }
        if let Some(target) = get("DASHBOARD_ENDPOINT_SLICE") {
            config.dashboard_target = target;
        }
        if let Some(target) = get("PROMETHEUS_ENDPOINT_SLICE") {
            config.prometheus_target = target;
        }
        if let Some(interval) = get("INTERVAL") {
            config.interval = parse_interval(&interval)?;
        }
        if let Some(debug) = get("DEBUG") {
            config.debug = parse_bool("DEBUG", &debug)?;
        }
        if let Some(policy) = get("HOSTNAME_POLICY") {
            config.hostname_policy = policy.parse().map_err(ControllerError::InvalidConfig)?;
        }

        Ok(config)
    }

    fn overlay(mut self, file: ConfigFile) -> Result<Self, ControllerError> {
        if let Some(namespace) = file.namespace {
            self.namespace = namespace;
        }
        if let Some(parent) = file.parent_service {
            self.parent_service = parent;
        }
        if let Some(target) = file.dashboard_endpoint_slice {
            self.dashboard_target = target;
        }
        if let Some(target) = file.prometheus_endpoint_slice {
            self.prometheus_target = target;
        }
        match file.interval {
            Some(IntervalValue::Seconds(secs)) => self.interval = Duration::from_secs(secs),
            Some(IntervalValue::Text(text)) => self.interval = parse_interval(&text)?,
            None => {}
        }
        if let Some(debug) = file.debug {
            self.debug = debug;
        }
        if let Some(policy) = file.hostname_policy {
            self.hostname_policy = policy;
        }
        Ok(self)
    }
}

/// Result of comparing two [`RunConfig`] snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDiff {
    /// New debug flag, if it changed
    pub debug: Option<bool>,
    /// New interval, if it changed
    pub interval: Option<Duration>,
    /// Names of other fields that changed
    pub other: Vec<&'static str>,
}

impl ConfigDiff {
    /// Nothing changed.
    pub fn is_empty(&self) -> bool {
        self.debug.is_none() && self.interval.is_none() && self.other.is_empty()
    }
}

/// Where configuration snapshots come from.
pub trait ConfigSource: Send + Sync {
    /// Produce a validated snapshot.
    fn load(&self) -> Result<RunConfig, ControllerError>;

    /// Whether `load` can return something different after startup.
    fn is_reloadable(&self) -> bool;
}

/// Environment variables plus an optional YAML overlay file.
#[derive(Debug, Clone)]
pub struct EnvConfigSource {
    vars: HashMap<String, String>,
    file: Option<PathBuf>,
}

impl EnvConfigSource {
    /// Snapshot the process environment.
    pub fn from_env() -> Self {
        Self::new(std::env::vars().collect())
    }

    /// Use explicit variables; `CONFIG_FILE` among them enables the overlay.
    pub fn new(vars: HashMap<String, String>) -> Self {
        let file = vars
            .get("CONFIG_FILE")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        Self { vars, file }
    }

    /// Overlay file, if any.
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

impl ConfigSource for EnvConfigSource {
    fn load(&self) -> Result<RunConfig, ControllerError> {
        let mut config = RunConfig::from_vars(&self.vars)?;
        if let Some(path) = &self.file {
            config = config.overlay(read_config_file(path)?)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn is_reloadable(&self) -> bool {
        self.file.is_some()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigFile {
    namespace: Option<String>,
    parent_service: Option<String>,
    dashboard_endpoint_slice: Option<String>,
    prometheus_endpoint_slice: Option<String>,
    interval: Option<IntervalValue>,
    debug: Option<bool>,
    hostname_policy: Option<HostnamePolicy>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IntervalValue {
    Seconds(u64),
    Text(String),
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ControllerError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        ControllerError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
    })?;
    if contents.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| {
        ControllerError::InvalidConfig(format!("failed to parse {}: {}", path.display(), e))
    })
}

/// Parse an interval such as `30s`, `5m`, `1h30m` or a bare number of seconds.
pub fn parse_interval(text: &str) -> Result<Duration, ControllerError> {
    let text = text.trim();
    let invalid = || ControllerError::InvalidConfig(format!("invalid interval '{text}'"));

    if text.is_empty() {
        return Ok(Duration::ZERO);
    }
    if let Ok(secs) = text.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut digits = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let value: u64 = digits.parse().map_err(|_| invalid())?;
        digits.clear();
        let unit = match c {
            'm' if chars.peek() == Some(&'s') => {
                chars.next();
                Duration::from_millis(1)
            }
            's' => Duration::from_secs(1),
            'm' => Duration::from_secs(60),
            'h' => Duration::from_secs(3600),
            _ => return Err(invalid()),
        };
        let value = u32::try_from(value).map_err(|_| invalid())?;
        total += unit * value;
    }
    if !digits.is_empty() {
        return Err(invalid());
    }
    Ok(total)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ControllerError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ControllerError::InvalidConfig(format!(
            "{key} must be a boolean, got '{value}'"
        ))),
    }
}
