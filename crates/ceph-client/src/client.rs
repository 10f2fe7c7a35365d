//! Ceph administrative client
//!
//! Typed queries on top of an [`AdminChannel`].

use crate::channel::AdminChannel;
use crate::error::CephError;
use crate::models::{MgrServices, MonCommand};
use serde::de::{self, DeserializeOwned};
use tracing::debug;

const MGR_SERVICES: &str = "mgr services";
const VERSION: &str = "version";

/// Ceph administrative client
#[derive(Debug)]
pub struct CephClient<C> {
    channel: C,
}

impl<C: AdminChannel> CephClient<C> {
    /// Create a new client over `channel`.
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    /// Borrow the underlying channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Check that the cluster answers administrative commands.
    ///
    /// # Returns
    /// * `Ok(String)` - The version string reported by the cluster
    /// * `Err(CephError)` - If the cluster is unreachable
    pub async fn ping(&self) -> Result<String, CephError> {
        let reply: serde_json::Value = self.query(VERSION).await?;
        let version = reply
            .get("version")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(version)
    }

    /// Get the URLs of the services published by the active mgr.
    ///
    /// Services that are not running are absent from the response and come
    /// back as empty strings.
    ///
    /// # Returns
    /// * `Ok(MgrServices)` - The advertised service URLs
    /// * `Err(CephError::QueryFailed)` - If the command could not be executed
    /// * `Err(CephError::DecodeFailed)` - If the response is not the expected JSON object
    pub async fn mgr_services(&self) -> Result<MgrServices, CephError> {
        let reply: serde_json::Value = self.query(MGR_SERVICES).await?;
        // A derived struct decoder would also accept an array by position
        if !reply.is_object() {
            return Err(decode_failed(
                MGR_SERVICES,
                de::Error::custom(format!("expected a JSON object, got {reply}")),
            ));
        }
        serde_json::from_value(reply).map_err(|source| decode_failed(MGR_SERVICES, source))
    }

    async fn query<T: DeserializeOwned>(&self, prefix: &str) -> Result<T, CephError> {
        let command = MonCommand::new(prefix);
        debug!(command = %command.to_json()?, "Sending ceph command");

        let payload = self.channel.command(&command).await?;

        serde_json::from_slice(&payload).map_err(|source| decode_failed(prefix, source))
    }
}

fn decode_failed(prefix: &str, source: serde_json::Error) -> CephError {
    CephError::DecodeFailed {
        prefix: prefix.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockAdminChannel;
    use crate::models::MgrService;

    #[tokio::test]
    async fn test_mgr_services_sends_fixed_command() {
        let channel = MockAdminChannel::new();
        channel.set_response("mgr services", r#"{"dashboard":"https://10.0.0.5:8443/"}"#);
        let client = CephClient::new(channel);

        client.mgr_services().await.unwrap();

        let sent = client.channel().commands();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].to_json().unwrap(),
            r#"{"prefix":"mgr services","format":"json"}"#
        );
    }

    #[tokio::test]
    async fn test_mgr_services_both_present() {
        let channel = MockAdminChannel::new();
        channel.set_response(
            "mgr services",
            r#"{"dashboard":"https://10.0.0.5:8443/","prometheus":"http://10.0.0.5:9283/"}"#,
        );
        let client = CephClient::new(channel);

        let services = client.mgr_services().await.unwrap();
        assert_eq!(services.url(MgrService::Dashboard), "https://10.0.0.5:8443/");
        assert_eq!(services.url(MgrService::Prometheus), "http://10.0.0.5:9283/");
    }

    #[tokio::test]
    async fn test_mgr_services_missing_keys_are_empty() {
        let channel = MockAdminChannel::new();
        channel.set_response("mgr services", "{}");
        let client = CephClient::new(channel);

        let services = client.mgr_services().await.unwrap();
        assert_eq!(services, MgrServices::default());
        assert!(services.url(MgrService::Prometheus).is_empty());
    }

    #[tokio::test]
    async fn test_mgr_services_ignores_unknown_keys() {
        let channel = MockAdminChannel::new();
        channel.set_response(
            "mgr services",
            r#"{"dashboard":"https://10.0.0.5:8443/","restful":"https://10.0.0.5:8003/"}"#,
        );
        let client = CephClient::new(channel);

        let services = client.mgr_services().await.unwrap();
        assert_eq!(services.dashboard, "https://10.0.0.5:8443/");
        assert!(services.prometheus.is_empty());
    }

    #[tokio::test]
    async fn test_mgr_services_non_object_is_decode_error() {
        let channel = MockAdminChannel::new();
        channel.set_response("mgr services", r#"["dashboard"]"#);
        let client = CephClient::new(channel);

        let result = client.mgr_services().await;
        assert!(matches!(result, Err(CephError::DecodeFailed { .. })));
    }

    #[tokio::test]
    async fn test_mgr_services_array_of_urls_is_decode_error() {
        let channel = MockAdminChannel::new();
        channel.set_response("mgr services", r#"["https://10.0.0.5:8443/", ""]"#);
        let client = CephClient::new(channel);

        let result = client.mgr_services().await;
        assert!(matches!(result, Err(CephError::DecodeFailed { .. })));
    }

    #[tokio::test]
    async fn test_mgr_services_null_is_decode_error() {
        let channel = MockAdminChannel::new();
        channel.set_response("mgr services", "null");
        let client = CephClient::new(channel);

        let result = client.mgr_services().await;
        assert!(matches!(result, Err(CephError::DecodeFailed { .. })));
    }

    #[tokio::test]
    async fn test_mgr_services_wrong_value_type_is_decode_error() {
        let channel = MockAdminChannel::new();
        channel.set_response("mgr services", r#"{"dashboard":8443}"#);
        let client = CephClient::new(channel);

        let result = client.mgr_services().await;
        assert!(matches!(result, Err(CephError::DecodeFailed { .. })));
    }

    #[tokio::test]
    async fn test_mgr_services_channel_failure() {
        let channel = MockAdminChannel::new();
        channel.fail_command("mgr services", "connection refused");
        let client = CephClient::new(channel);

        let result = client.mgr_services().await;
        assert!(matches!(result, Err(CephError::QueryFailed { .. })));
    }

    #[tokio::test]
    async fn test_ping_returns_version() {
        let channel = MockAdminChannel::new();
        channel.set_response("version", r#"{"version":"ceph version 18.2.4 reef (stable)"}"#);
        let client = CephClient::new(channel);

        let version = client.ping().await.unwrap();
        assert_eq!(version, "ceph version 18.2.4 reef (stable)");
    }
}
