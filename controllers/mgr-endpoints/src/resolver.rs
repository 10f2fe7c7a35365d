//! Address resolution for mgr service URLs.
//!
//! Turns a URL advertised by `mgr services` into a literal IP and port.
//! Hostnames are rejected unless the operator explicitly opts into DNS
//! resolution with [`HostnamePolicy::ResolvePreferIpv4`].

use serde::Deserialize;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;
use url::{Host, Url};

/// Errors produced while resolving a service URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The URL could not be parsed or has no host
    #[error("malformed URL '{url}': {reason}")]
    MalformedUrl {
        /// The offending URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// No explicit port and no default for the scheme
    #[error("no port specified and unknown scheme: {0}")]
    UnknownSchemeNoPort(String),

    /// Port is not a number in 1..=65535
    #[error("invalid port in '{0}'")]
    InvalidPort(String),

    /// The host is a name, not an IP literal
    #[error("hostname '{0}' is not supported, an IP address is required")]
    HostnameNotSupported(String),

    /// DNS fallback was enabled but produced no address
    #[error("resolve hostname {host}: {reason}")]
    DnsLookupFailed {
        /// Hostname that was looked up
        host: String,
        /// Lookup error or "no addresses"
        reason: String,
    },
}

/// A resolved service endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointAddress {
    /// Literal IP address
    pub ip: IpAddr,
    /// Port in 1..=65535
    pub port: u16,
}

impl EndpointAddress {
    /// EndpointSlice `addressType` for this address.
    pub fn address_type(&self) -> &'static str {
        match self.ip {
            IpAddr::V4(_) => "IPv4",
            IpAddr::V6(_) => "IPv6",
        }
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(ip) => write!(f, "{}:{}", ip, self.port),
            IpAddr::V6(ip) => write!(f, "[{}]:{}", ip, self.port),
        }
    }
}

/// What to do when a service URL carries a hostname instead of an IP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum HostnamePolicy {
    /// Fail resolution with [`ResolveError::HostnameNotSupported`]
    #[default]
    #[serde(rename = "reject")]
    Reject,
    /// Look the name up in DNS and take the first IPv4 result (any family if none).
    ///
    /// Round-robin records can hand out a different address every cycle, so
    /// this is a fallback for clusters whose mgr advertises names.
    #[serde(rename = "resolve")]
    ResolvePreferIpv4,
}

impl FromStr for HostnamePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" | "" => Ok(HostnamePolicy::Reject),
            "resolve" => Ok(HostnamePolicy::ResolvePreferIpv4),
            other => Err(format!("unknown hostname policy '{other}' (expected 'reject' or 'resolve')")),
        }
    }
}

enum Target {
    Ip(IpAddr),
    Name(String),
}

fn parse_target(raw: &str) -> Result<(Target, u16), ResolveError> {
    let url = Url::parse(raw).map_err(|e| match e {
        url::ParseError::InvalidPort => ResolveError::InvalidPort(raw.to_string()),
        other => ResolveError::MalformedUrl {
            url: raw.to_string(),
            reason: other.to_string(),
        },
    })?;

    let target = match url.host() {
        Some(Host::Ipv4(ip)) => Target::Ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => Target::Ip(IpAddr::V6(ip)),
        // Non-special schemes keep IPv4 literals as opaque host strings
        Some(Host::Domain(name)) => match name.parse::<IpAddr>() {
            Ok(ip) => Target::Ip(ip),
            Err(_) => Target::Name(name.to_string()),
        },
        None => {
            return Err(ResolveError::MalformedUrl {
                url: raw.to_string(),
                reason: "missing host".to_string(),
            });
        }
    };

    let port = match url.port() {
        Some(port) => port,
        None => match url.scheme() {
            "https" => 443,
            "http" => 80,
            other => return Err(ResolveError::UnknownSchemeNoPort(other.to_string())),
        },
    };
    if port == 0 {
        return Err(ResolveError::InvalidPort(raw.to_string()));
    }

    Ok((target, port))
}

/// Resolve `raw` into an endpoint without any I/O.
///
/// The host must be an IP literal; an explicit port wins, otherwise `https`
/// means 443 and `http` means 80.
pub fn parse_service_url(raw: &str) -> Result<EndpointAddress, ResolveError> {
    match parse_target(raw)? {
        (Target::Ip(ip), port) => Ok(EndpointAddress { ip, port }),
        (Target::Name(name), _) => Err(ResolveError::HostnameNotSupported(name)),
    }
}

/// Resolve `raw` under `policy`.
///
/// Identical to [`parse_service_url`] for [`HostnamePolicy::Reject`].
pub async fn resolve_service_url(
    raw: &str,
    policy: HostnamePolicy,
) -> Result<EndpointAddress, ResolveError> {
    let (name, port) = match (parse_target(raw)?, policy) {
        ((Target::Ip(ip), port), _) => return Ok(EndpointAddress { ip, port }),
        ((Target::Name(name), _), HostnamePolicy::Reject) => {
            return Err(ResolveError::HostnameNotSupported(name));
        }
        ((Target::Name(name), port), HostnamePolicy::ResolvePreferIpv4) => (name, port),
    };

    warn!(host = %name, "Service URL uses a hostname, falling back to DNS resolution");

    let addrs: Vec<IpAddr> = tokio::net::lookup_host((name.as_str(), port))
        .await
        .map_err(|e| ResolveError::DnsLookupFailed {
            host: name.clone(),
            reason: e.to_string(),
        })?
        .map(|addr| addr.ip())
        .collect();

    let ip = addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| ResolveError::DnsLookupFailed {
            host: name.clone(),
            reason: "no IPs found".to_string(),
        })?;

    Ok(EndpointAddress { ip, port })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn v4(a: u8, b: u8, c: u8, d: u8, port: u16) -> EndpointAddress {
        EndpointAddress {
            ip: IpAddr::V4(Ipv4Addr::new(a, b, c, d)),
            port,
        }
    }

    #[test]
    fn test_explicit_port() {
        assert_eq!(parse_service_url("https://10.0.0.5:8443/").unwrap(), v4(10, 0, 0, 5, 8443));
        assert_eq!(parse_service_url("http://10.0.0.5:9283/").unwrap(), v4(10, 0, 0, 5, 9283));
        assert_eq!(parse_service_url("tcp://10.0.0.5:6800").unwrap(), v4(10, 0, 0, 5, 6800));
    }

    #[test]
    fn test_explicit_port_equal_to_scheme_default() {
        assert_eq!(parse_service_url("https://10.0.0.5:443/").unwrap(), v4(10, 0, 0, 5, 443));
        assert_eq!(parse_service_url("http://10.0.0.5:443/").unwrap(), v4(10, 0, 0, 5, 443));
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(parse_service_url("https://10.0.0.5/").unwrap(), v4(10, 0, 0, 5, 443));
        assert_eq!(parse_service_url("http://10.0.0.5").unwrap(), v4(10, 0, 0, 5, 80));
    }

    #[test]
    fn test_unknown_scheme_without_port() {
        assert_eq!(
            parse_service_url("ftp://10.0.0.5/"),
            Err(ResolveError::UnknownSchemeNoPort("ftp".to_string()))
        );
    }

    #[test]
    fn test_ipv6_literal() {
        let addr = parse_service_url("https://[fd00::5]:8443/").unwrap();
        assert_eq!(addr.ip, IpAddr::V6("fd00::5".parse::<Ipv6Addr>().unwrap()));
        assert_eq!(addr.port, 8443);
        assert_eq!(addr.address_type(), "IPv6");
        assert_eq!(addr.to_string(), "[fd00::5]:8443");
    }

    #[test]
    fn test_ipv4_address_type() {
        assert_eq!(v4(10, 0, 0, 5, 80).address_type(), "IPv4");
    }

    #[test]
    fn test_invalid_ports() {
        assert!(matches!(parse_service_url("https://10.0.0.5:0/"), Err(ResolveError::InvalidPort(_))));
        assert!(matches!(parse_service_url("https://10.0.0.5:70000/"), Err(ResolveError::InvalidPort(_))));
        assert!(matches!(parse_service_url("https://10.0.0.5:abc/"), Err(ResolveError::InvalidPort(_))));
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(parse_service_url("not a url"), Err(ResolveError::MalformedUrl { .. })));
        assert!(matches!(parse_service_url("10.0.0.5:8443"), Err(ResolveError::MalformedUrl { .. })));
        assert!(matches!(parse_service_url(""), Err(ResolveError::MalformedUrl { .. })));
    }

    #[test]
    fn test_hostname_rejected() {
        assert_eq!(
            parse_service_url("https://ceph-mgr-a.example.com:8443/"),
            Err(ResolveError::HostnameNotSupported("ceph-mgr-a.example.com".to_string()))
        );
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let raw = "https://[2001:db8::1]:8443/";
        assert_eq!(parse_service_url(raw), parse_service_url(raw));
    }

    #[tokio::test]
    async fn test_resolve_reject_policy_matches_pure_parse() {
        let result = resolve_service_url("https://ceph-mgr-a.example.com/", HostnamePolicy::Reject).await;
        assert!(matches!(result, Err(ResolveError::HostnameNotSupported(_))));

        let addr = resolve_service_url("https://10.0.0.5/", HostnamePolicy::Reject).await.unwrap();
        assert_eq!(addr, v4(10, 0, 0, 5, 443));
    }

    #[tokio::test]
    async fn test_resolve_policy_localhost() {
        let addr = resolve_service_url("http://localhost:9283/", HostnamePolicy::ResolvePreferIpv4)
            .await
            .unwrap();
        assert!(addr.ip.is_loopback());
        assert_eq!(addr.port, 9283);
    }

    #[test]
    fn test_hostname_policy_from_str() {
        assert_eq!("reject".parse::<HostnamePolicy>(), Ok(HostnamePolicy::Reject));
        assert_eq!("Resolve".parse::<HostnamePolicy>(), Ok(HostnamePolicy::ResolvePreferIpv4));
        assert!("sometimes".parse::<HostnamePolicy>().is_err());
    }
}
