//! Configuration schema definitions.
//!
//! The document is a flat TOML table. Every key is optional and is coerced
//! on its own, so a malformed `httpPort` does not discard a valid
//! `serviceName`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use serde::Deserialize;
use thiserror::Error;
use toml::Value;

/// Default HTTP command listener port.
pub const DEFAULT_HTTP_PORT: u16 = 6969;

/// Default OSCQuery service display name.
pub const DEFAULT_SERVICE_NAME: &str = "Giggletech";

/// Validated, immutable configuration for the helper process.
#[derive(Debug, Clone, PartialEq)]
pub struct HelperConfig {
    /// Port the command listener binds to.
    pub http_port: u16,

    /// Display name handed to every managed service instance.
    pub service_name: String,

    /// Address the command listener and managed service bind to. Loopback only.
    pub bind_address: IpAddr,

    /// Prometheus exporter address. Disabled when absent.
    pub metrics_address: Option<SocketAddr>,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            metrics_address: None,
        }
    }
}

/// A key that was present but could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigIssue {
    #[error("`{key}` must be {expected}, found `{found}`")]
    Malformed {
        key: &'static str,
        expected: &'static str,
        found: String,
    },
}

/// The document as written on disk, before coercion.
#[derive(Debug, Default, Deserialize)]
pub struct RawConfig {
    #[serde(rename = "httpPort", alias = "http_port")]
    pub http_port: Option<Value>,

    #[serde(rename = "serviceName", alias = "service_name")]
    pub service_name: Option<Value>,

    #[serde(rename = "bindAddress", alias = "bind_address")]
    pub bind_address: Option<Value>,

    #[serde(rename = "metricsAddress", alias = "metrics_address")]
    pub metrics_address: Option<Value>,
}

impl RawConfig {
    /// Coerce every key, falling back to its default and recording an issue
    /// when a present value is unusable.
    pub fn resolve(self) -> (HelperConfig, Vec<ConfigIssue>) {
        let mut config = HelperConfig::default();
        let mut issues = Vec::new();

        if let Some(value) = self.http_port {
            match value.as_integer().and_then(|port| u16::try_from(port).ok()) {
                Some(port) if port != 0 => config.http_port = port,
                _ => issues.push(malformed("httpPort", "an integer between 1 and 65535", &value)),
            }
        }

        if let Some(value) = self.service_name {
            match value.as_str().map(str::trim) {
                Some(name) if !name.is_empty() => config.service_name = name.to_string(),
                _ => issues.push(malformed("serviceName", "a non-empty string", &value)),
            }
        }

        if let Some(value) = self.bind_address {
            match value.as_str().and_then(|s| s.parse::<IpAddr>().ok()) {
                Some(ip) if ip.is_loopback() => config.bind_address = ip,
                _ => issues.push(malformed("bindAddress", "a loopback IP address", &value)),
            }
        }

        if let Some(value) = self.metrics_address {
            match value.as_str().and_then(|s| s.parse::<SocketAddr>().ok()) {
                Some(addr) => config.metrics_address = Some(addr),
                None => issues.push(malformed("metricsAddress", "a socket address", &value)),
            }
        }

        (config, issues)
    }
}

fn malformed(key: &'static str, expected: &'static str, found: &Value) -> ConfigIssue {
    ConfigIssue::Malformed {
        key,
        expected,
        found: found.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(doc: &str) -> (HelperConfig, Vec<ConfigIssue>) {
        toml::from_str::<RawConfig>(doc).unwrap().resolve()
    }

    #[test]
    fn empty_document_uses_defaults() {
        let (config, issues) = resolve("");
        assert_eq!(config, HelperConfig::default());
        assert!(issues.is_empty());
    }

    #[test]
    fn reads_camel_case_keys() {
        let (config, issues) = resolve("httpPort = 7070\nserviceName = \"Haptics\"\n");
        assert_eq!(config.http_port, 7070);
        assert_eq!(config.service_name, "Haptics");
        assert!(issues.is_empty());
    }

    #[test]
    fn accepts_snake_case_aliases() {
        let (config, _) = resolve("http_port = 7171\nservice_name = \"Alias\"\n");
        assert_eq!(config.http_port, 7171);
        assert_eq!(config.service_name, "Alias");
    }

    #[test]
    fn malformed_port_keeps_valid_name() {
        let (config, issues) = resolve("httpPort = \"abc\"\nserviceName = \"Kept\"\n");
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.service_name, "Kept");
        assert_eq!(issues.len(), 1);
        assert!(matches!(issues[0], ConfigIssue::Malformed { key: "httpPort", .. }));
    }

    #[test]
    fn out_of_range_port_falls_back() {
        let (config, issues) = resolve("httpPort = 70000\n");
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(issues.len(), 1);

        let (config, issues) = resolve("httpPort = 0\n");
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn blank_name_falls_back() {
        let (config, issues) = resolve("serviceName = \"   \"\n");
        assert_eq!(config.service_name, DEFAULT_SERVICE_NAME);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn optional_addresses() {
        let (config, issues) =
            resolve("bindAddress = \"::1\"\nmetricsAddress = \"127.0.0.1:9000\"\n");
        assert!(issues.is_empty());
        assert_eq!(config.bind_address.to_string(), "::1");
        assert_eq!(config.metrics_address, Some("127.0.0.1:9000".parse().unwrap()));
    }

    #[test]
    fn non_loopback_bind_address_is_rejected() {
        for address in ["0.0.0.0", "192.168.1.20", "::"] {
            let (config, issues) = resolve(&format!("bindAddress = \"{}\"\n", address));
            assert_eq!(config.bind_address, HelperConfig::default().bind_address);
            assert_eq!(issues.len(), 1, "{address} should be reported");
            assert!(matches!(issues[0], ConfigIssue::Malformed { key: "bindAddress", .. }));
        }
    }
}
