//! `[serve]` section configuration.
//!
//! Contains the three listeners of the preview server.
//!
//! # Example
//!
//! ```toml
//! [serve]
//! interface = "127.0.0.1"     # Network interface for all listeners
//! port = 5310                 # Host origin: shell page and API
//! host_name = "localhost"     # Host name the shell page is opened with
//! guest_port = 5311           # Guest origin: sandboxed documents
//! guest_host = "127.0.0.1"    # Host name guest documents are loaded from
//! ws_port = 5312              # Diagnostics channel (WebSocket)
//! watch = true                # Reload sources from disk on change
//! ```
//!
//! `host_name` and `guest_host` should differ so the shell page and the
//! guest documents do not share cookies or storage.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

/// Preview server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub interface: IpAddr,

    /// Host-origin HTTP port.
    pub port: u16,

    pub host_name: String,

    /// Guest-origin HTTP port.
    pub guest_port: u16,

    pub guest_host: String,

    /// WebSocket port of the diagnostics channel.
    pub ws_port: u16,

    /// Enable the workspace file watcher.
    pub watch: bool,
}

impl ServeConfig {
    pub const PORT: FieldPath = FieldPath::new("serve.port");
    pub const GUEST_PORT: FieldPath = FieldPath::new("serve.guest_port");
    pub const WS_PORT: FieldPath = FieldPath::new("serve.ws_port");
    pub const HOST_NAME: FieldPath = FieldPath::new("serve.host_name");
    pub const GUEST_HOST: FieldPath = FieldPath::new("serve.guest_host");

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.guest_port == self.port {
            diag.error_with_hint(
                Self::GUEST_PORT,
                format!("guest port {} is the host port", self.guest_port),
                "guest documents must be served from their own origin",
            );
        }
        if self.ws_port == self.port || self.ws_port == self.guest_port {
            diag.error(
                Self::WS_PORT,
                format!("websocket port {} is already used by an HTTP listener", self.ws_port),
            );
        }

        for (field, value) in [(Self::HOST_NAME, &self.host_name), (Self::GUEST_HOST, &self.guest_host)] {
            if value.is_empty() || value.contains(['/', ':', ' ']) {
                diag.error(field, format!("`{value}` is not a host name"));
            }
        }
        if self.host_name.eq_ignore_ascii_case(&self.guest_host) {
            diag.warn(
                Self::GUEST_HOST,
                "guest documents share a host name with the shell page",
            );
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 5310,
            host_name: "localhost".to_string(),
            guest_port: 5311,
            guest_host: "127.0.0.1".to_string(),
            ws_port: 5312,
            watch: true,
        }
    }
}

/// `http://host:port`
pub fn http_origin(host: &str, port: u16) -> String {
    format!("http://{host}:{port}")
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_serve_config() {
        let config = test_parse_config(
            "[serve]\ninterface = \"0.0.0.0\"\nport = 8080\nguest_port = 8081\nws_port = 8082\nwatch = false",
        );

        assert_eq!(config.serve.interface, IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        assert_eq!(config.serve.port, 8080);
        assert_eq!(config.serve.guest_port, 8081);
        assert_eq!(config.serve.ws_port, 8082);
        assert!(!config.serve.watch);
    }

    #[test]
    fn test_serve_config_defaults() {
        let config = test_parse_config("");

        assert_eq!(config.serve.interface, IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
        assert_eq!(config.serve.port, 5310);
        assert_eq!(config.serve.guest_port, 5311);
        assert_eq!(config.serve.ws_port, 5312);
        assert_eq!(config.serve.host_name, "localhost");
        assert_eq!(config.serve.guest_host, "127.0.0.1");
        assert!(config.serve.watch);
    }

    #[test]
    fn test_serve_config_ipv6_interface() {
        let config = test_parse_config("[serve]\ninterface = \"::1\"");
        assert_eq!(
            config.serve.interface,
            IpAddr::V6(Ipv6Addr::new(0, 0, 0, 0, 0, 0, 0, 1))
        );
    }

    #[test]
    fn test_validate_rejects_shared_ports() {
        let config = test_parse_config("[serve]\nport = 7000\nguest_port = 7000\nws_port = 7000");
        let mut diag = ConfigDiagnostics::new();
        config.serve.validate(&mut diag);

        let fields: Vec<_> = diag.errors().iter().map(|e| e.field).collect();
        assert_eq!(fields, vec![ServeConfig::GUEST_PORT, ServeConfig::WS_PORT]);
    }

    #[test]
    fn test_validate_host_names() {
        let config = test_parse_config("[serve]\nhost_name = \"localhost\"\nguest_host = \"LOCALHOST\"");
        let mut diag = ConfigDiagnostics::new();
        config.serve.validate(&mut diag);
        assert!(!diag.has_errors());
        assert_eq!(diag.warnings().len(), 1);

        let config = test_parse_config("[serve]\nguest_host = \"http://x\"");
        let mut diag = ConfigDiagnostics::new();
        config.serve.validate(&mut diag);
        assert_eq!(diag.errors()[0].field, ServeConfig::GUEST_HOST);
    }

    #[test]
    fn test_http_origin() {
        assert_eq!(http_origin("127.0.0.1", 5311), "http://127.0.0.1:5311");
    }
}
