//! File-based configuration.
//!
//! A single TOML document configures the scheme policy, the reqwest
//! transport and, optionally, the process-wide credential context:
//!
//! ```toml
//! [schemes]
//! plain = "http"
//! secure = "https"
//!
//! [transport]
//! timeout_secs = 15
//! error_for_status = false
//!
//! [credentials.tls]
//! certFile = "/etc/svc/client.crt"
//! keyFile = "/etc/svc/client.key"
//!
//! [credentials.auth]
//! bearer = "service-token"
//! ```
//!
//! Every table and key is optional.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::credentials::{CredentialAuthority, CredentialContext};
use crate::descriptor::SchemePolicy;
use crate::error::ConfigError;
use crate::transport::TransportConfig;

/// Top-level client configuration.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Scheme used by each call family.
    pub schemes: SchemePolicy,
    /// Transport overrides.
    pub transport: TransportSection,
    /// Process-wide credential defaults.
    pub credentials: Option<CredentialContext>,
}

impl ClientConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(target: "secure_http::config", "loaded configuration from '{}'", path.display());
        Ok(config)
    }

    /// The transport configuration, defaults filled in.
    pub fn transport_config(&self) -> TransportConfig {
        self.transport.to_transport_config()
    }
}

impl CredentialAuthority for ClientConfig {
    fn credential_context(&self) -> Option<CredentialContext> {
        self.credentials.clone()
    }
}

/// The `[transport]` table. Unset keys keep the transport defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportSection {
    /// Request timeout in seconds; `0` disables it.
    pub timeout_secs: Option<u64>,
    /// Connect timeout in seconds; `0` disables it.
    pub connect_timeout_secs: Option<u64>,
    /// Whether to follow redirects.
    pub follow_redirects: Option<bool>,
    /// Maximum number of redirects to follow.
    pub max_redirects: Option<usize>,
    /// User agent string.
    pub user_agent: Option<String>,
    /// Proxy URL.
    pub proxy: Option<String>,
    /// Whether non-2xx responses are errors.
    pub error_for_status: Option<bool>,
    /// Most TLS-specific clients kept at once; `0` disables caching.
    pub max_tls_clients: Option<usize>,
}

impl TransportSection {
    /// Overlay this table on [`TransportConfig::default`].
    pub fn to_transport_config(&self) -> TransportConfig {
        let mut config = TransportConfig::default();
        if let Some(secs) = self.timeout_secs {
            config.timeout = seconds(secs);
        }
        if let Some(secs) = self.connect_timeout_secs {
            config.connect_timeout = seconds(secs);
        }
        if let Some(follow) = self.follow_redirects {
            config.follow_redirects = follow;
        }
        if let Some(max) = self.max_redirects {
            config.max_redirects = max;
        }
        if let Some(ua) = &self.user_agent {
            config.user_agent = Some(ua.clone());
        }
        if let Some(proxy) = &self.proxy {
            config.proxy = Some(proxy.clone());
        }
        if let Some(error_for_status) = self.error_for_status {
            config.error_for_status = error_for_status;
        }
        if let Some(max) = self.max_tls_clients {
            config.max_tls_clients = max;
        }
        config
    }
}

fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
