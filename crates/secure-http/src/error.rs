//! Error types for the secure HTTP client.
//!
//! The client façade never produces errors of its own: every failure of a
//! verb call comes from the transport and is returned unchanged. The types
//! here cover the bundled [`ReqwestTransport`](crate::ReqwestTransport) and
//! the configuration loaders.

use std::path::PathBuf;

/// Errors raised by the reqwest-backed transport.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Network-level failure reaching the target.
    #[error("Connection error: {0}")]
    Connection(String),
    /// Certificate, key, passphrase or handshake problem on a secure call.
    #[error("TLS error: {0}")]
    Tls(String),
    /// Non-success status returned by the remote server.
    #[error("{}", format_status(.status, .message))]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// Response body, if the server sent one.
        message: Option<String>,
    },
    /// The request body could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The target URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Request timed out.
    #[error("Request timed out")]
    Timeout,
    /// The response body could not be read or decoded.
    #[error("Invalid response body: {0}")]
    InvalidBody(String),
    /// Any other request failure (builder errors, invalid headers, redirects).
    #[error("HTTP request error: {0}")]
    Request(String),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

fn format_status(status: &u16, message: &Option<String>) -> String {
    match message {
        Some(msg) if !msg.is_empty() => format!("HTTP {status}: {msg}"),
        _ => format!("HTTP {status}"),
    }
}

impl TransportError {
    /// The HTTP status code, if this is a status error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure happened while setting up or negotiating TLS.
    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

/// Whether a rustls error sits anywhere in the source chain.
fn caused_by_tls(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<rustls::Error>() {
            return true;
        }
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.get_ref().is_some_and(|inner| inner.is::<rustls::Error>()) {
                return true;
            }
        }
        current = e.source();
    }
    false
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if caused_by_tls(&err) {
            Self::Tls(err.to_string())
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_decode() || err.is_body() {
            Self::InvalidBody(err.to_string())
        } else if let Some(status) = err.status() {
            Self::HttpStatus {
                status: status.as_u16(),
                message: None,
            }
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl From<url::ParseError> for TransportError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for TransportError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::Request(format!("Invalid header name: {err}"))
    }
}

impl From<http::header::InvalidHeaderValue> for TransportError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::Request(format!("Invalid header value: {err}"))
    }
}

/// Errors raised while loading configuration or credential material.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read configuration '{path}': {source}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration text is not valid TOML for the expected shape.
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// The transport described by the configuration could not be built.
    #[error("Failed to create transport: {0}")]
    Transport(#[from] TransportError),
    /// A process-wide credential context was already installed.
    #[error("Credential context has already been initialized")]
    AlreadyInitialized,
}

/// A specialized Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
