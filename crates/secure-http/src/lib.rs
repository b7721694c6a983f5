//! Unified plain/mutual-TLS HTTP client.
//!
//! This crate provides one calling convention for outbound HTTP calls:
//!
//! - **Plain calls** (`http_*`) carry authentication material (basic or
//!   bearer) and use the `http://` scheme.
//! - **Secure calls** (`https_*`) carry TLS material (client certificate,
//!   key, CA bundle, protocol policy) and use the `https://` scheme.
//!
//! Both families fall back to process-wide credential defaults read once when
//! the client is built. A per-call override replaces the default for that
//! call only, as a whole.
//!
//! # Quick Start
//!
//! ```ignore
//! use secure_http::{ClientConfig, SecureHttpClient};
//!
//! let client = SecureHttpClient::from_config_file("/etc/svc/secure-http.toml")?;
//!
//! // JSON body, default credentials
//! let created = client
//!     .http_post("orders.internal/orders", serde_json::json!({"sku": "A1"}), None, None, None)
//!     .await?;
//!
//! // Multipart upload over mTLS with a per-call CA bundle
//! let mut form = FormFields::new();
//! form.insert("file".to_string(), FormValue::file(bytes).with_file_name("report.pdf"));
//! client
//!     .https_post_form_data("files.internal/upload", form, None, None, Some(TlsMaterial::new().ca(ca_pem)))
//!     .await?;
//! ```
//!
//! # Transports
//!
//! The client is generic over [`Transport`]. [`ReqwestTransport`] is the
//! default; tests and embedders can supply their own.

mod client;
pub mod config;
pub mod credentials;
pub mod descriptor;
mod error;
pub mod tls;
pub mod transport;

pub use client::SecureHttpClient;
pub use config::{ClientConfig, TransportSection};
pub use credentials::{
    AuthMaterial, CredentialAuthority, CredentialContext, CredentialSlots,
    FileCredentialAuthority, OnceCredentialAuthority, TlsMaterial,
};
pub use descriptor::{
    CredentialField, FormFields, FormValue, HttpMethod, QueryParams, QueryValue, RequestBody,
    RequestDescriptor, Scheme, SchemePolicy,
};
pub use error::{ConfigError, Result, TransportError};
pub use transport::{
    ReqwestTransport, ReqwestTransportBuilder, ResponseBody, Transport, TransportConfig,
    TransportResponse,
};
