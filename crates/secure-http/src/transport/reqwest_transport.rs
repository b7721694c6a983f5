//! The default transport, backed by reqwest.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::redirect::Policy;

use super::Transport;
use super::response::{ResponseBody, TransportResponse};
use crate::credentials::{AuthMaterial, TlsMaterial};
use crate::descriptor::{FormFields, FormValue, HttpMethod, RequestBody, RequestDescriptor};
use crate::error::{Result, TransportError};
use crate::tls::TlsSettings;

/// Configuration for the reqwest transport.
#[derive(Clone, Debug, PartialEq)]
pub struct TransportConfig {
    /// Request timeout.
    pub timeout: Option<Duration>,
    /// Connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Whether to follow redirects.
    pub follow_redirects: bool,
    /// Maximum number of redirects to follow.
    pub max_redirects: usize,
    /// User agent sent with every request.
    pub user_agent: Option<String>,
    /// Proxy URL.
    pub proxy: Option<String>,
    /// Turn non-2xx responses into [`TransportError::HttpStatus`].
    pub error_for_status: bool,
    /// Most TLS-specific clients kept at once; `0` disables caching.
    pub max_tls_clients: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            connect_timeout: Some(Duration::from_secs(10)),
            follow_redirects: true,
            max_redirects: 10,
            user_agent: Some(format!("secure-http/{} (Rust)", env!("CARGO_PKG_VERSION"))),
            proxy: None,
            error_for_status: true,
            max_tls_clients: 16,
        }
    }
}

/// Builder for a [`ReqwestTransport`].
#[derive(Debug, Default)]
pub struct ReqwestTransportBuilder {
    config: TransportConfig,
}

impl ReqwestTransportBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Disable request timeout.
    pub fn no_timeout(mut self) -> Self {
        self.config.timeout = None;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Disable redirect following.
    pub fn no_redirects(mut self) -> Self {
        self.config.follow_redirects = false;
        self
    }

    /// Set the maximum number of redirects to follow.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Set a proxy URL.
    pub fn proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.config.proxy = Some(proxy_url.into());
        self
    }

    /// Return non-2xx responses instead of failing with a status error.
    pub fn allow_error_status(mut self) -> Self {
        self.config.error_for_status = false;
        self
    }

    /// Limit the number of cached TLS-specific clients.
    pub fn max_tls_clients(mut self, max: usize) -> Self {
        self.config.max_tls_clients = max;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: TransportConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the transport.
    pub fn build(self) -> Result<ReqwestTransport> {
        let plain = client_builder(&self.config)?.build()?;
        Ok(ReqwestTransport {
            inner: Arc::new(TransportInner {
                config: self.config,
                plain,
                tls_clients: Mutex::new(TlsClientCache::default()),
            }),
        })
    }
}

/// Shared reqwest builder settings, before any TLS material is applied.
fn client_builder(config: &TransportConfig) -> Result<reqwest::ClientBuilder> {
    let mut builder = reqwest::Client::builder();

    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(connect_timeout) = config.connect_timeout {
        builder = builder.connect_timeout(connect_timeout);
    }

    if config.follow_redirects {
        builder = builder.redirect(Policy::limited(config.max_redirects));
    } else {
        builder = builder.redirect(Policy::none());
    }

    if let Some(ref ua) = config.user_agent {
        builder = builder.user_agent(ua);
    }

    if let Some(ref proxy_url) = config.proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| TransportError::Request(format!("Invalid proxy: {e}")))?;
        builder = builder.proxy(proxy);
    }

    Ok(builder)
}

struct TransportInner {
    config: TransportConfig,
    plain: reqwest::Client,
    tls_clients: Mutex<TlsClientCache>,
}

/// TLS-specific clients keyed by material, evicted oldest first.
#[derive(Default)]
struct TlsClientCache {
    clients: HashMap<TlsMaterial, reqwest::Client>,
    order: VecDeque<TlsMaterial>,
}

impl TlsClientCache {
    fn get(&self, material: &TlsMaterial) -> Option<reqwest::Client> {
        self.clients.get(material).cloned()
    }

    /// Insert `client` unless another caller got there first, in which case
    /// the existing client wins.
    fn insert(
        &mut self,
        material: &TlsMaterial,
        client: reqwest::Client,
        capacity: usize,
    ) -> reqwest::Client {
        if let Some(existing) = self.clients.get(material) {
            return existing.clone();
        }
        if capacity == 0 {
            return client;
        }
        while self.order.len() >= capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.clients.remove(&oldest);
            tracing::debug!(target: "secure_http::transport", "evicted TLS client");
        }
        self.order.push_back(material.clone());
        self.clients.insert(material.clone(), client.clone());
        client
    }

    fn len(&self) -> usize {
        self.clients.len()
    }

    fn clear(&mut self) {
        self.clients.clear();
        self.order.clear();
    }
}

/// A [`Transport`] that performs requests with reqwest.
///
/// Requests without TLS material share one pooled client. Each distinct
/// [`TlsMaterial`] gets its own client, built on first use and kept for
/// later calls so pooled connections and TLS sessions are reused. At most
/// [`TransportConfig::max_tls_clients`] are kept, oldest evicted first.
///
/// Certificate and key files are read when a client is built. A file
/// rotated on disk is picked up once its client is evicted or
/// [`clear_tls_clients`](Self::clear_tls_clients) is called.
///
/// Cheap to clone; clones share clients and configuration.
#[derive(Clone)]
pub struct ReqwestTransport {
    inner: Arc<TransportInner>,
}

impl ReqwestTransport {
    /// Create a transport with default configuration.
    pub fn new() -> Result<Self> {
        ReqwestTransportBuilder::new().build()
    }

    /// Create a builder for configuring a new transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::new()
    }

    /// Create a transport from a configuration.
    pub fn from_config(config: TransportConfig) -> Result<Self> {
        ReqwestTransportBuilder::new().config(config).build()
    }

    /// Get the transport's configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.inner.config
    }

    /// Number of TLS-specific clients currently cached.
    pub fn tls_client_count(&self) -> usize {
        self.inner.tls_clients.lock().len()
    }

    /// Drop every cached TLS-specific client so certificate files are
    /// read again on next use.
    pub fn clear_tls_clients(&self) {
        self.inner.tls_clients.lock().clear();
        tracing::debug!(target: "secure_http::transport", "cleared TLS clients");
    }

    fn client_for(&self, request: &RequestDescriptor) -> Result<reqwest::Client> {
        let Some(material) = request.tls_context() else {
            return Ok(self.inner.plain.clone());
        };

        let cached = self.inner.tls_clients.lock().get(material);
        if let Some(client) = cached {
            return Ok(client);
        }

        // Built outside the lock; insert keeps whichever client landed first.
        let settings = TlsSettings::from_material(material)?;
        let client = settings
            .apply(client_builder(&self.inner.config)?)?
            .build()
            .map_err(|e| TransportError::Tls(format!("Failed to build TLS client: {e}")))?;
        tracing::debug!(
            target: "secure_http::transport",
            "built TLS client (identity: {}, custom roots: {})",
            settings.identity.is_some(),
            settings.roots.is_some()
        );
        Ok(self
            .inner
            .tls_clients
            .lock()
            .insert(material, client, self.inner.config.max_tls_clients))
    }

    async fn execute(
        &self,
        method: HttpMethod,
        request: RequestDescriptor,
    ) -> Result<TransportResponse> {
        let client = self.client_for(&request)?;

        let mut url = url::Url::parse(request.url())?;
        if let Some(query) = request.query() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                for value in value.values() {
                    pairs.append_pair(key, value);
                }
            }
        }

        let mut req_builder = client.request(method.to_reqwest(), url.clone());

        let caller_has = |name: http::header::HeaderName| {
            request.headers().is_some_and(|headers| headers.contains_key(name))
        };

        if let Some(headers) = request.headers() {
            req_builder = req_builder.headers(headers.clone());
        }

        if let Some(auth) = request.auth() {
            if caller_has(http::header::AUTHORIZATION) {
                tracing::debug!(
                    target: "secure_http::transport",
                    "caller supplied an authorization header, auth material not applied"
                );
            } else {
                req_builder = apply_auth(req_builder, auth);
            }
        }

        match request.body() {
            Some(RequestBody::Json(value)) => {
                if !caller_has(http::header::ACCEPT) {
                    req_builder = req_builder.header(http::header::ACCEPT, "application/json");
                }
                req_builder = req_builder.json(value);
            }
            Some(RequestBody::Form(fields)) => {
                req_builder = req_builder.multipart(multipart_form(fields)?);
            }
            None => {}
        }

        tracing::debug!(target: "secure_http::transport", "{} {}", method, url);

        let response = req_builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let final_url = response.url().to_string();

        let json_response = headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("json"));
        let bytes = response.bytes().await?;
        let body = ResponseBody::parse(&bytes, request.is_json() || json_response);

        tracing::debug!(target: "secure_http::transport", "{} {} -> {}", method, url, status);

        if self.inner.config.error_for_status && !(200..300).contains(&status) {
            let message = match &body {
                ResponseBody::Empty => None,
                ResponseBody::Json(value) => Some(value.to_string()),
                ResponseBody::Text(text) => Some(text.clone()),
            };
            return Err(TransportError::HttpStatus { status, message });
        }

        Ok(TransportResponse::new(status, headers, final_url, body))
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Attach credentials. A bearer token takes precedence over user/pass.
fn apply_auth(builder: reqwest::RequestBuilder, auth: &AuthMaterial) -> reqwest::RequestBuilder {
    if auth.send_immediately == Some(false) {
        tracing::debug!(
            target: "secure_http::transport",
            "challenge-response auth unsupported, sending credentials preemptively"
        );
    }

    if let Some(token) = &auth.bearer {
        return builder.bearer_auth(token);
    }

    match (&auth.user, &auth.pass) {
        (Some(user), pass) => builder.basic_auth(user, pass.as_ref()),
        (None, Some(_)) => {
            tracing::warn!(target: "secure_http::transport", "password supplied without user, ignoring");
            builder
        }
        (None, None) => builder,
    }
}

fn multipart_form(fields: &FormFields) -> Result<reqwest::multipart::Form> {
    let mut form = reqwest::multipart::Form::new();
    for (name, value) in fields {
        form = match value {
            FormValue::Text(text) => form.text(name.clone(), text.clone()),
            FormValue::File {
                bytes,
                file_name,
                content_type,
            } => {
                let mut part = reqwest::multipart::Part::bytes(bytes.to_vec());
                if let Some(file_name) = file_name {
                    part = part.file_name(file_name.clone());
                }
                if let Some(mime) = content_type {
                    part = part.mime_str(mime).map_err(|e| {
                        TransportError::Serialization(format!("Invalid MIME type '{mime}': {e}"))
                    })?;
                }
                form.part(name.clone(), part)
            }
        };
    }
    Ok(form)
}

impl Transport for ReqwestTransport {
    type Response = TransportResponse;
    type Error = TransportError;

    async fn get(&self, request: RequestDescriptor) -> Result<TransportResponse> {
        self.execute(HttpMethod::Get, request).await
    }

    async fn post(&self, request: RequestDescriptor) -> Result<TransportResponse> {
        self.execute(HttpMethod::Post, request).await
    }

    async fn put(&self, request: RequestDescriptor) -> Result<TransportResponse> {
        self.execute(HttpMethod::Put, request).await
    }

    async fn patch(&self, request: RequestDescriptor) -> Result<TransportResponse> {
        self.execute(HttpMethod::Patch, request).await
    }

    async fn delete(&self, request: RequestDescriptor) -> Result<TransportResponse> {
        self.execute(HttpMethod::Delete, request).await
    }
}
