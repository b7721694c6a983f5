//! The secure HTTP client façade.
//!
//! Every verb call builds a fresh [`RequestDescriptor`] from the caller's
//! arguments and the client's default credential slots, then hands it to the
//! transport. Composition follows the same steps for all sixteen entry
//! points:
//!
//! 1. Resolve the credential slot. A per-call override replaces the default
//!    wholesale; without one the default (possibly absent) is used.
//! 2. Prefix the target with the scheme of the call family and attach the
//!    headers and the resolved credentials (`auth` for plain calls,
//!    `tlsContext` for secure calls).
//! 3. Attach the body, if any, as JSON or as form fields.
//! 4. Attach the query parameters only when there are some.
//! 5. Dispatch to the transport operation for the verb.
//!
//! The client adds no retries, timeouts or error handling of its own; the
//! transport's result is returned as is.
//!
//! # Example
//!
//! ```ignore
//! use secure_http::{AuthMaterial, CredentialContext, ReqwestTransport, SecureHttpClient};
//!
//! let defaults = CredentialContext {
//!     tls: None,
//!     auth: Some(AuthMaterial::bearer("T1")),
//! };
//! let client = SecureHttpClient::new(ReqwestTransport::new()?, &defaults);
//!
//! let response = client.http_get("inventory.internal/items", None, None, None).await?;
//! ```

use std::path::Path;

use http::HeaderMap;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::credentials::{
    AuthMaterial, CredentialAuthority, CredentialContext, CredentialSlots, TlsMaterial,
    resolve_override,
};
use crate::descriptor::{
    CredentialField, FormFields, HttpMethod, QueryParams, RequestBody, RequestDescriptor,
    SchemePolicy,
};
use crate::error::TransportError;
use crate::transport::{ReqwestTransport, Transport, dispatch};

/// Unified plain/secure HTTP client over a [`Transport`].
///
/// Holds two read-only default slots and no other state, so one instance can
/// serve any number of concurrent calls.
#[derive(Debug, Clone)]
pub struct SecureHttpClient<T> {
    transport: T,
    slots: CredentialSlots,
    schemes: SchemePolicy,
}

impl<T: Transport> SecureHttpClient<T> {
    /// Create a client, reading the credential context from `authority` once.
    pub fn new(transport: T, authority: &impl CredentialAuthority) -> Self {
        Self::with_context(transport, authority.credential_context())
    }

    /// Create a client from an explicit (possibly absent) credential context.
    pub fn with_context(transport: T, context: Option<CredentialContext>) -> Self {
        Self {
            transport,
            slots: CredentialSlots::from_context(context),
            schemes: SchemePolicy::default(),
        }
    }

    /// Create a client from a loaded configuration.
    ///
    /// Credentials come from the `[credentials]` table, schemes from
    /// `[schemes]`.
    pub fn from_config(transport: T, config: &ClientConfig) -> Self {
        Self::new(transport, config).with_scheme_policy(config.schemes)
    }

    /// Replace the scheme policy.
    pub fn with_scheme_policy(mut self, schemes: SchemePolicy) -> Self {
        if schemes.is_legacy_secure() {
            tracing::warn!(
                target: "secure_http::client",
                "secure calls are configured to use '{}', TLS material will not be negotiated",
                schemes.secure.prefix()
            );
        }
        self.schemes = schemes;
        self
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The default TLS material for secure calls.
    pub fn default_tls(&self) -> Option<&TlsMaterial> {
        self.slots.tls()
    }

    /// The default authentication material for plain calls.
    pub fn default_auth(&self) -> Option<&AuthMaterial> {
        self.slots.auth()
    }

    /// The scheme policy in effect.
    pub fn scheme_policy(&self) -> SchemePolicy {
        self.schemes
    }

    /// Build the descriptor a plain call would send, without sending it.
    pub fn compose_plain(
        &self,
        method: HttpMethod,
        url: &str,
        headers: Option<HeaderMap>,
        params: Option<QueryParams>,
        body: Option<RequestBody>,
        auth: Option<AuthMaterial>,
    ) -> RequestDescriptor {
        let credentials = resolve_override(auth, self.slots.auth()).map(CredentialField::Auth);
        let url = format!("{}{}", self.schemes.plain.prefix(), url);
        compose(method, url, headers, params, body, credentials)
    }

    /// Build the descriptor a secure call would send, without sending it.
    pub fn compose_secure(
        &self,
        method: HttpMethod,
        url: &str,
        headers: Option<HeaderMap>,
        params: Option<QueryParams>,
        body: Option<RequestBody>,
        tls: Option<TlsMaterial>,
    ) -> RequestDescriptor {
        let credentials = resolve_override(tls, self.slots.tls()).map(CredentialField::Tls);
        let url = format!("{}{}", self.schemes.secure.prefix(), url);
        compose(method, url, headers, params, body, credentials)
    }

    async fn send(&self, request: RequestDescriptor) -> Result<T::Response, T::Error> {
        let credentials = match request.credentials() {
            Some(CredentialField::Auth(_)) => "auth",
            Some(CredentialField::Tls(_)) => "tls",
            None => "none",
        };
        let body = match request.body() {
            Some(RequestBody::Json(_)) => "json",
            Some(RequestBody::Form(_)) => "form",
            None => "none",
        };
        tracing::debug!(
            target: "secure_http::client",
            "{} {} (credentials: {}, query: {}, body: {})",
            request.method(),
            request.url(),
            credentials,
            request.query().is_some(),
            body
        );
        dispatch(&self.transport, request).await
    }

    /// GET over the plain scheme.
    pub async fn http_get(
        &self,
        url: &str,
        headers: Option<HeaderMap>,
        params: Option<QueryParams>,
        auth: Option<AuthMaterial>,
    ) -> Result<T::Response, T::Error> {
        let request = self.compose_plain(HttpMethod::Get, url, headers, params, None, auth);
        self.send(request).await
    }

    /// GET over the secure scheme.
    pub async fn https_get(
        &self,
        url: &str,
        headers: Option<HeaderMap>,
        params: Option<QueryParams>,
        tls: Option<TlsMaterial>,
    ) -> Result<T::Response, T::Error> {
        let request = self.compose_secure(HttpMethod::Get, url, headers, params, None, tls);
        self.send(request).await
    }

    /// POST a JSON body over the plain scheme.
    pub async fn http_post(
        &self,
        url: &str,
        body: Value,
        headers: Option<HeaderMap>,
        params: Option<QueryParams>,
        auth: Option<AuthMaterial>,
    ) -> Result<T::Response, T::Error> {
        let body = Some(RequestBody::Json(body));
        let request = self.compose_plain(HttpMethod::Post, url, headers, params, body, auth);
        self.send(request).await
    }

    /// POST a JSON body over the secure scheme.
    pub async fn https_post(
        &self,
        url: &str,
        body: Value,
        headers: Option<HeaderMap>,
        params: Option<QueryParams>,
        tls: Option<TlsMaterial>,
    ) -> Result<T::Response, T::Error> {
        let body = Some(RequestBody::Json(body));
        let request = self.compose_secure(HttpMethod::Post, url, headers, params, body, tls);
        self.send(request).await
    }

    /// POST multipart form fields over the plain scheme.
    pub async fn http_post_form_data(
        &self,
        url: &str,
        form: FormFields,
        headers: Option<HeaderMap>,
        params: Option<QueryParams>,
        auth: Option<AuthMaterial>,
    ) -> Result<T::Response, T::Error> {
        let body = Some(RequestBody::Form(form));
        let request = self.compose_plain(HttpMethod::Post, url, headers, params, body, auth);
        self.send(request).await
    }

    /// POST multipart form fields over the secure scheme.
    pub async fn https_post_form_data(
        &self,
        url: &str,
        form: FormFields,
        headers: Option<HeaderMap>,
        params: Option<QueryParams>,
        tls: Option<TlsMaterial>,
    ) -> Result<T::Response, T::Error> {
        let body = Some(RequestBody::Form(form));
        let request = self.compose_secure(HttpMethod::Post, url, headers, params, body, tls);
        self.send(request).await
    }

    /// PUT a JSON body over the plain scheme.
    pub async fn http_put(
        &self,
        url: &str,
        body: Value,
        headers: Option<HeaderMap>,
        params: Option<QueryParams>,
        auth: Option<AuthMaterial>,
    ) -> Result<T::Response, T::Error> {
        let body = Some(RequestBody::Json(body));
        let request = self.compose_plain(HttpMethod::Put, url, headers, params, body, auth);
        self.send(request).await
    }

    /// PUT a JSON body over the secure scheme.
    pub async fn https_put(
        &self,
        url: &str,
        body: Value,
        headers: Option<HeaderMap>,
        params: Option<QueryParams>,
        tls: Option<TlsMaterial>,
    ) -> Result<T::Response, T::Error> {
        let body = Some(RequestBody::Json(body));
        let request = self.compose_secure(HttpMethod::Put, url, headers, params, body, tls);
        self.send(request).await
    }

    /// PUT multipart form fields over the plain scheme.
    pub async fn http_put_form_data(
        &self,
        url: &str,
        form: FormFields,
        headers: Option<HeaderMap>,
        params: Option<QueryParams>,
        auth: Option<AuthMaterial>,
    ) -> Result<T::Response, T::Error> {
        let body = Some(RequestBody::Form(form));
        let request = self.compose_plain(HttpMethod::Put, url, headers, params, body, auth);
        self.send(request).await
    }

    /// PUT multipart form fields over the secure scheme.
    pub async fn https_put_form_data(
        &self,
        url: &str,
        form: FormFields,
        headers: Option<HeaderMap>,
        params: Option<QueryParams>,
        tls: Option<TlsMaterial>,
    ) -> Result<T::Response, T::Error> {
        let body = Some(RequestBody::Form(form));
        let request = self.compose_secure(HttpMethod::Put, url, headers, params, body, tls);
        self.send(request).await
    }

    /// PATCH a JSON body over the plain scheme.
    pub async fn http_patch(
        &self,
        url: &str,
        body: Value,
        headers: Option<HeaderMap>,
        params: Option<QueryParams>,
        auth: Option<AuthMaterial>,
    ) -> Result<T::Response, T::Error> {
        let body = Some(RequestBody::Json(body));
        let request = self.compose_plain(HttpMethod::Patch, url, headers, params, body, auth);
        self.send(request).await
    }

    /// PATCH a JSON body over the secure scheme.
    pub async fn https_patch(
        &self,
        url: &str,
        body: Value,
        headers: Option<HeaderMap>,
        params: Option<QueryParams>,
        tls: Option<TlsMaterial>,
    ) -> Result<T::Response, T::Error> {
        let body = Some(RequestBody::Json(body));
        let request = self.compose_secure(HttpMethod::Patch, url, headers, params, body, tls);
        self.send(request).await
    }

    /// PATCH multipart form fields over the plain scheme.
    pub async fn http_patch_form_data(
        &self,
        url: &str,
        form: FormFields,
        headers: Option<HeaderMap>,
        params: Option<QueryParams>,
        auth: Option<AuthMaterial>,
    ) -> Result<T::Response, T::Error> {
        let body = Some(RequestBody::Form(form));
        let request = self.compose_plain(HttpMethod::Patch, url, headers, params, body, auth);
        self.send(request).await
    }

    /// PATCH multipart form fields over the secure scheme.
    pub async fn https_patch_form_data(
        &self,
        url: &str,
        form: FormFields,
        headers: Option<HeaderMap>,
        params: Option<QueryParams>,
        tls: Option<TlsMaterial>,
    ) -> Result<T::Response, T::Error> {
        let body = Some(RequestBody::Form(form));
        let request = self.compose_secure(HttpMethod::Patch, url, headers, params, body, tls);
        self.send(request).await
    }

    /// DELETE over the plain scheme.
    pub async fn http_delete(
        &self,
        url: &str,
        headers: Option<HeaderMap>,
        params: Option<QueryParams>,
        auth: Option<AuthMaterial>,
    ) -> Result<T::Response, T::Error> {
        let request = self.compose_plain(HttpMethod::Delete, url, headers, params, None, auth);
        self.send(request).await
    }

    /// DELETE over the secure scheme.
    pub async fn https_delete(
        &self,
        url: &str,
        headers: Option<HeaderMap>,
        params: Option<QueryParams>,
        tls: Option<TlsMaterial>,
    ) -> Result<T::Response, T::Error> {
        let request = self.compose_secure(HttpMethod::Delete, url, headers, params, None, tls);
        self.send(request).await
    }
}

impl SecureHttpClient<ReqwestTransport> {
    /// Create a reqwest-backed client from a loaded configuration.
    pub fn with_reqwest(config: &ClientConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::from_config(config.transport_config())?;
        Ok(Self::from_config(transport, config))
    }

    /// Load a TOML configuration file and create a reqwest-backed client.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, crate::ConfigError> {
        let config = ClientConfig::from_file(path)?;
        Ok(Self::with_reqwest(&config)?)
    }
}

fn compose(
    method: HttpMethod,
    url: String,
    headers: Option<HeaderMap>,
    params: Option<QueryParams>,
    body: Option<RequestBody>,
    credentials: Option<CredentialField>,
) -> RequestDescriptor {
    let mut request = RequestDescriptor::new(method, url, headers, credentials);
    if let Some(body) = body {
        request = request.with_body(body);
    }
    match params {
        Some(params) => request.with_query(params),
        None => request,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    /// Echoes the descriptor back as the response.
    struct EchoTransport;

    impl Transport for EchoTransport {
        type Response = RequestDescriptor;
        type Error = Infallible;

        async fn get(&self, request: RequestDescriptor) -> Result<RequestDescriptor, Infallible> {
            Ok(request)
        }

        async fn post(&self, request: RequestDescriptor) -> Result<RequestDescriptor, Infallible> {
            Ok(request)
        }

        async fn put(&self, request: RequestDescriptor) -> Result<RequestDescriptor, Infallible> {
            Ok(request)
        }

        async fn patch(&self, request: RequestDescriptor) -> Result<RequestDescriptor, Infallible> {
            Ok(request)
        }

        async fn delete(&self, request: RequestDescriptor) -> Result<RequestDescriptor, Infallible> {
            Ok(request)
        }
    }

    fn bearer_defaults() -> CredentialContext {
        CredentialContext {
            tls: None,
            auth: Some(AuthMaterial::bearer("T1")),
        }
    }

    #[tokio::test]
    async fn test_default_auth_applied() {
        let client = SecureHttpClient::new(EchoTransport, &bearer_defaults());
        let request = client.http_get("host/x", None, None, None).await.unwrap();
        assert_eq!(request.url(), "http://host/x");
        assert_eq!(request.auth(), Some(&AuthMaterial::bearer("T1")));
        assert_eq!(request.to_json()["auth"], serde_json::json!({"bearer": "T1"}));
    }

    #[tokio::test]
    async fn test_override_discards_default() {
        let client = SecureHttpClient::new(EchoTransport, &bearer_defaults());
        let request = client
            .http_get("host/x", None, None, Some(AuthMaterial::basic("u", "p")))
            .await
            .unwrap();
        assert_eq!(
            request.to_json()["auth"],
            serde_json::json!({"user": "u", "pass": "p"})
        );
    }

    #[tokio::test]
    async fn test_secure_call_ignores_auth_default() {
        let client = SecureHttpClient::new(EchoTransport, &bearer_defaults());
        let request = client.https_get("host/x", None, None, None).await.unwrap();
        assert_eq!(request.url(), "https://host/x");
        assert!(request.credentials().is_none());
    }

    #[tokio::test]
    async fn test_secure_form_upload() {
        let client = SecureHttpClient::with_context(EchoTransport, None);
        let mut form = FormFields::new();
        form.insert("file".to_string(), crate::FormValue::file(vec![0u8, 1, 2]));

        let request = client
            .https_post_form_data(
                "host/upload",
                form.clone(),
                None,
                None,
                Some(TlsMaterial::new().ca("capem")),
            )
            .await
            .unwrap();

        assert_eq!(request.method(), HttpMethod::Post);
        assert_eq!(request.tls_context(), Some(&TlsMaterial::new().ca("capem")));
        assert_eq!(request.form_fields(), Some(&form));
        assert!(!request.is_json());
    }

    #[test]
    fn test_legacy_scheme_policy() {
        let client = SecureHttpClient::with_context(EchoTransport, None).with_scheme_policy(
            SchemePolicy {
                plain: crate::Scheme::Http,
                secure: crate::Scheme::Http,
            },
        );
        let request = client.compose_secure(HttpMethod::Get, "host/x", None, None, None, None);
        assert_eq!(request.url(), "http://host/x");
    }

    #[test]
    fn test_from_config() {
        let config = ClientConfig::from_toml_str(
            r#"
            [credentials.tls]
            ca = "capem"
            "#,
        )
        .unwrap();
        let client = SecureHttpClient::from_config(EchoTransport, &config);
        assert_eq!(client.default_tls(), Some(&TlsMaterial::new().ca("capem")));
        assert!(client.default_auth().is_none());
        assert_eq!(client.scheme_policy(), SchemePolicy::default());
    }
}
