//! The per-call request descriptor handed to a transport.
//!
//! A descriptor is built fresh for every verb call, is never mutated after
//! construction and is consumed by exactly one transport call.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::credentials::{AuthMaterial, TlsMaterial, present_fields};

/// Query parameters attached to a request.
pub type QueryParams = BTreeMap<String, QueryValue>;

/// One query parameter: a single value, or a list sent as repeated keys
/// (`a=1&a=2`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    /// `key=value`.
    One(String),
    /// `key=v1&key=v2`, in order.
    Many(Vec<String>),
}

impl QueryValue {
    /// The values in the order they are sent.
    pub fn values(&self) -> &[String] {
        match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        Self::Many(values)
    }
}

impl From<Vec<&str>> for QueryValue {
    fn from(values: Vec<&str>) -> Self {
        Self::Many(values.into_iter().map(str::to_string).collect())
    }
}

/// Multipart form fields attached to a request.
pub type FormFields = BTreeMap<String, FormValue>;

/// HTTP request methods used by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// HTTP GET method.
    Get,
    /// HTTP POST method.
    Post,
    /// HTTP PUT method.
    Put,
    /// HTTP PATCH method.
    Patch,
    /// HTTP DELETE method.
    Delete,
}

impl HttpMethod {
    /// Convert to reqwest method.
    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Patch => write!(f, "PATCH"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// URL scheme injected in front of the caller's target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// `http://`
    Http,
    /// `https://`
    Https,
}

impl Scheme {
    /// The URL prefix for this scheme.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Http => "http://",
            Self::Https => "https://",
        }
    }
}

/// Which scheme each call family uses.
///
/// Secure calls default to `https`. Setting `secure` to `http` reproduces the
/// behavior of older deployments that sent TLS material over a plain prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemePolicy {
    /// Scheme for `http_*` calls.
    pub plain: Scheme,
    /// Scheme for `https_*` calls.
    pub secure: Scheme,
}

impl Default for SchemePolicy {
    fn default() -> Self {
        Self {
            plain: Scheme::Http,
            secure: Scheme::Https,
        }
    }
}

impl SchemePolicy {
    /// Whether secure calls are pinned to a non-TLS scheme.
    pub fn is_legacy_secure(&self) -> bool {
        self.secure != Scheme::Https
    }
}

/// A single multipart form value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormValue {
    /// A text part.
    Text(String),
    /// A binary part, optionally named and typed.
    File {
        /// Part contents.
        bytes: Bytes,
        /// File name sent with the part.
        file_name: Option<String>,
        /// MIME type of the part.
        content_type: Option<String>,
    },
}

impl FormValue {
    /// A text part.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// A binary part without file name or content type.
    pub fn file(bytes: impl Into<Bytes>) -> Self {
        Self::File {
            bytes: bytes.into(),
            file_name: None,
            content_type: None,
        }
    }

    /// Attach a file name. No effect on text parts.
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        if let Self::File { file_name, .. } = &mut self {
            *file_name = Some(name.into());
        }
        self
    }

    /// Attach a MIME type. No effect on text parts.
    pub fn with_content_type(mut self, mime: impl Into<String>) -> Self {
        if let Self::File { content_type, .. } = &mut self {
            *content_type = Some(mime.into());
        }
        self
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::File {
                bytes,
                file_name,
                content_type,
            } => {
                let mut part = Map::new();
                part.insert("length".to_string(), json!(bytes.len()));
                if let Some(name) = file_name {
                    part.insert("fileName".to_string(), json!(name));
                }
                if let Some(mime) = content_type {
                    part.insert("contentType".to_string(), json!(mime));
                }
                Value::Object(part)
            }
        }
    }
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for FormValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Bytes> for FormValue {
    fn from(value: Bytes) -> Self {
        Self::file(value)
    }
}

impl From<Vec<u8>> for FormValue {
    fn from(value: Vec<u8>) -> Self {
        Self::file(value)
    }
}

/// The body of a request. JSON and form bodies are mutually exclusive.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
    /// A JSON payload; the request is sent in JSON mode.
    Json(Value),
    /// Multipart form fields.
    Form(FormFields),
}

/// The resolved credentials of a call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialField {
    /// Authentication material of a plain call.
    Auth(AuthMaterial),
    /// TLS material of a secure call.
    Tls(TlsMaterial),
}

/// An immutable description of one outbound request.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestDescriptor {
    method: HttpMethod,
    url: String,
    headers: Option<http::HeaderMap>,
    credentials: Option<CredentialField>,
    query: Option<QueryParams>,
    body: Option<RequestBody>,
}

impl RequestDescriptor {
    pub(crate) fn new(
        method: HttpMethod,
        url: String,
        headers: Option<http::HeaderMap>,
        credentials: Option<CredentialField>,
    ) -> Self {
        Self {
            method,
            url,
            headers,
            credentials,
            query: None,
            body: None,
        }
    }

    pub(crate) fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach query parameters; an empty set leaves the descriptor unchanged.
    pub(crate) fn with_query(mut self, params: QueryParams) -> Self {
        if !params.is_empty() {
            self.query = Some(params);
        }
        self
    }

    /// The HTTP method.
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// The target URL, scheme included.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Caller-supplied headers, verbatim.
    pub fn headers(&self) -> Option<&http::HeaderMap> {
        self.headers.as_ref()
    }

    /// The resolved credentials, if any.
    pub fn credentials(&self) -> Option<&CredentialField> {
        self.credentials.as_ref()
    }

    /// Authentication material of a plain call.
    pub fn auth(&self) -> Option<&AuthMaterial> {
        match &self.credentials {
            Some(CredentialField::Auth(auth)) => Some(auth),
            _ => None,
        }
    }

    /// TLS material of a secure call.
    pub fn tls_context(&self) -> Option<&TlsMaterial> {
        match &self.credentials {
            Some(CredentialField::Tls(tls)) => Some(tls),
            _ => None,
        }
    }

    /// Query parameters; never present when empty.
    pub fn query(&self) -> Option<&QueryParams> {
        self.query.as_ref()
    }

    /// The request body.
    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// The JSON payload, when the request is in JSON mode.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Some(RequestBody::Json(value)) => Some(value),
            _ => None,
        }
    }

    /// The form fields of a form request.
    pub fn form_fields(&self) -> Option<&FormFields> {
        match &self.body {
            Some(RequestBody::Form(fields)) => Some(fields),
            _ => None,
        }
    }

    /// Whether the request is in JSON mode.
    pub fn is_json(&self) -> bool {
        matches!(self.body, Some(RequestBody::Json(_)))
    }

    /// Render the descriptor shape, omitting every absent field.
    ///
    /// File parts are summarized by length rather than contents.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("method".to_string(), json!(self.method.to_string()));
        out.insert("url".to_string(), json!(self.url));

        if let Some(headers) = &self.headers {
            let rendered: Map<String, Value> = headers
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_string(),
                        json!(String::from_utf8_lossy(value.as_bytes())),
                    )
                })
                .collect();
            out.insert("headers".to_string(), Value::Object(rendered));
        }

        match &self.credentials {
            Some(CredentialField::Auth(auth)) => {
                out.insert("auth".to_string(), Value::Object(present_fields(auth)));
            }
            Some(CredentialField::Tls(tls)) => {
                out.insert("tlsContext".to_string(), Value::Object(present_fields(tls)));
            }
            None => {}
        }

        if let Some(query) = &self.query {
            out.insert("qs".to_string(), json!(query));
        }

        match &self.body {
            Some(RequestBody::Json(body)) => {
                out.insert("json".to_string(), Value::Bool(true));
                out.insert("body".to_string(), body.clone());
            }
            Some(RequestBody::Form(fields)) => {
                let rendered: Map<String, Value> = fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect();
                out.insert("formFields".to_string(), Value::Object(rendered));
            }
            None => {}
        }

        Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> RequestDescriptor {
        RequestDescriptor::new(HttpMethod::Get, "http://host/x".to_string(), None, None)
    }

    #[test]
    fn test_empty_query_not_attached() {
        let descriptor = base().with_query(QueryParams::new());
        assert!(descriptor.query().is_none());
        assert!(descriptor.to_json().get("qs").is_none());
    }

    #[test]
    fn test_query_attached_verbatim() {
        let mut params = QueryParams::new();
        params.insert("a".to_string(), "1".into());
        let descriptor = base().with_query(params.clone());
        assert_eq!(descriptor.query(), Some(&params));
        assert_eq!(descriptor.to_json()["qs"], json!({"a": "1"}));
    }

    #[test]
    fn test_repeated_query_values() {
        let mut params = QueryParams::new();
        params.insert("a".to_string(), vec!["1", "2"].into());
        params.insert("b".to_string(), "x".into());
        let descriptor = base().with_query(params);

        let query = descriptor.query().unwrap();
        assert_eq!(query["a"].values(), ["1", "2"]);
        assert_eq!(query["b"].values(), ["x"]);
        assert_eq!(descriptor.to_json()["qs"], json!({"a": ["1", "2"], "b": "x"}));
    }

    #[test]
    fn test_json_mode() {
        let descriptor = base().with_body(RequestBody::Json(json!({"k": 1})));
        assert!(descriptor.is_json());
        let shape = descriptor.to_json();
        assert_eq!(shape["json"], true);
        assert_eq!(shape["body"], json!({"k": 1}));
        assert!(shape.get("formFields").is_none());
    }

    #[test]
    fn test_form_mode() {
        let mut fields = FormFields::new();
        fields.insert("name".to_string(), FormValue::text("n"));
        fields.insert(
            "file".to_string(),
            FormValue::file(vec![1u8, 2, 3]).with_file_name("a.bin"),
        );
        let descriptor = base().with_body(RequestBody::Form(fields));
        assert!(!descriptor.is_json());

        let shape = descriptor.to_json();
        assert!(shape.get("json").is_none());
        assert_eq!(shape["formFields"]["name"], "n");
        assert_eq!(shape["formFields"]["file"], json!({"length": 3, "fileName": "a.bin"}));
    }

    #[test]
    fn test_credentials_rendered_under_kind_key() {
        let plain = RequestDescriptor::new(
            HttpMethod::Get,
            "http://host".to_string(),
            None,
            Some(CredentialField::Auth(AuthMaterial::bearer("T1"))),
        );
        assert_eq!(plain.to_json()["auth"], json!({"bearer": "T1"}));
        assert!(plain.tls_context().is_none());

        let secure = RequestDescriptor::new(
            HttpMethod::Get,
            "https://host".to_string(),
            None,
            Some(CredentialField::Tls(TlsMaterial::new().ca("capem"))),
        );
        assert_eq!(secure.to_json()["tlsContext"], json!({"ca": "capem"}));
        assert!(secure.auth().is_none());
    }

    #[test]
    fn test_absent_credentials_not_rendered() {
        let shape = base().to_json();
        assert!(shape.get("auth").is_none());
        assert!(shape.get("tlsContext").is_none());
        assert!(shape.get("headers").is_none());
    }

    #[test]
    fn test_form_value_builders_ignore_text() {
        let value = FormValue::text("t").with_file_name("x").with_content_type("text/plain");
        assert_eq!(value, FormValue::Text("t".to_string()));
    }

    #[test]
    fn test_scheme_policy_default() {
        let policy = SchemePolicy::default();
        assert_eq!(policy.plain.prefix(), "http://");
        assert_eq!(policy.secure.prefix(), "https://");
        assert!(!policy.is_legacy_secure());
    }
}
