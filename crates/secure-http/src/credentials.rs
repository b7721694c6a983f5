//! Credential material and the process-wide credential context.
//!
//! A client holds two independent default slots, one for TLS material used by
//! the secure (`https_*`) calls and one for authentication material used by
//! the plain (`http_*`) calls. Both are read once, when the client is built,
//! from a [`CredentialAuthority`].
//!
//! A per-call override always replaces the corresponding default wholesale:
//!
//! ```ignore
//! use secure_http::credentials::{AuthMaterial, resolve_override};
//!
//! let default = Some(AuthMaterial::bearer("T1"));
//! let resolved = resolve_override(Some(AuthMaterial::basic("u", "p")), default.as_ref());
//! assert_eq!(resolved, Some(AuthMaterial::basic("u", "p")));
//! ```

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Certificate and key material for mutually authenticated HTTPS.
///
/// Every field is optional; absent fields are omitted from the request,
/// never replaced by an empty string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TlsMaterial {
    /// Path to the PEM client certificate (chain).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<String>,
    /// Path to the PEM private key matching `cert_file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<String>,
    /// PEM-encoded CA bundle trusted for the server certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,
    /// Passphrase protecting the private key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
    /// Cipher / security option policy string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_options: Option<String>,
    /// Protocol method name, e.g. `TLSv1_2_method`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_protocol: Option<String>,
}

impl TlsMaterial {
    /// Create empty TLS material.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client certificate and key files.
    pub fn client_cert(mut self, cert_file: impl Into<String>, key_file: impl Into<String>) -> Self {
        self.cert_file = Some(cert_file.into());
        self.key_file = Some(key_file.into());
        self
    }

    /// Set the trusted CA bundle (PEM text).
    pub fn ca(mut self, ca: impl Into<String>) -> Self {
        self.ca = Some(ca.into());
        self
    }

    /// Set the private key passphrase.
    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Set the security options policy.
    pub fn security_options(mut self, options: impl Into<String>) -> Self {
        self.security_options = Some(options.into());
        self
    }

    /// Set the protocol method name.
    pub fn secure_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.secure_protocol = Some(protocol.into());
        self
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.cert_file.is_none()
            && self.key_file.is_none()
            && self.ca.is_none()
            && self.passphrase.is_none()
            && self.security_options.is_none()
            && self.secure_protocol.is_none()
    }
}

/// Authentication material for plain HTTP calls.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AuthMaterial {
    /// Basic auth user name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Basic auth password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass: Option<String>,
    /// Bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer: Option<String>,
    /// Send credentials with the first request instead of waiting for a challenge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_immediately: Option<bool>,
}

impl AuthMaterial {
    /// Create empty authentication material.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bearer token authentication.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer: Some(token.into()),
            ..Self::default()
        }
    }

    /// Basic authentication.
    pub fn basic(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            pass: Some(pass.into()),
            ..Self::default()
        }
    }

    /// Set the `send_immediately` flag.
    pub fn send_immediately(mut self, send: bool) -> Self {
        self.send_immediately = Some(send);
        self
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.user.is_none()
            && self.pass.is_none()
            && self.bearer.is_none()
            && self.send_immediately.is_none()
    }
}

/// Process-wide credential defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialContext {
    /// Default TLS material for secure calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsMaterial>,
    /// Default authentication material for plain calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthMaterial>,
}

impl CredentialContext {
    /// Parse a credential context from TOML text.
    ///
    /// ```toml
    /// [tls]
    /// certFile = "/etc/svc/client.crt"
    /// keyFile = "/etc/svc/client.key"
    ///
    /// [auth]
    /// bearer = "token"
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a credential context from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

/// The two immutable default slots a client extracts from a context.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CredentialSlots {
    tls: Option<TlsMaterial>,
    auth: Option<AuthMaterial>,
}

impl CredentialSlots {
    /// Extract the slots; each is absent when the context or its sub-field is.
    pub fn from_context(context: Option<CredentialContext>) -> Self {
        match context {
            Some(context) => Self {
                tls: context.tls,
                auth: context.auth,
            },
            None => Self::default(),
        }
    }

    /// Default TLS material.
    pub fn tls(&self) -> Option<&TlsMaterial> {
        self.tls.as_ref()
    }

    /// Default authentication material.
    pub fn auth(&self) -> Option<&AuthMaterial> {
        self.auth.as_ref()
    }
}

/// Resolve the credential slot for one call.
///
/// A supplied override is used as given and the default is ignored, even when
/// the override leaves fields unset. Without an override the default is used,
/// which may itself be absent.
pub fn resolve_override<M: Clone>(overriding: Option<M>, default: Option<&M>) -> Option<M> {
    match overriding {
        Some(material) => Some(material),
        None => default.cloned(),
    }
}

/// The populated fields of a credential object, keyed by wire name.
///
/// Absent fields are stripped rather than rendered as `null` or `""`.
pub fn present_fields<M: Serialize>(material: &M) -> serde_json::Map<String, serde_json::Value> {
    match serde_json::to_value(material) {
        Ok(serde_json::Value::Object(map)) => map
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .collect(),
        _ => serde_json::Map::new(),
    }
}

/// Source of the process-wide credential context.
///
/// Consulted once, when a client is constructed. Later changes are not
/// observed by clients that already exist.
pub trait CredentialAuthority {
    /// The current credential context, if any.
    fn credential_context(&self) -> Option<CredentialContext>;
}

impl CredentialAuthority for CredentialContext {
    fn credential_context(&self) -> Option<CredentialContext> {
        Some(self.clone())
    }
}

impl CredentialAuthority for Option<CredentialContext> {
    fn credential_context(&self) -> Option<CredentialContext> {
        self.clone()
    }
}

impl<A: CredentialAuthority + ?Sized> CredentialAuthority for &A {
    fn credential_context(&self) -> Option<CredentialContext> {
        (**self).credential_context()
    }
}

/// A credential context that can be installed at most once.
///
/// Owned by whoever wires the application together and handed to client
/// constructors explicitly.
#[derive(Debug, Default)]
pub struct OnceCredentialAuthority {
    context: OnceLock<CredentialContext>,
}

impl OnceCredentialAuthority {
    /// Create an authority with no context installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the context. Fails if one was already installed.
    pub fn set(&self, context: CredentialContext) -> Result<(), ConfigError> {
        self.context
            .set(context)
            .map_err(|_| ConfigError::AlreadyInitialized)?;
        tracing::debug!(target: "secure_http::credentials", "credential context installed");
        Ok(())
    }

    /// Whether a context has been installed.
    pub fn is_set(&self) -> bool {
        self.context.get().is_some()
    }
}

impl CredentialAuthority for OnceCredentialAuthority {
    fn credential_context(&self) -> Option<CredentialContext> {
        self.context.get().cloned()
    }
}

/// Reads the credential context from a TOML file each time it is asked.
///
/// A missing or malformed file yields no context; the failure is logged.
/// Use [`FileCredentialAuthority::load`] to observe the error instead.
#[derive(Clone, Debug)]
pub struct FileCredentialAuthority {
    path: PathBuf,
}

impl FileCredentialAuthority {
    /// Create an authority backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the context, surfacing read and parse errors.
    pub fn load(&self) -> Result<CredentialContext, ConfigError> {
        CredentialContext::from_file(&self.path)
    }
}

impl CredentialAuthority for FileCredentialAuthority {
    fn credential_context(&self) -> Option<CredentialContext> {
        match self.load() {
            Ok(context) => Some(context),
            Err(e) => {
                tracing::warn!(
                    target: "secure_http::credentials",
                    "No credential context from '{}': {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_absent_without_context() {
        let slots = CredentialSlots::from_context(None);
        assert!(slots.tls().is_none());
        assert!(slots.auth().is_none());
    }

    #[test]
    fn test_slots_are_independent() {
        let slots = CredentialSlots::from_context(Some(CredentialContext {
            tls: None,
            auth: Some(AuthMaterial::bearer("T1")),
        }));
        assert!(slots.tls().is_none());
        assert_eq!(slots.auth(), Some(&AuthMaterial::bearer("T1")));
    }

    #[test]
    fn test_override_replaces_default_wholesale() {
        let default = AuthMaterial::bearer("T1");
        let resolved = resolve_override(Some(AuthMaterial::basic("u", "p")), Some(&default));
        let resolved = resolved.unwrap();
        assert_eq!(resolved.bearer, None);
        assert_eq!(resolved.user.as_deref(), Some("u"));
    }

    #[test]
    fn test_empty_override_still_replaces_default() {
        let default = TlsMaterial::new().ca("capem");
        let resolved = resolve_override(Some(TlsMaterial::new()), Some(&default));
        assert_eq!(resolved, Some(TlsMaterial::new()));
    }

    #[test]
    fn test_no_override_uses_default() {
        let default = TlsMaterial::new().ca("capem");
        assert_eq!(resolve_override(None, Some(&default)), Some(default));
        assert_eq!(resolve_override::<TlsMaterial>(None, None), None);
    }

    #[test]
    fn test_present_fields_strips_absent() {
        let tls = TlsMaterial::new().ca("capem").secure_protocol("TLSv1_2_method");
        let fields = present_fields(&tls);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["ca"], "capem");
        assert_eq!(fields["secureProtocol"], "TLSv1_2_method");
        assert!(!fields.contains_key("certFile"));

        let auth = AuthMaterial::bearer("T1").send_immediately(false);
        let fields = present_fields(&auth);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["sendImmediately"], false);

        assert!(present_fields(&AuthMaterial::new()).is_empty());
    }

    #[test]
    fn test_context_from_toml() {
        let context = CredentialContext::from_toml_str(
            r#"
            [tls]
            certFile = "/etc/svc/client.crt"
            keyFile = "/etc/svc/client.key"

            [auth]
            bearer = "abc"
            sendImmediately = true
            "#,
        )
        .unwrap();

        let tls = context.tls.unwrap();
        assert_eq!(tls.cert_file.as_deref(), Some("/etc/svc/client.crt"));
        assert_eq!(tls.ca, None);
        let auth = context.auth.unwrap();
        assert_eq!(auth.bearer.as_deref(), Some("abc"));
        assert_eq!(auth.send_immediately, Some(true));
    }

    #[test]
    fn test_context_rejects_unknown_fields() {
        let result = CredentialContext::from_toml_str("[auth]\ntoken = \"x\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_once_authority_set_once() {
        let authority = OnceCredentialAuthority::new();
        assert!(authority.credential_context().is_none());

        authority
            .set(CredentialContext {
                tls: None,
                auth: Some(AuthMaterial::bearer("first")),
            })
            .unwrap();
        assert!(authority.is_set());

        let second = authority.set(CredentialContext::default());
        assert!(matches!(second, Err(ConfigError::AlreadyInitialized)));

        let context = authority.credential_context().unwrap();
        assert_eq!(context.auth, Some(AuthMaterial::bearer("first")));
    }

    #[test]
    fn test_file_authority_missing_file() {
        let authority = FileCredentialAuthority::new("/nonexistent/credentials.toml");
        assert!(authority.credential_context().is_none());
        assert!(matches!(authority.load(), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_file_authority_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        std::fs::write(
            &path,
            r#"
            [tls]
            certFile = "/etc/svc/client.crt"
            keyFile = "/etc/svc/client.key"
            passphrase = "secret"

            [auth]
            bearer = "T1"
            "#,
        )
        .unwrap();

        let authority = FileCredentialAuthority::new(&path);
        assert_eq!(authority.path(), path.as_path());

        let context = authority.credential_context().unwrap();
        let tls = context.tls.unwrap();
        assert_eq!(tls.cert_file.as_deref(), Some("/etc/svc/client.crt"));
        assert_eq!(tls.passphrase.as_deref(), Some("secret"));
        assert!(tls.ca.is_none());
        assert_eq!(context.auth, Some(AuthMaterial::bearer("T1")));
    }

    #[test]
    fn test_file_authority_sees_rewritten_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        std::fs::write(&path, "[auth]\nbearer = \"old\"\n").unwrap();
        let authority = FileCredentialAuthority::new(&path);
        assert_eq!(authority.load().unwrap().auth, Some(AuthMaterial::bearer("old")));

        std::fs::write(&path, "[auth]\nbearer = \"new\"\n").unwrap();
        assert_eq!(authority.load().unwrap().auth, Some(AuthMaterial::bearer("new")));
    }

    #[test]
    fn test_file_authority_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        std::fs::write(&path, "[auth\nbearer = ").unwrap();

        let authority = FileCredentialAuthority::new(&path);
        assert!(authority.credential_context().is_none());
        assert!(matches!(authority.load(), Err(ConfigError::Parse(_))));

        std::fs::write(&path, "[auth]\ntoken = \"T1\"\n").unwrap();
        assert!(matches!(authority.load(), Err(ConfigError::Parse(_))));
    }
}
