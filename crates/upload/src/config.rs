//! Transport configuration: endpoint, client identity and trust policy.

use std::fmt;
use std::time::Duration;

/// Default timeout for establishing the TCP/TLS connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("boxdrop/", env!("CARGO_PKG_VERSION"));

/// How the server certificate is checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Validate the server chain against the bundled web PKI roots and any
    /// configured extra roots.
    #[default]
    Strict,
    /// Skip server certificate validation entirely. Insecure; only for
    /// servers with self-signed certificates the user chose to trust.
    AcceptAny,
}

/// Client private key and certificate chain presented during the TLS handshake.
#[derive(Clone)]
pub struct ClientIdentity {
    key_pem: String,
    cert_pem: String,
}

impl ClientIdentity {
    /// Both arguments are PEM text. The key may be PKCS#8, PKCS#1 or SEC1;
    /// `cert_pem` may hold a full chain, leaf first.
    pub fn from_pem(key_pem: impl Into<String>, cert_pem: impl Into<String>) -> Self {
        Self {
            key_pem: key_pem.into(),
            cert_pem: cert_pem.into(),
        }
    }

    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    /// Key and certificates concatenated, the form the TLS stack consumes.
    pub(crate) fn to_pem_bundle(&self) -> Vec<u8> {
        let mut bundle = Vec::with_capacity(self.key_pem.len() + self.cert_pem.len() + 1);
        bundle.extend_from_slice(self.key_pem.as_bytes());
        if !self.key_pem.ends_with('\n') {
            bundle.push(b'\n');
        }
        bundle.extend_from_slice(self.cert_pem.as_bytes());
        bundle
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("key_pem", &"<redacted>")
            .field("cert_pem_len", &self.cert_pem.len())
            .finish()
    }
}

/// Immutable settings for an [`UploadClient`](crate::UploadClient)'s transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upload endpoint, `http://` or `https://`.
    pub base_url: String,
    pub identity: ClientIdentity,
    pub trust_policy: TrustPolicy,
    /// Extra PEM root certificates accepted under [`TrustPolicy::Strict`].
    pub trusted_roots: Vec<String>,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl TransportConfig {
    /// Creates a config with strict trust and default timeouts.
    pub fn new(base_url: impl Into<String>, identity: ClientIdentity) -> Self {
        Self {
            base_url: base_url.into(),
            identity,
            trust_policy: TrustPolicy::default(),
            trusted_roots: Vec::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_trust_policy(mut self, policy: TrustPolicy) -> Self {
        self.trust_policy = policy;
        self
    }

    pub fn with_trusted_root(mut self, pem: impl Into<String>) -> Self {
        self.trusted_roots.push(pem.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
