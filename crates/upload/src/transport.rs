//! Lazily built, reusable HTTP(S) connection with mutual TLS.

use std::sync::{Arc, Mutex, PoisonError};

use reqwest::Url;
use reqwest::redirect::Policy;
use tracing::{debug, warn};

use crate::config::{TransportConfig, TrustPolicy};
use crate::error::UploadError;

/// Maximum number of redirects followed for a single request.
pub const MAX_REDIRECTS: usize = 10;

/// A live HTTP client bound to the configured endpoint.
///
/// Keeps its own connection pool; cloning the inner client is cheap.
#[derive(Debug)]
pub struct Connection {
    http: reqwest::Client,
    base_url: Url,
}

impl Connection {
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

/// Builds the [`Connection`] on first use and hands out the same one afterwards.
pub struct Transport {
    config: TransportConfig,
    connection: Mutex<Option<Arc<Connection>>>,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Whether a connection has already been built.
    pub fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Returns the cached connection, building it under the lock if needed.
    ///
    /// Fails with [`UploadError::Setup`] without touching the network when
    /// the identity, roots or URL are unusable. A failed build is not
    /// cached; the next call tries again.
    pub fn acquire(&self) -> Result<Arc<Connection>, UploadError> {
        let mut slot = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(conn) = slot.as_ref() {
            return Ok(Arc::clone(conn));
        }

        let conn = Arc::new(build_connection(&self.config)?);
        debug!(endpoint = %conn.base_url, "transport connection created");
        *slot = Some(Arc::clone(&conn));
        Ok(conn)
    }
}

fn build_connection(config: &TransportConfig) -> Result<Connection, UploadError> {
    let base_url = parse_base_url(&config.base_url)?;

    let identity = reqwest::Identity::from_pem(&config.identity.to_pem_bundle())
        .map_err(|e| UploadError::Setup(format!("invalid client identity: {e}")))?;

    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .identity(identity)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .connect_timeout(config.connect_timeout)
        .user_agent(config.user_agent.as_str());

    match config.trust_policy {
        TrustPolicy::Strict => {
            for pem in &config.trusted_roots {
                let root = reqwest::Certificate::from_pem(pem.as_bytes())
                    .map_err(|e| UploadError::Setup(format!("invalid trusted root: {e}")))?;
                builder = builder.add_root_certificate(root);
            }
        }
        TrustPolicy::AcceptAny => {
            warn!(
                endpoint = %base_url,
                "server certificate validation disabled (accept-any trust policy)"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }
    }

    let http = builder
        .build()
        .map_err(|e| UploadError::Setup(format!("unable to create TLS client: {e}")))?;

    Ok(Connection { http, base_url })
}

fn parse_base_url(raw: &str) -> Result<Url, UploadError> {
    let url = Url::parse(raw)
        .map_err(|e| UploadError::Setup(format!("invalid endpoint URL {raw:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(UploadError::Setup(format!(
            "unsupported endpoint scheme: {other}"
        ))),
    }
}
