//! CLI configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/boxdrop/config.toml`
//! - Windows: `%APPDATA%/boxdrop/config.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use boxdrop_upload::{ClientIdentity, TransportConfig, TrustPolicy};
use serde::{Deserialize, Serialize};

/// Uploader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Upload endpoint URL.
    pub endpoint: String,

    /// PEM file holding the client private key.
    pub client_key: PathBuf,

    /// PEM file holding the client certificate chain.
    pub client_cert: PathBuf,

    /// Skip server certificate validation. Insecure.
    #[serde(default)]
    pub accept_any_certificate: bool,

    /// Extra PEM bundle of trusted root certificates.
    #[serde(default)]
    pub trusted_roots: Option<PathBuf>,

    /// TCP/TLS connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Directory for staging encrypted payloads (system temp dir if unset).
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

fn default_connect_timeout() -> u64 {
    30
}

impl Config {
    /// Loads configuration from `path`, or from the platform default location.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read configuration {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid configuration {}", path.display()))?;

        tracing::debug!(
            path = %path.display(),
            endpoint = %config.endpoint,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Reads the referenced PEM files and builds the transport settings.
    pub fn transport(&self) -> anyhow::Result<TransportConfig> {
        let key = read_pem(&self.client_key)?;
        let cert = read_pem(&self.client_cert)?;

        let identity = ClientIdentity::from_pem(key, cert);
        let mut transport = TransportConfig::new(&self.endpoint, identity)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs));
        if self.accept_any_certificate {
            transport = transport.with_trust_policy(TrustPolicy::AcceptAny);
        }
        if let Some(roots) = &self.trusted_roots {
            transport = transport.with_trusted_root(read_pem(roots)?);
        }
        Ok(transport)
    }
}

fn read_pem(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("cannot read PEM file {}", path.display()))
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("boxdrop")
            .join("config.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("boxdrop").join("config.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/boxdrop/config.toml"))
    }
}
