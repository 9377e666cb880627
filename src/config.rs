//! Static configuration read from a JSON file.
//!
//! ```json
//! {
//!   "serviceUrl": "https://appapi2.test.bankid.com/rp/v5",
//!   "pollDelay": 2000,
//!   "certStore": {
//!     "certStorePath": "certs",
//!     "caCertFileName": "ca.pem",
//!     "userCertFileName": "client.pem",
//!     "userPrivateKeyFileName": "client.key"
//!   }
//! }
//! ```
//!
//! Instead of `userCertFileName`/`userPrivateKeyFileName` the client identity
//! can come from a PKCS#12 bundle: `userP12FileName` plus
//! `userPrivateKeyPassword`.
//!
//! Relative paths are resolved against `certStorePath`, which is itself
//! resolved against the directory holding the configuration file.

use crate::application::engine::{EngineSettings, MIN_POLL_INTERVAL, PollInterval, ShutdownPolicy};
use crate::error::{EngineError, Result};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE_NAME: &str = "config.json";
const DEFAULT_CONTENT_TYPE: &str = "application/json";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL; operation names are appended to it.
    pub service_url: String,
    /// Milliseconds between two `collect` calls of one order.
    #[serde(default = "default_poll_delay")]
    pub poll_delay: u64,
    pub cert_store: CertStore,
    #[serde(default)]
    pub http_client_config: HttpClientConfig,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// Send at most one request at a time across all orders.
    #[serde(default)]
    pub serialize_requests: bool,
    /// When set, `shutdown` waits this long for running orders.
    #[serde(default)]
    pub shutdown_grace_ms: Option<u64>,
    /// A `tracing` filter directive such as `info` or `bankid=debug`.
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertStore {
    #[serde(default)]
    pub cert_store_path: PathBuf,
    /// PEM bundle of the CA the service certificate chains to.
    #[serde(default)]
    pub ca_cert_file_name: String,
    /// PEM client certificate (chain).
    #[serde(default)]
    pub user_cert_file_name: String,
    /// PEM private key matching the client certificate.
    #[serde(default)]
    pub user_private_key_file_name: String,
    /// PKCS#12 bundle holding certificate and key. Takes precedence over the
    /// PEM pair when set.
    #[serde(default, rename = "userP12FileName")]
    pub user_p12_file_name: String,
    /// Password of the PKCS#12 bundle.
    #[serde(default, deserialize_with = "optional_secret")]
    pub user_private_key_password: Option<SecretString>,
}

fn optional_secret<'de, D>(deserializer: D) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(|value| value.map(SecretString::from))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpClientConfig {
    #[serde(default)]
    pub request_header: RequestHeader,
}

#[derive(Debug, Deserialize)]
pub struct RequestHeader {
    #[serde(rename = "Host", default)]
    pub host: Option<String>,
    #[serde(rename = "Content-type", default = "default_content_type")]
    pub content_type: String,
}

impl Default for RequestHeader {
    fn default() -> Self {
        Self {
            host: None,
            content_type: default_content_type(),
        }
    }
}

fn default_poll_delay() -> u64 {
    MIN_POLL_INTERVAL.as_millis() as u64
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

impl Config {
    /// Reads and validates the configuration file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EngineError::ConfigError(format!("could not read file {}: {e}", path.display()))
        })?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::from_json(&raw, base_dir).map_err(|e| match e {
            EngineError::ConfigError(msg) => {
                EngineError::ConfigError(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Parses a configuration whose relative paths are anchored at `base_dir`.
    pub fn from_json(raw: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut config: Self = serde_json::from_str(raw)
            .map_err(|e| EngineError::ConfigError(format!("could not parse configuration: {e}")))?;
        config.base_dir = base_dir.into();
        config.validate()?;
        Ok(config)
    }

    /// `config.json` next to the running executable.
    pub fn default_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_CONFIG_FILE_NAME)))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE_NAME))
    }

    fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.service_url).map_err(|e| {
            EngineError::ConfigError(format!("invalid serviceUrl {:?}: {e}", self.service_url))
        })?;
        if self.cert_store.ca_cert_file_name.is_empty() {
            return Err(EngineError::ConfigError("caCertFileName cannot be empty".into()));
        }
        if self.cert_store.user_p12_file_name.is_empty() {
            if self.cert_store.user_cert_file_name.is_empty() {
                return Err(EngineError::ConfigError(
                    "userCertFileName cannot be empty unless userP12FileName is set".into(),
                ));
            }
            if self.cert_store.user_private_key_file_name.is_empty() {
                return Err(EngineError::ConfigError(
                    "userPrivateKeyFileName cannot be empty unless userP12FileName is set".into(),
                ));
            }
        }
        if self.request_timeout_ms == 0 {
            return Err(EngineError::ConfigError("requestTimeoutMs must be positive".into()));
        }
        Ok(())
    }

    pub fn ca_cert_path(&self) -> PathBuf {
        self.cert_path(&self.cert_store.ca_cert_file_name)
    }

    pub fn user_cert_path(&self) -> PathBuf {
        self.cert_path(&self.cert_store.user_cert_file_name)
    }

    pub fn user_private_key_path(&self) -> PathBuf {
        self.cert_path(&self.cert_store.user_private_key_file_name)
    }

    /// The PKCS#12 bundle, if the client identity comes from one.
    pub fn user_p12_path(&self) -> Option<PathBuf> {
        (!self.cert_store.user_p12_file_name.is_empty())
            .then(|| self.cert_path(&self.cert_store.user_p12_file_name))
    }

    pub fn log_file_path(&self) -> Option<PathBuf> {
        self.log_file
            .as_ref()
            .map(|file| fix_path(&self.base_dir, Path::new(""), file))
    }

    fn cert_path(&self, file: &str) -> PathBuf {
        fix_path(&self.base_dir, &self.cert_store.cert_store_path, Path::new(file))
    }

    /// The configured poll delay, raised to the floor if needed.
    pub fn poll_interval(&self) -> PollInterval {
        let interval = PollInterval::from_millis(self.poll_delay);
        if interval.get() > Duration::from_millis(self.poll_delay) {
            tracing::warn!(
                configured_ms = self.poll_delay,
                used_ms = interval.get().as_millis() as u64,
                "pollDelay below minimum, using the minimum"
            );
        }
        interval
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            poll_interval: self.poll_interval(),
            shutdown: match self.shutdown_grace_ms {
                Some(ms) => ShutdownPolicy::Drain(Duration::from_millis(ms)),
                None => ShutdownPolicy::Detach,
            },
        }
    }
}

/// Absolute `file` wins, then absolute `dir`, else both under `root`.
fn fix_path(root: &Path, dir: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() {
        return file.to_path_buf();
    }
    if dir.is_absolute() {
        return dir.join(file);
    }
    root.join(dir).join(file)
}
