use crate::config::Config;
use crate::domain::ports::{Operation, Transport, TransportResponse};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::{CONTENT_TYPE, HOST, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use std::path::Path;
use tokio::sync::Mutex;

const JSON: &str = "application/json";

/// Mutual-TLS transport to the remote service.
///
/// The client identity is a PEM certificate and key, or a PKCS#12 bundle
/// converted to PEM on load.
///
/// `reqwest::Client` pools connections and is safe to share, so by default
/// requests from different orders run in parallel. With `serialized(true)` a
/// mutex admits one request at a time.
pub struct HttpsTransport {
    client: reqwest::Client,
    base_url: String,
    content_type: String,
    serialize: Option<Mutex<()>>,
}

fn read_pem(path: &Path, what: &str) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        EngineError::ConfigError(format!("could not read {what} {}: {e}", path.display()))
    })
}

fn header_value(value: &str, name: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| EngineError::ConfigError(format!("invalid {name} header {value:?}: {e}")))
}

fn pem_block(label: &str, der: &[u8]) -> String {
    let encoded = BASE64.encode(der);
    let mut block = format!("-----BEGIN {label}-----\n");
    for line in encoded.as_bytes().chunks(64) {
        block.push_str(&String::from_utf8_lossy(line));
        block.push('\n');
    }
    block.push_str(&format!("-----END {label}-----\n"));
    block
}

/// Unpacks a PKCS#12 bundle into PEM: certificates first, then the PKCS#8 key.
pub fn pkcs12_to_pem(bundle: &[u8], password: &str) -> Result<Vec<u8>> {
    let pfx = p12::PFX::parse(bundle)
        .map_err(|e| EngineError::ConfigError(format!("invalid P12 bundle: {e:?}")))?;
    if !pfx.verify_mac(password) {
        return Err(EngineError::ConfigError(
            "could not open P12 bundle: wrong password".into(),
        ));
    }
    let certs = pfx
        .cert_x509_bags(password)
        .map_err(|e| EngineError::ConfigError(format!("could not read P12 certificates: {e:?}")))?;
    let keys = pfx
        .key_bags(password)
        .map_err(|e| EngineError::ConfigError(format!("could not read P12 key: {e:?}")))?;
    let Some(key) = keys.first() else {
        return Err(EngineError::ConfigError("P12 bundle holds no private key".into()));
    };
    if certs.is_empty() {
        return Err(EngineError::ConfigError("P12 bundle holds no certificate".into()));
    }

    let mut pem = String::new();
    for cert in &certs {
        pem.push_str(&pem_block("CERTIFICATE", cert));
    }
    pem.push_str(&pem_block("PRIVATE KEY", key));
    Ok(pem.into_bytes())
}

impl HttpsTransport {
    /// Builds the client from the certificate material named in `config`.
    ///
    /// The client authenticates with the PEM certificate and key; the server
    /// is only trusted if it chains to the configured CA.
    pub fn from_config(config: &Config) -> Result<Self> {
        let ca = read_pem(&config.ca_cert_path(), "CA certificate")?;
        let identity_pem = match config.user_p12_path() {
            Some(path) => {
                let bundle = read_pem(&path, "client P12 bundle")?;
                let password = config
                    .cert_store
                    .user_private_key_password
                    .as_ref()
                    .map(|p| p.expose_secret())
                    .unwrap_or_default();
                pkcs12_to_pem(&bundle, password)?
            }
            None => {
                let mut pem = read_pem(&config.user_cert_path(), "client certificate")?;
                pem.push(b'\n');
                pem.extend(read_pem(&config.user_private_key_path(), "client key")?);
                pem
            }
        };

        let identity = reqwest::Identity::from_pem(&identity_pem)?;
        let ca = reqwest::Certificate::from_pem(&ca)?;

        let request_header = &config.http_client_config.request_header;
        let mut headers = HeaderMap::new();
        if let Some(host) = request_header.host.as_deref() {
            headers.insert(HOST, header_value(host, "Host")?);
        }

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .tls_built_in_root_certs(false)
            .add_root_certificate(ca)
            .identity(identity)
            .default_headers(headers)
            .timeout(config.request_timeout())
            .user_agent(format!("bankid/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        tracing::debug!(service_url = %config.service_url, "HTTPS transport ready");
        Ok(Self::with_client(client, &config.service_url)
            .content_type(&request_header.content_type)
            .serialized(config.serialize_requests))
    }

    /// Wraps an already configured client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            content_type: JSON.to_string(),
            serialize: None,
        }
    }

    pub fn content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }

    pub fn serialized(mut self, serialize: bool) -> Self {
        self.serialize = serialize.then(|| Mutex::new(()));
        self
    }

    fn url(&self, operation: Operation) -> String {
        format!("{}/{}", self.base_url, operation.path())
    }
}

#[async_trait]
impl Transport for HttpsTransport {
    async fn send(&self, operation: Operation, body: Vec<u8>) -> Result<TransportResponse> {
        let _guard = match &self.serialize {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };
        let url = self.url(operation);
        tracing::trace!(%operation, %url, "sending request");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, &self.content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| EngineError::TransportError(format!("request to {url} failed: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| EngineError::TransportError(format!("reading response from {url} failed: {e}")))?;

        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }
}
