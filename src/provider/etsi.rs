use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::{Certificate, Identity};
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::error::{error_codes, CryptoError, CryptoResult};

use super::{KeyProvenance, OriginatedKey, QkdProvider, RetrievedKey};

/// Provenance source tag for keys served by a QuKayDee KME
pub const ETSI_PROVENANCE_SOURCE: &str = "qukaydee";

/// Protocol standard implemented by [`EtsiKmeClient`]
pub const ETSI_STANDARD: &str = "ETSI-GS-QKD-014";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Connection parameters for a Key Management Entity
///
/// Authentication is exclusively via the mutual-TLS client certificate;
/// the caller's own SAE identity is never sent as a request parameter.
#[derive(Debug, Clone)]
pub struct EtsiConfig {
    /// KME API root, e.g. `https://kme-1.example.net/api/v1`
    pub base_url: String,
    /// This party's SAE identifier, as bound to the client certificate
    pub sae_id: String,
    /// Client certificate, PEM
    pub cert_path: PathBuf,
    /// Client private key, PKCS#8 PEM
    pub key_path: PathBuf,
    /// Server CA certificate to pin, PEM
    pub ca_cert_path: Option<PathBuf>,
    /// Bound on every request, connection setup included
    pub timeout_secs: u64,
}

impl EtsiConfig {
    pub fn new(base_url: &str, sae_id: &str, cert_path: &Path, key_path: &Path) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            sae_id: sae_id.to_string(),
            cert_path: cert_path.to_path_buf(),
            key_path: key_path.to_path_buf(),
            ca_cert_path: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Build the endpoint URL for a QuKayDee cloud account
    pub fn qukaydee(
        account_id: &str,
        kme_id: &str,
        sae_id: &str,
        cert_path: &Path,
        key_path: &Path,
    ) -> Self {
        let base_url = format!(
            "https://{}.acct-{}.etsi-qkd-api.qukaydee.com/api/v1",
            kme_id, account_id
        );
        Self::new(&base_url, sae_id, cert_path, key_path)
    }

    pub fn with_ca_cert(mut self, ca_cert_path: &Path) -> Self {
        self.ca_cert_path = Some(ca_cert_path.to_path_buf());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Key-stream status advertised by the KME for one slave SAE
#[derive(Debug, Clone, Deserialize)]
pub struct KmeStatus {
    #[serde(default)]
    pub stored_key_count: u64,
    /// Largest key size the KME will serve, in bits; absent means
    /// the server advertises no limit
    #[serde(default)]
    pub max_key_size: Option<u64>,
    /// Seconds a served key remains retrievable
    #[serde(default)]
    pub key_expiry_time: Option<u64>,
}

/// One key entry from an `enc_keys` or `dec_keys` response
///
/// Servers differ on the casing of the identifier field; both `key_ID`
/// and `key_id` are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyContainer {
    #[serde(rename = "key_ID", alias = "key_id")]
    pub key_id: Option<String>,
    /// Base64-encoded key material
    pub key: Option<String>,
}

/// Thin blocking ETSI GS QKD 014 REST client
///
/// Exposes the three protocol operations - `status`, `enc_keys` and
/// `dec_keys` - with uniform error mapping: transport and HTTP-level
/// failures are [`CryptoError::ProviderTransportError`], API error
/// payloads and unparseable bodies are
/// [`CryptoError::ProviderProtocolError`]. Role semantics live in
/// [`EtsiQkdProvider`], not here.
pub struct EtsiKmeClient {
    http: Client,
    base_url: String,
    sae_id: String,
}

impl EtsiKmeClient {
    /// Build a client from connection parameters
    ///
    /// Loads the client certificate and key if the configured paths
    /// exist; a missing identity is tolerated for lab setups against
    /// plain-HTTP mock servers and logged as a warning.
    pub fn new(config: &EtsiConfig) -> CryptoResult<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_secs));

        if config.cert_path.exists() && config.key_path.exists() {
            let cert_pem = fs::read(&config.cert_path).map_err(|e| {
                CryptoError::transport_error(
                    &config.base_url,
                    &format!("failed to read client certificate: {}", e),
                    error_codes::PROVIDER_TLS_SETUP_FAILED,
                )
            })?;
            let key_pem = fs::read(&config.key_path).map_err(|e| {
                CryptoError::transport_error(
                    &config.base_url,
                    &format!("failed to read client key: {}", e),
                    error_codes::PROVIDER_TLS_SETUP_FAILED,
                )
            })?;

            let identity = Identity::from_pkcs8_pem(&cert_pem, &key_pem).map_err(|e| {
                CryptoError::transport_error(
                    &config.base_url,
                    &format!("failed to build TLS identity: {}", e),
                    error_codes::PROVIDER_TLS_SETUP_FAILED,
                )
            })?;
            builder = builder.identity(identity);
        } else {
            log::warn!(
                "client certificate {:?} or key {:?} missing; proceeding without mTLS identity",
                config.cert_path,
                config.key_path
            );
        }

        if let Some(ca_path) = &config.ca_cert_path {
            let ca_pem = fs::read(ca_path).map_err(|e| {
                CryptoError::transport_error(
                    &config.base_url,
                    &format!("failed to read CA certificate: {}", e),
                    error_codes::PROVIDER_TLS_SETUP_FAILED,
                )
            })?;
            let ca_cert = Certificate::from_pem(&ca_pem).map_err(|e| {
                CryptoError::transport_error(
                    &config.base_url,
                    &format!("invalid CA certificate: {}", e),
                    error_codes::PROVIDER_TLS_SETUP_FAILED,
                )
            })?;
            builder = builder.add_root_certificate(ca_cert);
        }

        let http = builder.build().map_err(|e| {
            CryptoError::transport_error(
                &config.base_url,
                &format!("failed to build HTTP client: {}", e),
                error_codes::PROVIDER_TLS_SETUP_FAILED,
            )
        })?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            sae_id: config.sae_id.clone(),
        })
    }

    /// This party's SAE identifier
    pub fn sae_id(&self) -> &str {
        &self.sae_id
    }

    /// `GET /keys/{slave_sae_id}/status`
    pub fn status(&self, slave_sae_id: &str) -> CryptoResult<KmeStatus> {
        let value = self.request(
            reqwest::Method::GET,
            &format!("/keys/{}/status", slave_sae_id),
            &[],
        )?;

        serde_json::from_value(value).map_err(|e| {
            CryptoError::protocol_error(
                "status",
                &format!("unexpected status payload: {}", e),
                error_codes::PROVIDER_INVALID_RESPONSE,
            )
        })
    }

    /// `POST /keys/{slave_sae_id}/enc_keys` - master role, new keys
    pub fn enc_keys(
        &self,
        slave_sae_id: &str,
        number: usize,
        size_bits: usize,
    ) -> CryptoResult<Vec<KeyContainer>> {
        let value = self.request(
            reqwest::Method::POST,
            &format!("/keys/{}/enc_keys", slave_sae_id),
            &[
                ("number", number.to_string()),
                ("size", size_bits.to_string()),
            ],
        )?;

        Self::extract_keys("enc_keys", value)
    }

    /// `GET /keys/{master_sae_id}/dec_keys` - slave role, key by id
    pub fn dec_keys(&self, master_sae_id: &str, key_id: &str) -> CryptoResult<Vec<KeyContainer>> {
        let value = self.request(
            reqwest::Method::GET,
            &format!("/keys/{}/dec_keys", master_sae_id),
            &[("key_ID", key_id.to_string())],
        )?;

        Self::extract_keys("dec_keys", value)
    }

    fn extract_keys(
        operation: &str,
        mut value: serde_json::Value,
    ) -> CryptoResult<Vec<KeyContainer>> {
        match value.get_mut("keys") {
            None => Ok(Vec::new()),
            Some(keys) => serde_json::from_value(keys.take()).map_err(|e| {
                CryptoError::protocol_error(
                    operation,
                    &format!("unexpected keys payload: {}", e),
                    error_codes::PROVIDER_INVALID_RESPONSE,
                )
            }),
        }
    }

    /// Issue one request and apply the shared error mapping
    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, String)],
    ) -> CryptoResult<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("KME request: {} {}", method, url);

        let mut builder = self
            .http
            .request(method, &url)
            .header("Accept", "application/json");
        if !query.is_empty() {
            builder = builder.query(query);
        }

        let response = builder.send().map_err(|e| {
            CryptoError::transport_error(
                &url,
                &format!("request failed: {}", e),
                error_codes::PROVIDER_CONNECTION_FAILED,
            )
        })?;

        let status = response.status();
        let body = response.text().map_err(|e| {
            CryptoError::transport_error(
                &url,
                &format!("failed to read response body: {}", e),
                error_codes::PROVIDER_CONNECTION_FAILED,
            )
        })?;

        if !status.is_success() {
            return Err(CryptoError::transport_error(
                &url,
                &format!("HTTP {}: {}", status, body),
                error_codes::PROVIDER_HTTP_ERROR,
            ));
        }

        let value: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            CryptoError::protocol_error(
                path,
                &format!("response is not valid JSON: {}", e),
                error_codes::PROVIDER_INVALID_RESPONSE,
            )
        })?;

        // ETSI error model: errors surface in the body, not only as
        // HTTP status codes
        if let Some(error) = value.get("error") {
            return Err(CryptoError::protocol_error(
                path,
                &error.to_string(),
                error_codes::PROVIDER_API_ERROR,
            ));
        }
        if let Some(errors) = value.get("errors") {
            let is_empty = errors.as_array().map(|a| a.is_empty()).unwrap_or(false);
            if !is_empty {
                return Err(CryptoError::protocol_error(
                    path,
                    &errors.to_string(),
                    error_codes::PROVIDER_API_ERROR,
                ));
            }
        }

        Ok(value)
    }
}

/// ETSI GS QKD 014 provider with master/slave role enforcement
///
/// Wraps [`EtsiKmeClient`] and enforces the call sequence of the two
/// roles: the master checks the key stream before requesting, the slave
/// may not retrieve a key it originated itself.
pub struct EtsiQkdProvider {
    client: EtsiKmeClient,
}

impl EtsiQkdProvider {
    pub fn new(config: &EtsiConfig) -> CryptoResult<Self> {
        Ok(Self {
            client: EtsiKmeClient::new(config)?,
        })
    }

    pub fn from_client(client: EtsiKmeClient) -> Self {
        Self { client }
    }

    pub fn sae_id(&self) -> &str {
        self.client.sae_id()
    }

    fn provenance(expires_in: Option<u64>) -> KeyProvenance {
        KeyProvenance {
            source: ETSI_PROVENANCE_SOURCE.to_string(),
            standard: Some(ETSI_STANDARD.to_string()),
            expires_in,
        }
    }

    fn decode_key_material(operation: &str, key_b64: &str) -> CryptoResult<Vec<u8>> {
        base64::decode(key_b64).map_err(|e| {
            CryptoError::protocol_error(
                operation,
                &format!("key material is not valid base64: {}", e),
                error_codes::PROVIDER_MALFORMED_KEY,
            )
        })
    }
}

impl QkdProvider for EtsiQkdProvider {
    /// Master flow: status check, then exactly one key via `enc_keys`
    fn request_key(&self, receiver_id: &str, size_bits: usize) -> CryptoResult<OriginatedKey> {
        let status = self.client.status(receiver_id)?;

        if status.stored_key_count == 0 {
            return Err(CryptoError::policy_error(
                "key_stream",
                &format!("no keys available in key stream for {}", receiver_id),
                error_codes::POLICY_KEY_STREAM_EMPTY,
            ));
        }
        if let Some(max_key_size) = status.max_key_size {
            if size_bits as u64 > max_key_size {
                return Err(CryptoError::policy_error(
                    "key_size",
                    &format!(
                        "requested {} bits exceeds KME maximum of {} bits",
                        size_bits, max_key_size
                    ),
                    error_codes::POLICY_KEY_SIZE_EXCEEDED,
                ));
            }
        }

        let keys = self.client.enc_keys(receiver_id, 1, size_bits)?;
        let entry = keys.into_iter().next().ok_or_else(|| {
            CryptoError::protocol_error(
                "enc_keys",
                "no keys returned by enc_keys",
                error_codes::PROVIDER_NO_KEYS_RETURNED,
            )
        })?;

        let key_id = entry.key_id.ok_or_else(|| {
            CryptoError::protocol_error(
                "enc_keys",
                "key entry is missing its identifier",
                error_codes::PROVIDER_MALFORMED_KEY,
            )
        })?;
        let key_b64 = entry.key.ok_or_else(|| {
            CryptoError::protocol_error(
                "enc_keys",
                "key entry is missing its key material",
                error_codes::PROVIDER_MALFORMED_KEY,
            )
        })?;
        let key = Self::decode_key_material("enc_keys", &key_b64)?;

        log::info!(
            "originated KME key {} ({} bits) for {}",
            key_id,
            size_bits,
            receiver_id
        );

        Ok(OriginatedKey {
            key_id,
            key: Zeroizing::new(key),
            provenance: Self::provenance(status.key_expiry_time),
        })
    }

    /// Slave flow: `dec_keys` scoped to the originator and identifier
    fn retrieve_key(&self, originator_id: &str, key_id: &str) -> CryptoResult<RetrievedKey> {
        if originator_id == self.client.sae_id() {
            return Err(CryptoError::policy_error(
                "role",
                "a slave SAE cannot retrieve a key it originated itself",
                error_codes::POLICY_ROLE_VIOLATION,
            ));
        }

        let keys = self.client.dec_keys(originator_id, key_id)?;
        let entry = keys.into_iter().next().ok_or_else(|| {
            CryptoError::protocol_error(
                "dec_keys",
                &format!("key {} not found or expired", key_id),
                error_codes::PROVIDER_NO_KEYS_RETURNED,
            )
        })?;

        let key_b64 = entry.key.ok_or_else(|| {
            CryptoError::protocol_error(
                "dec_keys",
                "key entry is missing its key material",
                error_codes::PROVIDER_MALFORMED_KEY,
            )
        })?;
        let key = Self::decode_key_material("dec_keys", &key_b64)?;

        log::info!("retrieved KME key {} originated by {}", key_id, originator_id);

        Ok(RetrievedKey {
            key: Zeroizing::new(key),
            provenance: Self::provenance(None),
        })
    }
}
