use std::sync::Arc;
use std::time::Duration;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::CacheConfig;
use crate::errors::{CacheError, CacheResult};

const ENVELOPE_PREFIX: &str = "sealed:v1:";

/// Encrypt/decrypt seam wrapped around every value crossing the engine
/// boundary of a TEE-backed namespace. Providers run their I/O outside the
/// engine critical section: values are encrypted before the engine call and
/// decrypted after it.
#[async_trait]
pub trait TeeProvider: Send + Sync {
    async fn encrypt(&self, plaintext: &[u8]) -> CacheResult<Vec<u8>>;
    async fn decrypt(&self, sealed: &[u8]) -> CacheResult<Vec<u8>>;
    /// Re-validates the provider; failures surface as `AttestationFailed`.
    async fn attest(&self) -> CacheResult<()> {
        Ok(())
    }
    fn name(&self) -> &str;
}

/// Local AES-256-GCM simulator. Explicitly not a security boundary; the key
/// is derived from a configured secret and the envelope is
/// `sealed:v1:<base64(nonce || ciphertext)>`.
pub struct SealedBoxProvider {
    cipher: Aes256Gcm,
}

impl SealedBoxProvider {
    pub fn new(secret: &str) -> Self {
        let key = Sha256::digest(secret.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key).expect("sha-256 digest is a valid aes key");
        Self { cipher }
    }
}

#[async_trait]
impl TeeProvider for SealedBoxProvider {
    async fn encrypt(&self, plaintext: &[u8]) -> CacheResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CacheError::AttestationFailed("encryption failed".into()))?;

        let mut sealed = nonce_bytes.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(format!("{ENVELOPE_PREFIX}{}", BASE64.encode(sealed)).into_bytes())
    }

    async fn decrypt(&self, sealed: &[u8]) -> CacheResult<Vec<u8>> {
        let text = std::str::from_utf8(sealed)
            .map_err(|_| CacheError::AttestationFailed("sealed value is not utf-8".into()))?;
        let encoded = text
            .strip_prefix(ENVELOPE_PREFIX)
            .ok_or_else(|| CacheError::AttestationFailed("missing sealed envelope".into()))?;
        let raw = BASE64
            .decode(encoded)
            .map_err(|_| CacheError::AttestationFailed("sealed envelope is not base64".into()))?;
        if raw.len() < 12 {
            return Err(CacheError::AttestationFailed("sealed envelope too short".into()));
        }

        let (nonce_bytes, ciphertext) = raw.split_at(12);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CacheError::AttestationFailed("decryption failed".into()))
    }

    fn name(&self) -> &str {
        "sealed"
    }
}

#[derive(Serialize)]
struct RemoteSealRequest<'a> {
    data: &'a str,
}

#[derive(Deserialize)]
struct RemoteSealResponse {
    data: String,
}

/// Forwards seal/unseal calls to a remote enclave service.
pub struct HttpTeeProvider {
    name: String,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpTeeProvider {
    pub fn new(name: String, endpoint: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            name,
            endpoint,
            client,
        }
    }

    async fn roundtrip(&self, op: &str, data: &[u8]) -> CacheResult<Vec<u8>> {
        let body = RemoteSealRequest {
            data: &BASE64.encode(data),
        };
        let response = self
            .client
            .post(format!("{}/{op}", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| CacheError::NodeUnavailable(format!("tee provider: {e}")))?;

        if !response.status().is_success() {
            return Err(CacheError::NodeUnavailable(format!(
                "tee provider returned {}",
                response.status()
            )));
        }

        let parsed: RemoteSealResponse = response
            .json()
            .await
            .map_err(|e| CacheError::AttestationFailed(format!("malformed tee response: {e}")))?;
        BASE64
            .decode(parsed.data)
            .map_err(|_| CacheError::AttestationFailed("tee response is not base64".into()))
    }
}

#[async_trait]
impl TeeProvider for HttpTeeProvider {
    async fn encrypt(&self, plaintext: &[u8]) -> CacheResult<Vec<u8>> {
        self.roundtrip("encrypt", plaintext).await
    }

    async fn decrypt(&self, sealed: &[u8]) -> CacheResult<Vec<u8>> {
        self.roundtrip("decrypt", sealed).await
    }

    async fn attest(&self) -> CacheResult<()> {
        let response = self
            .client
            .get(format!("{}/health", self.endpoint))
            .send()
            .await
            .map_err(|e| CacheError::AttestationFailed(format!("tee provider: {e}")))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(CacheError::AttestationFailed(format!(
                "tee provider health returned {}",
                response.status()
            )))
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Periodic re-attestation; emits `AttestationRefresh` on every successful
/// pass and logs failures without stopping.
pub async fn attestation_loop(
    provider: Arc<dyn TeeProvider>,
    events: Arc<crate::events::EventBus>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(600));
    loop {
        ticker.tick().await;
        match provider.attest().await {
            Ok(()) => {
                events.emit(crate::events::CacheEvent::AttestationRefresh {
                    provider: provider.name().to_string(),
                });
            }
            Err(err) => {
                tracing::error!("attestation refresh failed: {}", err);
            }
        }
    }
}

/// Builds the configured provider, if any. "sealed" selects the local
/// simulator; any other name requires an endpoint.
pub fn provider_from_config(config: &CacheConfig) -> CacheResult<Option<Arc<dyn TeeProvider>>> {
    match config.tee_provider.as_deref() {
        None => Ok(None),
        Some("sealed") => {
            let secret = config.tee_secret.as_deref().unwrap_or("cachegrid-dev-secret");
            Ok(Some(Arc::new(SealedBoxProvider::new(secret))))
        }
        Some(name) => {
            let endpoint = config.tee_endpoint.clone().ok_or_else(|| {
                CacheError::Internal(format!("tee provider '{name}' requires TEE_ENDPOINT"))
            })?;
            Ok(Some(Arc::new(HttpTeeProvider::new(
                name.to_string(),
                endpoint,
            ))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sealed_roundtrip() {
        let provider = SealedBoxProvider::new("test-secret");
        let sealed = provider.encrypt(b"hello").await.unwrap();

        assert!(String::from_utf8_lossy(&sealed).starts_with(ENVELOPE_PREFIX));
        assert_eq!(provider.decrypt(&sealed).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_sealed_values_differ_per_encryption() {
        let provider = SealedBoxProvider::new("test-secret");
        let first = provider.encrypt(b"same").await.unwrap();
        let second = provider.encrypt(b"same").await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_decrypt_rejects_garbage() {
        let provider = SealedBoxProvider::new("test-secret");
        let err = provider.decrypt(b"plain-value").await.unwrap_err();
        assert_eq!(err.code(), "ATTESTATION_FAILED");
    }

    #[tokio::test]
    async fn test_decrypt_rejects_wrong_key() {
        let sealed = SealedBoxProvider::new("secret-a")
            .encrypt(b"payload")
            .await
            .unwrap();
        let err = SealedBoxProvider::new("secret-b")
            .decrypt(&sealed)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ATTESTATION_FAILED");
    }

    #[test]
    fn test_provider_from_config() {
        let config = CacheConfig::default();
        assert!(provider_from_config(&config).unwrap().is_none());

        let sealed = CacheConfig {
            tee_provider: Some("sealed".into()),
            ..CacheConfig::default()
        };
        let provider = provider_from_config(&sealed).unwrap().unwrap();
        assert_eq!(provider.name(), "sealed");

        let remote_without_endpoint = CacheConfig {
            tee_provider: Some("phala".into()),
            ..CacheConfig::default()
        };
        assert!(provider_from_config(&remote_without_endpoint).is_err());
    }
}
