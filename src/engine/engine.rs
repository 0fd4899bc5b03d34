use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use chacha20poly1305::ChaCha20Poly1305;
use rand::rngs::OsRng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::utils;

use super::envelope::{EnvelopeMetadata, SecurityLevel};
use super::kdf;

const NONCE_LENGTH: usize = 12;
const EPHEMERAL_KEY_LENGTH: usize = 32;

/// Four-tier encryption over quantum key material
///
/// Stateless: every call receives the quantum key explicitly, and the
/// returned [`EnvelopeMetadata`] is the only record of how a given
/// ciphertext was produced.
///
/// # Examples
///
/// ```
/// use qumail::engine::{EncryptionEngine, SecurityLevel};
///
/// let engine = EncryptionEngine::new();
/// let quantum_key = qumail::utils::random_bytes(32);
///
/// let (ciphertext, metadata) = engine
///     .encrypt(b"hello", &quantum_key, SecurityLevel::Standard, None)
///     .unwrap();
/// let plaintext = engine
///     .decrypt(&ciphertext, &quantum_key, &metadata, None)
///     .unwrap();
/// assert_eq!(plaintext, b"hello");
/// ```
#[derive(Debug, Default)]
pub struct EncryptionEngine;

impl EncryptionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Encrypt `plaintext` under `quantum_key` at the given level
    ///
    /// # Arguments
    ///
    /// * `plaintext` - Message bytes
    /// * `quantum_key` - Shared quantum key material
    /// * `level` - Security tier to apply
    /// * `recipient` - RSA public key for the Maximum-level wrap;
    ///   ignored at other levels
    ///
    /// # Returns
    ///
    /// The ciphertext and the metadata needed to decrypt it.
    ///
    /// # Errors
    ///
    /// * [`CryptoError::KeyPolicyError`] when a Basic-level key is
    ///   shorter than the plaintext
    /// * [`CryptoError::EncryptionError`] on cipher failures
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        quantum_key: &[u8],
        level: SecurityLevel,
        recipient: Option<&RsaPublicKey>,
    ) -> CryptoResult<(Vec<u8>, EnvelopeMetadata)> {
        match level {
            SecurityLevel::Basic => self.encrypt_basic(plaintext, quantum_key),
            SecurityLevel::Standard => self.encrypt_standard(plaintext, quantum_key),
            SecurityLevel::High => self.encrypt_high(plaintext, quantum_key),
            SecurityLevel::Maximum => self.encrypt_maximum(plaintext, quantum_key, recipient),
        }
    }

    /// Decrypt `ciphertext`, dispatching on the metadata alone
    ///
    /// # Errors
    ///
    /// * [`CryptoError::CryptoIntegrityError`] when AEAD
    ///   authentication fails (tampered ciphertext or wrong key)
    /// * [`CryptoError::EncryptionError`] with
    ///   [`error_codes::DECRYPTION_METADATA_INVALID`] on malformed
    ///   metadata fields, or
    ///   [`error_codes::DECRYPTION_KEY_UNWRAP_FAILED`] when the
    ///   Maximum-level ephemeral key cannot be recovered
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        quantum_key: &[u8],
        metadata: &EnvelopeMetadata,
        private: Option<&RsaPrivateKey>,
    ) -> CryptoResult<Vec<u8>> {
        match metadata {
            EnvelopeMetadata::Basic { key_length } => {
                self.decrypt_basic(ciphertext, quantum_key, *key_length)
            }
            EnvelopeMetadata::Standard { nonce } => {
                self.decrypt_standard(ciphertext, quantum_key, nonce)
            }
            EnvelopeMetadata::High { nonce, key_mixing } => {
                self.decrypt_high(ciphertext, quantum_key, nonce, *key_mixing)
            }
            EnvelopeMetadata::Maximum {
                nonce,
                wrapped_key,
                derived_fallback,
            } => self.decrypt_maximum(
                ciphertext,
                quantum_key,
                nonce,
                wrapped_key.as_deref(),
                *derived_fallback,
                private,
            ),
        }
    }

    // Level 1: the pad must cover the whole plaintext; stretching the
    // key would forfeit the one-time-pad property
    fn encrypt_basic(
        &self,
        plaintext: &[u8],
        quantum_key: &[u8],
    ) -> CryptoResult<(Vec<u8>, EnvelopeMetadata)> {
        if quantum_key.len() < plaintext.len() {
            return Err(CryptoError::policy_error(
                "one_time_pad",
                &format!(
                    "key of {} bytes cannot pad {} bytes of plaintext",
                    quantum_key.len(),
                    plaintext.len()
                ),
                error_codes::POLICY_KEY_TOO_SHORT,
            ));
        }
        let ciphertext = utils::xor_bytes(plaintext, quantum_key);
        let metadata = EnvelopeMetadata::Basic {
            key_length: plaintext.len(),
        };
        Ok((ciphertext, metadata))
    }

    fn decrypt_basic(
        &self,
        ciphertext: &[u8],
        quantum_key: &[u8],
        key_length: usize,
    ) -> CryptoResult<Vec<u8>> {
        if key_length != ciphertext.len() || quantum_key.len() < ciphertext.len() {
            return Err(CryptoError::decryption_error(
                "one_time_pad",
                "pad length does not match ciphertext",
                error_codes::DECRYPTION_METADATA_INVALID,
            ));
        }
        Ok(utils::xor_bytes(ciphertext, quantum_key))
    }

    // Level 2: AES-256-GCM under an HKDF-derived key
    fn encrypt_standard(
        &self,
        plaintext: &[u8],
        quantum_key: &[u8],
    ) -> CryptoResult<(Vec<u8>, EnvelopeMetadata)> {
        let key = kdf::derive_key(quantum_key, 32)?;
        let nonce = utils::random_bytes(NONCE_LENGTH);
        let ciphertext = aes_gcm_encrypt(&key, &nonce, plaintext)?;
        Ok((
            ciphertext,
            EnvelopeMetadata::Standard {
                nonce: hex::encode(&nonce),
            },
        ))
    }

    fn decrypt_standard(
        &self,
        ciphertext: &[u8],
        quantum_key: &[u8],
        nonce_hex: &str,
    ) -> CryptoResult<Vec<u8>> {
        let key = kdf::derive_key(quantum_key, 32)?;
        let nonce = decode_nonce("aes-256-gcm", nonce_hex)?;
        aes_gcm_decrypt(&key, &nonce, ciphertext)
    }

    // Level 3: one extra hash over the quantum key, then a distinct
    // AEAD from level 2
    fn encrypt_high(
        &self,
        plaintext: &[u8],
        quantum_key: &[u8],
    ) -> CryptoResult<(Vec<u8>, EnvelopeMetadata)> {
        let key = high_level_key(quantum_key, true)?;
        let nonce = utils::random_bytes(NONCE_LENGTH);
        let ciphertext = chacha_encrypt(&key, &nonce, plaintext)?;
        Ok((
            ciphertext,
            EnvelopeMetadata::High {
                nonce: hex::encode(&nonce),
                key_mixing: true,
            },
        ))
    }

    fn decrypt_high(
        &self,
        ciphertext: &[u8],
        quantum_key: &[u8],
        nonce_hex: &str,
        key_mixing: bool,
    ) -> CryptoResult<Vec<u8>> {
        let key = high_level_key(quantum_key, key_mixing)?;
        let nonce = decode_nonce("chacha20-poly1305", nonce_hex)?;
        chacha_decrypt(&key, &nonce, ciphertext)
    }

    // Level 4: ephemeral key mixed with the quantum key; the ephemeral
    // either travels RSA-wrapped in the metadata or is re-derivable
    // from the quantum key (the weaker fallback)
    fn encrypt_maximum(
        &self,
        plaintext: &[u8],
        quantum_key: &[u8],
        recipient: Option<&RsaPublicKey>,
    ) -> CryptoResult<(Vec<u8>, EnvelopeMetadata)> {
        let (ephemeral, wrapped_key, derived_fallback) = match recipient {
            Some(public_key) => {
                let ephemeral = Zeroizing::new(utils::random_bytes(EPHEMERAL_KEY_LENGTH));
                let wrapped = public_key
                    .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &ephemeral)
                    .map_err(|e| {
                        CryptoError::encryption_error("rsa-oaep-sha256", &e.to_string())
                    })?;
                (ephemeral, Some(hex::encode(wrapped)), false)
            }
            None => {
                log::warn!(
                    "maximum-level encryption without a recipient key falls back to a \
                     quantum-key-derived ephemeral"
                );
                let ephemeral = kdf::derive_key(quantum_key, EPHEMERAL_KEY_LENGTH)?;
                (ephemeral, None, true)
            }
        };

        let key = kdf::mix_keys(&ephemeral, quantum_key);
        let nonce = utils::random_bytes(NONCE_LENGTH);
        let ciphertext = aes_gcm_encrypt(&key, &nonce, plaintext)?;
        Ok((
            ciphertext,
            EnvelopeMetadata::Maximum {
                nonce: hex::encode(&nonce),
                wrapped_key,
                derived_fallback,
            },
        ))
    }

    fn decrypt_maximum(
        &self,
        ciphertext: &[u8],
        quantum_key: &[u8],
        nonce_hex: &str,
        wrapped_key: Option<&str>,
        derived_fallback: bool,
        private: Option<&RsaPrivateKey>,
    ) -> CryptoResult<Vec<u8>> {
        let ephemeral = match (wrapped_key, derived_fallback) {
            (Some(wrapped_hex), _) => {
                let private_key = private.ok_or_else(|| {
                    CryptoError::decryption_error(
                        "rsa-oaep-sha256",
                        "envelope carries a wrapped key but no private key was supplied",
                        error_codes::DECRYPTION_KEY_UNWRAP_FAILED,
                    )
                })?;
                let wrapped = hex::decode(wrapped_hex).map_err(|_| {
                    CryptoError::decryption_error(
                        "rsa-oaep-sha256",
                        "wrapped key is not valid hex",
                        error_codes::DECRYPTION_METADATA_INVALID,
                    )
                })?;
                Zeroizing::new(private_key.decrypt(Oaep::new::<Sha256>(), &wrapped).map_err(
                    |_| {
                        CryptoError::decryption_error(
                            "rsa-oaep-sha256",
                            "ephemeral key unwrap failed",
                            error_codes::DECRYPTION_KEY_UNWRAP_FAILED,
                        )
                    },
                )?)
            }
            (None, true) => kdf::derive_key(quantum_key, EPHEMERAL_KEY_LENGTH)?,
            (None, false) => {
                return Err(CryptoError::decryption_error(
                    "rsa-oaep-sha256",
                    "envelope carries neither a wrapped key nor the fallback flag",
                    error_codes::DECRYPTION_METADATA_INVALID,
                ))
            }
        };

        let key = kdf::mix_keys(&ephemeral, quantum_key);
        let nonce = decode_nonce("aes-256-gcm", nonce_hex)?;
        aes_gcm_decrypt(&key, &nonce, ciphertext)
    }
}

fn high_level_key(quantum_key: &[u8], key_mixing: bool) -> CryptoResult<Zeroizing<Vec<u8>>> {
    if key_mixing {
        let mixed = Zeroizing::new(Sha256::digest(quantum_key).to_vec());
        kdf::derive_key(&mixed, 32)
    } else {
        kdf::derive_key(quantum_key, 32)
    }
}

fn decode_nonce(algorithm: &str, nonce_hex: &str) -> CryptoResult<Vec<u8>> {
    let nonce = hex::decode(nonce_hex).map_err(|_| {
        CryptoError::decryption_error(
            algorithm,
            "nonce is not valid hex",
            error_codes::DECRYPTION_METADATA_INVALID,
        )
    })?;
    if nonce.len() != NONCE_LENGTH {
        return Err(CryptoError::decryption_error(
            algorithm,
            &format!("nonce is {} bytes, expected {}", nonce.len(), NONCE_LENGTH),
            error_codes::DECRYPTION_METADATA_INVALID,
        ));
    }
    Ok(nonce)
}

fn aes_gcm_encrypt(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| CryptoError::encryption_error("aes-256-gcm", "encryption failed"))
}

fn aes_gcm_decrypt(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::integrity_error("aes-256-gcm", "authentication tag mismatch"))
}

fn chacha_encrypt(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(key));
    cipher
        .encrypt(chacha20poly1305::Nonce::from_slice(nonce), plaintext)
        .map_err(|_| CryptoError::encryption_error("chacha20-poly1305", "encryption failed"))
}

fn chacha_decrypt(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(key));
    cipher
        .decrypt(chacha20poly1305::Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| {
            CryptoError::integrity_error("chacha20-poly1305", "authentication tag mismatch")
        })
}
