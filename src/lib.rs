/*!
 * QuMail Cryptography Core
 *
 * Quantum-key-backed encryption for the QuMail client: quantum keys are
 * obtained from a QKD provider (a local BB84 simulation or a remote
 * ETSI GS QKD 014 Key Management Entity over mutual TLS), tracked
 * through a single-use key lifecycle, and consumed by a four-level
 * encryption engine.
 *
 * The four security levels are:
 *
 * - Level 1 (Basic): true one-time pad over the raw quantum key
 * - Level 2 (Standard): AES-256-GCM under an HKDF-derived key
 * - Level 3 (High): ChaCha20-Poly1305 with an extra key-mixing step
 * - Level 4 (Maximum): hybrid RSA-OAEP-wrapped ephemeral key mixed
 *   with the quantum key, then AES-256-GCM
 *
 * Sender and receiver each own a [`key_management::KeyManager`]; the
 * only shared state between them is the `key_id` travelling inside an
 * [`engine::EncryptedPackage`].
 */

/// BB84 quantum key distribution simulation
pub mod qkd;

/// Quantum key providers: local simulation and remote ETSI KME
pub mod provider;

/// Single-use key lifecycle management
pub mod key_management;

/// Tiered encryption engine
pub mod engine;

/// Common error types for the cryptography core
pub mod error;

/// Utilities for cryptographic operations
pub mod utils;

use rsa::{RsaPrivateKey, RsaPublicKey};

// Re-export main types for convenience
pub use engine::{EncryptedPackage, EncryptionEngine, EnvelopeMetadata, SecurityLevel};
pub use error::{CryptoError, CryptoResult};
pub use key_management::{KeyManager, KeyPolicy};
pub use provider::QkdProvider;
pub use qkd::QkdSimulator;

/// Encrypt a message for `peer_id`, provisioning a fresh quantum key
///
/// Obtains a key through the manager's provider (master flow),
/// registers it locally, and seals the plaintext at the requested
/// level. The resulting package carries everything the receiver needs
/// to locate the key on their side.
///
/// # Arguments
///
/// * `manager` - The sender's key manager
/// * `engine` - Encryption engine
/// * `peer_id` - Identifier of the receiving party
/// * `plaintext` - Message bytes
/// * `level` - Security tier to apply
/// * `recipient` - RSA public key for the Maximum-level wrap
///
/// # Errors
///
/// Propagates provider, policy and encryption failures.
///
/// # Example
///
/// ```
/// use qumail::prelude::*;
///
/// let alice = KeyManager::in_memory("alice");
/// let engine = EncryptionEngine::new();
///
/// let package = seal_message(
///     &alice,
///     &engine,
///     "bob",
///     b"meet at dawn",
///     SecurityLevel::Standard,
///     None,
/// )
/// .unwrap();
/// assert_eq!(package.sender_id, "alice");
/// ```
pub fn seal_message(
    manager: &KeyManager,
    engine: &EncryptionEngine,
    peer_id: &str,
    plaintext: &[u8],
    level: SecurityLevel,
    recipient: Option<&RsaPublicKey>,
) -> CryptoResult<EncryptedPackage> {
    // Basic consumes key material byte for byte; the AEAD levels need
    // a fixed 256 bits
    let key_length_bits = match level {
        SecurityLevel::Basic => plaintext.len().max(1) * 8,
        _ => 256,
    };

    let (key_id, quantum_key) = manager.request_quantum_key(peer_id, key_length_bits)?;
    let (ciphertext, metadata) = engine.encrypt(plaintext, &quantum_key, level, recipient)?;
    Ok(EncryptedPackage::new(
        manager.party_id(),
        &key_id,
        ciphertext,
        metadata,
    ))
}

/// Decrypt a received package, consuming one use of its quantum key
///
/// Looks the key up in the local store first; on a miss it runs the
/// provider's slave flow against the package's originator. Decryption
/// is driven entirely by the package metadata.
///
/// # Errors
///
/// * [`CryptoError::KeyManagementError`] when the key is unavailable
///   both locally and from the provider
/// * [`CryptoError::CryptoIntegrityError`] when authentication fails
pub fn open_message(
    manager: &KeyManager,
    engine: &EncryptionEngine,
    package: &EncryptedPackage,
    private: Option<&RsaPrivateKey>,
) -> CryptoResult<Vec<u8>> {
    let quantum_key = match manager.get_key(&package.key_id)? {
        Some(key) => key,
        None => manager.retrieve_quantum_key(&package.sender_id, &package.key_id)?,
    };
    engine.decrypt(&package.ciphertext, &quantum_key, &package.metadata, private)
}

/// Provides a simplified interface to the most commonly used operations
pub mod prelude {
    pub use crate::engine::kdf::{derive_key, mix_keys};
    pub use crate::key_management::{
        local_pair, FileKeyRepository, KeyManager, KeyMetadata, KeyPolicy, KeyRepository,
        KeyRole, KeyState, MemoryKeyRepository,
    };
    pub use crate::open_message;
    pub use crate::provider::{
        EtsiConfig, EtsiQkdProvider, LocalQkdProvider, QkdProvider,
    };
    pub use crate::qkd::{LocalKeyChannel, QkdSimulator};
    pub use crate::seal_message;
    pub use crate::CryptoError;
    pub use crate::CryptoResult;
    pub use crate::EncryptedPackage;
    pub use crate::EncryptionEngine;
    pub use crate::EnvelopeMetadata;
    pub use crate::SecurityLevel;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_management::local_pair;

    #[test]
    fn test_seal_then_open_between_paired_parties() {
        let (alice, bob) = local_pair("alice", "bob", KeyPolicy::interactive());
        let engine = EncryptionEngine::new();

        let package = seal_message(
            &alice,
            &engine,
            "bob",
            b"meet at dawn",
            SecurityLevel::High,
            None,
        )
        .unwrap();

        let plaintext = open_message(&bob, &engine, &package, None).unwrap();
        assert_eq!(plaintext, b"meet at dawn");
    }

    #[test]
    fn test_seal_basic_provisions_a_full_pad() {
        let (alice, bob) = local_pair("alice", "bob", KeyPolicy::interactive());
        let engine = EncryptionEngine::new();
        let message = vec![0xa5u8; 100];

        let package =
            seal_message(&alice, &engine, "bob", &message, SecurityLevel::Basic, None).unwrap();
        assert_eq!(package.ciphertext.len(), 100);

        let plaintext = open_message(&bob, &engine, &package, None).unwrap();
        assert_eq!(plaintext, message);
    }

    #[test]
    fn test_package_survives_json_transport() {
        let (alice, bob) = local_pair("alice", "bob", KeyPolicy::interactive());
        let engine = EncryptionEngine::new();

        let package = seal_message(
            &alice,
            &engine,
            "bob",
            b"wire format",
            SecurityLevel::Standard,
            None,
        )
        .unwrap();

        let received = EncryptedPackage::from_json(&package.to_json().unwrap()).unwrap();
        let plaintext = open_message(&bob, &engine, &received, None).unwrap();
        assert_eq!(plaintext, b"wire format");
    }
}
