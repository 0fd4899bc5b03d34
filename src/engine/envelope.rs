use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};

/// Envelope format version carried by every package
pub const PACKAGE_VERSION: u8 = 1;

/// The four tiers of the encryption engine, weakest guarantees last
///
/// Basic is information-theoretically secure but consumes key material
/// byte for byte; the other three trade that property for bounded key
/// consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    /// One-time pad over the raw quantum key
    Basic,
    /// AES-256-GCM under an HKDF-derived key
    Standard,
    /// ChaCha20-Poly1305 with an extra key-mixing step
    High,
    /// Hybrid: ephemeral key, RSA-OAEP wrap, AES-256-GCM
    Maximum,
}

impl SecurityLevel {
    /// Numeric tier, 1 through 4
    pub fn ordinal(self) -> u8 {
        match self {
            SecurityLevel::Basic => 1,
            SecurityLevel::Standard => 2,
            SecurityLevel::High => 3,
            SecurityLevel::Maximum => 4,
        }
    }
}

impl TryFrom<u8> for SecurityLevel {
    type Error = CryptoError;

    fn try_from(value: u8) -> CryptoResult<Self> {
        match value {
            1 => Ok(SecurityLevel::Basic),
            2 => Ok(SecurityLevel::Standard),
            3 => Ok(SecurityLevel::High),
            4 => Ok(SecurityLevel::Maximum),
            other => Err(CryptoError::invalid_parameter(
                "security_level",
                "1 through 4",
                &other.to_string(),
            )),
        }
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SecurityLevel::Basic => "basic",
            SecurityLevel::Standard => "standard",
            SecurityLevel::High => "high",
            SecurityLevel::Maximum => "maximum",
        };
        f.write_str(name)
    }
}

/// Per-level envelope metadata: the single source of truth for how to
/// reverse a ciphertext
///
/// Decrypt dispatches exhaustively on this enum; there is no separate
/// client-side level setting. Each variant carries only the fields its
/// level needs, so a missing field is a deserialization failure rather
/// than a run-time surprise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "security_level", rename_all = "lowercase")]
pub enum EnvelopeMetadata {
    Basic {
        /// Bytes of quantum key consumed by the pad
        key_length: usize,
    },
    Standard {
        /// 96-bit AEAD nonce, hex
        nonce: String,
    },
    High {
        nonce: String,
        /// The quantum key was hashed once before derivation
        key_mixing: bool,
    },
    Maximum {
        nonce: String,
        /// RSA-OAEP-wrapped ephemeral key, hex; absent on the
        /// derived-fallback path
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wrapped_key: Option<String>,
        /// The ephemeral key was derived from the quantum key instead
        /// of being randomly drawn and wrapped
        derived_fallback: bool,
    },
}

impl EnvelopeMetadata {
    pub fn security_level(&self) -> SecurityLevel {
        match self {
            EnvelopeMetadata::Basic { .. } => SecurityLevel::Basic,
            EnvelopeMetadata::Standard { .. } => SecurityLevel::Standard,
            EnvelopeMetadata::High { .. } => SecurityLevel::High,
            EnvelopeMetadata::Maximum { .. } => SecurityLevel::Maximum,
        }
    }
}

/// A sealed message as it travels between parties
///
/// Carries everything a receiver needs apart from the quantum key
/// itself: the originator identity and `key_id` for the slave-flow
/// lookup, the ciphertext, and the level metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedPackage {
    pub version: u8,
    pub sender_id: String,
    pub key_id: String,
    #[serde(with = "hex")]
    pub ciphertext: Vec<u8>,
    pub metadata: EnvelopeMetadata,
}

impl EncryptedPackage {
    pub fn new(
        sender_id: &str,
        key_id: &str,
        ciphertext: Vec<u8>,
        metadata: EnvelopeMetadata,
    ) -> Self {
        Self {
            version: PACKAGE_VERSION,
            sender_id: sender_id.to_string(),
            key_id: key_id.to_string(),
            ciphertext,
            metadata,
        }
    }

    pub fn to_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> CryptoResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
