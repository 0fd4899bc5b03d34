use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Lifecycle state of a stored key
///
/// Once a key leaves `Active`, its material is never returned to any
/// caller again; the entry lingers only until the next cleanup sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyState {
    Active,
    Consumed,
    Expired,
}

/// Role this party played when the key entered its store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyRole {
    /// Originated the key (sender side)
    Master,
    /// Retrieved the key by identifier (receiver side)
    Slave,
}

/// Non-secret descriptive fields of a key entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMetadata {
    /// The other party of the exchange
    pub peer_id: String,
    pub role: KeyRole,
    /// Provenance, e.g. `"local-bb84"` or `"qukaydee"`
    pub source: String,
    /// Protocol standard tag, e.g. `"ETSI-GS-QKD-014"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard: Option<String>,
}

/// Usage and freshness policy applied to newly stored keys
///
/// Policy is configuration, not a per-call decision: a manager applies
/// one policy to everything it stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPolicy {
    /// Freshness window from the moment of storage
    pub ttl: Duration,
    /// Retrievals allowed before the key is consumed; `None` is
    /// unlimited
    pub max_usage: Option<u32>,
}

impl KeyPolicy {
    pub fn new(ttl: Duration, max_usage: Option<u32>) -> Self {
        Self { ttl, max_usage }
    }

    /// Short-lived interactive keys: 10 minutes, two uses
    ///
    /// Two retrievals cover the sender encrypting and the receiver
    /// decrypting through stores that happen to be shared in tests;
    /// in a real split deployment each side uses its key once.
    pub fn interactive() -> Self {
        Self {
            ttl: Duration::minutes(10),
            max_usage: Some(2),
        }
    }

    /// Longer-lived storage-oriented keys: 24 hours, two uses
    pub fn storage() -> Self {
        Self {
            ttl: Duration::hours(24),
            max_usage: Some(2),
        }
    }
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self::storage()
    }
}

/// One persisted key record
///
/// The serialized form carries the key material hex-encoded; the
/// in-memory copy is zeroized when the entry is dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyEntry {
    pub key_id: String,
    #[serde(with = "hex")]
    pub key_bytes: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub usage_count: u32,
    pub max_usage: Option<u32>,
    pub state: KeyState,
    pub metadata: KeyMetadata,
}

impl KeyEntry {
    /// Create a fresh `Active` entry under the given policy
    pub fn new(key_id: &str, key_bytes: Vec<u8>, policy: &KeyPolicy, metadata: KeyMetadata) -> Self {
        let now = Utc::now();
        Self {
            key_id: key_id.to_string(),
            key_bytes,
            created_at: now,
            expires_at: now + policy.ttl,
            usage_count: 0,
            max_usage: policy.max_usage,
            state: KeyState::Active,
            metadata,
        }
    }

    /// Whether the freshness window has passed at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether the usage policy permits no further retrievals
    pub fn usage_exhausted(&self) -> bool {
        match self.max_usage {
            Some(max) => self.usage_count >= max,
            None => false,
        }
    }
}

impl Drop for KeyEntry {
    fn drop(&mut self) {
        self.key_bytes.zeroize();
    }
}

/// Non-secret view of a key entry, for listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyEntrySummary {
    pub key_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub usage_count: u32,
    pub max_usage: Option<u32>,
    pub state: KeyState,
    pub metadata: KeyMetadata,
}

impl From<&KeyEntry> for KeyEntrySummary {
    fn from(entry: &KeyEntry) -> Self {
        Self {
            key_id: entry.key_id.clone(),
            created_at: entry.created_at,
            expires_at: entry.expires_at,
            usage_count: entry.usage_count,
            max_usage: entry.max_usage,
            state: entry.state,
            metadata: entry.metadata.clone(),
        }
    }
}
