use std::sync::{Arc, Mutex};

use chrono::Utc;
use zeroize::Zeroizing;

use crate::error::CryptoResult;
use crate::provider::{LocalQkdProvider, QkdProvider};

use super::entry::{KeyEntry, KeyEntrySummary, KeyMetadata, KeyPolicy, KeyRole, KeyState};
use super::repository::{KeyRepository, MemoryKeyRepository};

/// Per-party key lifecycle authority
///
/// Owns a provider handle for acquiring quantum keys and a repository
/// for holding them. All state transitions happen here: the repository
/// only stores what the manager tells it to.
///
/// # Examples
///
/// ```
/// use qumail::key_management::KeyManager;
///
/// let alice = KeyManager::in_memory("alice");
/// let (key_id, key) = alice.request_quantum_key("bob", 256).unwrap();
/// assert_eq!(key.len(), 32);
/// assert!(alice.get_key(&key_id).unwrap().is_some());
/// ```
pub struct KeyManager {
    party_id: String,
    provider: Box<dyn QkdProvider>,
    repository: Mutex<Box<dyn KeyRepository>>,
    policy: KeyPolicy,
}

impl KeyManager {
    /// Build a manager over an explicit provider and repository
    pub fn new(
        party_id: &str,
        provider: Box<dyn QkdProvider>,
        repository: Box<dyn KeyRepository>,
        policy: KeyPolicy,
    ) -> Self {
        Self {
            party_id: party_id.to_string(),
            provider,
            repository: Mutex::new(repository),
            policy,
        }
    }

    /// Self-contained manager: simulated QKD, volatile storage,
    /// default policy
    pub fn in_memory(party_id: &str) -> Self {
        Self::new(
            party_id,
            Box::new(LocalQkdProvider::standalone(party_id)),
            Box::new(MemoryKeyRepository::new()),
            KeyPolicy::default(),
        )
    }

    pub fn party_id(&self) -> &str {
        &self.party_id
    }

    /// Originate a fresh quantum key shared with `peer_id` (master
    /// side)
    ///
    /// The key is stored under this manager's policy and its material
    /// is returned to the caller for immediate use. The returned use
    /// does not count against the usage policy; only [`get_key`]
    /// retrievals do.
    ///
    /// # Arguments
    ///
    /// * `peer_id` - Identifier of the receiving party
    /// * `key_length_bits` - Requested key size in bits
    ///
    /// # Returns
    ///
    /// The provider-assigned key identifier and the key material.
    ///
    /// # Errors
    ///
    /// Propagates provider and storage failures.
    ///
    /// [`get_key`]: Self::get_key
    pub fn request_quantum_key(
        &self,
        peer_id: &str,
        key_length_bits: usize,
    ) -> CryptoResult<(String, Zeroizing<Vec<u8>>)> {
        let originated = self.provider.request_key(peer_id, key_length_bits)?;
        let metadata = KeyMetadata {
            peer_id: peer_id.to_string(),
            role: KeyRole::Master,
            source: originated.provenance.source.clone(),
            standard: originated.provenance.standard.clone(),
        };
        self.store_entry(&originated.key_id, &originated.key, metadata)?;
        log::info!(
            "party {} originated key {} for peer {}",
            self.party_id,
            originated.key_id,
            peer_id
        );
        Ok((originated.key_id.clone(), originated.key.clone()))
    }

    /// Fetch the key a peer originated for us, by identifier (slave
    /// side), and store it locally
    pub fn retrieve_quantum_key(
        &self,
        originator_id: &str,
        key_id: &str,
    ) -> CryptoResult<Zeroizing<Vec<u8>>> {
        let retrieved = self.provider.retrieve_key(originator_id, key_id)?;
        let metadata = KeyMetadata {
            peer_id: originator_id.to_string(),
            role: KeyRole::Slave,
            source: retrieved.provenance.source.clone(),
            standard: retrieved.provenance.standard.clone(),
        };
        self.store_entry(key_id, &retrieved.key, metadata)?;
        log::info!(
            "party {} retrieved key {} from originator {}",
            self.party_id,
            key_id,
            originator_id
        );
        Ok(retrieved.key.clone())
    }

    /// Store externally obtained key material under this manager's
    /// policy; returns `false` (leaving the existing entry untouched)
    /// when the identifier is already present
    pub fn store_key(
        &self,
        key_id: &str,
        key_bytes: &[u8],
        metadata: KeyMetadata,
    ) -> CryptoResult<bool> {
        self.store_entry(key_id, key_bytes, metadata)
    }

    fn store_entry(
        &self,
        key_id: &str,
        key_bytes: &[u8],
        metadata: KeyMetadata,
    ) -> CryptoResult<bool> {
        let entry = KeyEntry::new(key_id, key_bytes.to_vec(), &self.policy, metadata);
        let mut repository = self.repository.lock().unwrap();
        repository.insert(&entry)
    }

    /// Retrieve key material for use, applying the lifecycle rules
    ///
    /// Returns `None` when the key is unknown, already consumed, or
    /// expired; a miss is an expected outcome, not an error. A
    /// successful retrieval counts against the usage policy and may
    /// consume the key.
    pub fn get_key(&self, key_id: &str) -> CryptoResult<Option<Zeroizing<Vec<u8>>>> {
        let mut repository = self.repository.lock().unwrap();
        let mut entry = match repository.load(key_id)? {
            Some(entry) => entry,
            None => return Ok(None),
        };

        if entry.state != KeyState::Active {
            return Ok(None);
        }

        // Lazy expiry: the transition is recorded the first time the
        // key is touched past its window
        if entry.is_expired(Utc::now()) {
            entry.state = KeyState::Expired;
            repository.update(&entry)?;
            log::debug!("key {} expired on access", key_id);
            return Ok(None);
        }

        if entry.usage_exhausted() {
            entry.state = KeyState::Consumed;
            repository.update(&entry)?;
            return Ok(None);
        }

        let key = Zeroizing::new(entry.key_bytes.clone());
        entry.usage_count += 1;
        if entry.usage_exhausted() {
            entry.state = KeyState::Consumed;
            log::debug!("key {} consumed after {} uses", key_id, entry.usage_count);
        }
        repository.update(&entry)?;
        Ok(Some(key))
    }

    /// Securely delete a key regardless of its state; returns `false`
    /// when the identifier is unknown
    pub fn delete_key(&self, key_id: &str) -> CryptoResult<bool> {
        let mut repository = self.repository.lock().unwrap();
        repository.remove(key_id)
    }

    /// Sweep the store: mark timed-out `Active` keys `Expired`, then
    /// securely delete everything no longer `Active`
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired_keys(&self) -> CryptoResult<usize> {
        let mut repository = self.repository.lock().unwrap();
        let now = Utc::now();
        let mut removed = 0;

        for key_id in repository.key_ids()? {
            let mut entry = match repository.load(&key_id)? {
                Some(entry) => entry,
                None => continue,
            };
            if entry.state == KeyState::Active && entry.is_expired(now) {
                entry.state = KeyState::Expired;
                repository.update(&entry)?;
            }
            if entry.state != KeyState::Active && repository.remove(&key_id)? {
                removed += 1;
            }
        }

        if removed > 0 {
            log::info!("party {} cleaned up {} keys", self.party_id, removed);
        }
        Ok(removed)
    }

    /// Non-secret summaries of every stored key
    pub fn list_keys(&self) -> CryptoResult<Vec<KeyEntrySummary>> {
        let mut repository = self.repository.lock().unwrap();
        let mut summaries = Vec::new();
        for key_id in repository.key_ids()? {
            if let Some(entry) = repository.load(&key_id)? {
                summaries.push(KeyEntrySummary::from(&entry));
            }
        }
        Ok(summaries)
    }
}

/// Two managers sharing one simulated channel, for paired local use
pub fn local_pair(party_a: &str, party_b: &str, policy: KeyPolicy) -> (KeyManager, KeyManager) {
    let channel = Arc::new(Mutex::new(crate::qkd::LocalKeyChannel::new()));
    let a = KeyManager::new(
        party_a,
        Box::new(LocalQkdProvider::new(party_a, channel.clone())),
        Box::new(MemoryKeyRepository::new()),
        policy,
    );
    let b = KeyManager::new(
        party_b,
        Box::new(LocalQkdProvider::new(party_b, channel)),
        Box::new(MemoryKeyRepository::new()),
        policy,
    );
    (a, b)
}
