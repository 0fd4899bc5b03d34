use std::collections::HashMap;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{error_codes, CryptoError, CryptoResult};

use super::simulator::QkdSimulator;

/// One stored key from a simulated pair exchange
#[derive(Zeroize, ZeroizeOnDrop)]
struct ChannelKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    party_a: String,
    #[zeroize(skip)]
    party_b: String,
}

/// In-memory key store over a simulated QKD link
///
/// Wraps a [`QkdSimulator`] and hands out `(key_bytes, key_id)` pairs for
/// a named pair of parties. Keys are retrievable by identifier only;
/// there is no enumeration by party pair. Used exclusively for locally
/// paired simulated exchanges - both parties of a link share one channel
/// instance.
pub struct LocalKeyChannel {
    simulator: QkdSimulator,
    store: HashMap<String, ChannelKey>,
}

impl LocalKeyChannel {
    /// Create a channel over a noiseless simulated link
    pub fn new() -> Self {
        Self::with_simulator(QkdSimulator::new())
    }

    /// Create a channel over a specific simulator configuration
    pub fn with_simulator(simulator: QkdSimulator) -> Self {
        Self {
            simulator,
            store: HashMap::new(),
        }
    }

    /// Run a BB84 exchange between two parties and retain the result
    ///
    /// The key length is per call; the channel holds no length state.
    /// Returns the key bytes and the identifier under which the peer can
    /// fetch the same key.
    pub fn establish_key_pair(
        &mut self,
        party_a: &str,
        party_b: &str,
        key_length_bits: usize,
    ) -> CryptoResult<(Vec<u8>, String)> {
        let (key, key_id) = self.simulator.generate_quantum_key(key_length_bits)?;

        self.store.insert(
            key_id.clone(),
            ChannelKey {
                key: key.clone(),
                party_a: party_a.to_string(),
                party_b: party_b.to_string(),
            },
        );

        log::debug!(
            "established simulated key {} between {} and {}",
            key_id,
            party_a,
            party_b
        );

        Ok((key, key_id))
    }

    /// Retrieve a previously established key by identifier
    ///
    /// # Errors
    ///
    /// [`CryptoError::KeyManagementError`] with code `KEY_NOT_FOUND` if
    /// the identifier is unknown.
    pub fn get_key(&self, key_id: &str) -> CryptoResult<Vec<u8>> {
        self.store
            .get(key_id)
            .map(|entry| entry.key.clone())
            .ok_or_else(|| {
                CryptoError::key_management_error(
                    "get_key",
                    &format!("key {} not found in channel store", key_id),
                    error_codes::KEY_NOT_FOUND,
                )
            })
    }

    /// Take a key out of the channel store, by identifier
    ///
    /// Delivery is one-shot: the slave flow of a provider consumes the
    /// stored copy, the same way a KME stops serving a key once it has
    /// been fetched. Later calls for the same identifier miss.
    pub fn take_key(&mut self, key_id: &str) -> CryptoResult<Vec<u8>> {
        self.store
            .remove(key_id)
            .map(|entry| entry.key.clone())
            .ok_or_else(|| {
                CryptoError::key_management_error(
                    "take_key",
                    &format!("key {} not found in channel store", key_id),
                    error_codes::KEY_NOT_FOUND,
                )
            })
    }

    /// Parties recorded for a stored key, if present
    pub fn parties(&self, key_id: &str) -> Option<(&str, &str)> {
        self.store
            .get(key_id)
            .map(|entry| (entry.party_a.as_str(), entry.party_b.as_str()))
    }

    /// Number of keys currently held
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the channel store is empty
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Default for LocalKeyChannel {
    fn default() -> Self {
        Self::new()
    }
}
