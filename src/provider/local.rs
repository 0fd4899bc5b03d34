use std::sync::{Arc, Mutex};

use zeroize::Zeroizing;

use crate::error::CryptoResult;
use crate::qkd::LocalKeyChannel;

use super::{KeyProvenance, OriginatedKey, QkdProvider, RetrievedKey};

/// Provenance source tag for locally simulated BB84 exchanges
pub const LOCAL_PROVENANCE_SOURCE: &str = "local-bb84";

/// Provider over a shared, locally simulated QKD link
///
/// Both parties of a link hold a `LocalQkdProvider` over the *same*
/// [`LocalKeyChannel`]: the sender originates a key, transmits the
/// `key_id` out-of-band, and the receiver retrieves the identical bytes
/// from the shared channel. This mirrors the deployment shape of a real
/// QKD link without any network I/O.
pub struct LocalQkdProvider {
    party_id: String,
    channel: Arc<Mutex<LocalKeyChannel>>,
}

impl LocalQkdProvider {
    pub fn new(party_id: &str, channel: Arc<Mutex<LocalKeyChannel>>) -> Self {
        Self {
            party_id: party_id.to_string(),
            channel,
        }
    }

    /// Convenience constructor building a private channel
    ///
    /// Useful for single-party tests; paired parties should share one
    /// channel via [`LocalQkdProvider::new`].
    pub fn standalone(party_id: &str) -> Self {
        Self::new(party_id, Arc::new(Mutex::new(LocalKeyChannel::new())))
    }

    pub fn party_id(&self) -> &str {
        &self.party_id
    }

    fn provenance() -> KeyProvenance {
        KeyProvenance {
            source: LOCAL_PROVENANCE_SOURCE.to_string(),
            standard: None,
            expires_in: None,
        }
    }
}

impl QkdProvider for LocalQkdProvider {
    fn request_key(&self, receiver_id: &str, size_bits: usize) -> CryptoResult<OriginatedKey> {
        let mut channel = self.channel.lock().unwrap();
        let (key, key_id) = channel.establish_key_pair(&self.party_id, receiver_id, size_bits)?;

        Ok(OriginatedKey {
            key_id,
            key: Zeroizing::new(key),
            provenance: Self::provenance(),
        })
    }

    fn retrieve_key(&self, originator_id: &str, key_id: &str) -> CryptoResult<RetrievedKey> {
        log::debug!(
            "{} retrieving simulated key {} originated by {}",
            self.party_id,
            key_id,
            originator_id
        );

        // One-shot delivery: the channel stops serving the key once
        // the receiver has fetched it
        let mut channel = self.channel.lock().unwrap();
        let key = channel.take_key(key_id)?;

        Ok(RetrievedKey {
            key: Zeroizing::new(key),
            provenance: Self::provenance(),
        })
    }
}
