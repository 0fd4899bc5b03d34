/*!
 * Quantum key providers
 *
 * A provider originates keys (master role) and retrieves keys by
 * identifier (slave role). Two implementations are available: a local
 * provider over a simulated BB84 channel, and a client for a remote Key
 * Management Entity speaking ETSI GS QKD 014 over mutual TLS.
 */

mod etsi;
mod local;

use zeroize::Zeroizing;

use crate::error::CryptoResult;

pub use etsi::{EtsiConfig, EtsiKmeClient, EtsiQkdProvider, KeyContainer, KmeStatus};
pub use local::LocalQkdProvider;


/// Where a key came from and how long the origin will serve it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyProvenance {
    /// Origination mechanism, e.g. `"local-bb84"` or `"qukaydee"`
    pub source: String,
    /// Protocol standard, if any, e.g. `"ETSI-GS-QKD-014"`
    pub standard: Option<String>,
    /// Seconds the origin will keep serving this key, if advertised
    pub expires_in: Option<u64>,
}

/// A freshly originated key, returned by the master flow
#[derive(Debug)]
pub struct OriginatedKey {
    pub key_id: String,
    pub key: Zeroizing<Vec<u8>>,
    pub provenance: KeyProvenance,
}

/// A key fetched by identifier, returned by the slave flow
#[derive(Debug)]
pub struct RetrievedKey {
    pub key: Zeroizing<Vec<u8>>,
    pub provenance: KeyProvenance,
}

/// Source of single-use quantum key material
///
/// Calls are blocking; a provider holds no state between calls beyond
/// its connection parameters. Callers needing concurrency run
/// independent provider instances.
pub trait QkdProvider: Send + Sync {
    /// Master flow: originate one key of `size_bits` for `receiver_id`
    ///
    /// The returned `key_id` must be transmitted to the receiver
    /// out-of-band before it can call [`QkdProvider::retrieve_key`].
    fn request_key(&self, receiver_id: &str, size_bits: usize) -> CryptoResult<OriginatedKey>;

    /// Slave flow: fetch the key `key_id` originated by `originator_id`
    fn retrieve_key(&self, originator_id: &str, key_id: &str) -> CryptoResult<RetrievedKey>;
}
