use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};

const DERIVATION_CONTEXT: &[u8] = b"qumail-key-derivation";

/// Derive `length` bytes of key material from `input` via HKDF-SHA256
///
/// Deterministic: the same input always yields the same output, which
/// is what lets a receiver re-derive the sender's key from the shared
/// quantum key alone.
pub fn derive_key(input: &[u8], length: usize) -> CryptoResult<Zeroizing<Vec<u8>>> {
    let hkdf = Hkdf::<Sha256>::new(None, input);
    let mut output = Zeroizing::new(vec![0u8; length]);
    hkdf.expand(DERIVATION_CONTEXT, &mut output)
        .map_err(|_| {
            CryptoError::invalid_parameter(
                "length",
                "at most 8160 bytes of HKDF-SHA256 output",
                &length.to_string(),
            )
        })?;
    Ok(output)
}

/// Mix two keys: XOR over the common prefix, then SHA-256
///
/// Always yields 32 bytes. Commutative in its inputs only when they
/// have equal length.
pub fn mix_keys(a: &[u8], b: &[u8]) -> Zeroizing<Vec<u8>> {
    let mut mixed = Zeroizing::new(Vec::with_capacity(a.len().min(b.len())));
    mixed.extend(a.iter().zip(b.iter()).map(|(x, y)| x ^ y));
    Zeroizing::new(Sha256::digest(&*mixed).to_vec())
}
