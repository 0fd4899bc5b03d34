/*!
 * Tiered encryption engine
 *
 * Four security levels over quantum key material, from a true one-time
 * pad up to a hybrid RSA-wrapped construction. Encryption produces an
 * [`EnvelopeMetadata`] alongside the ciphertext; decryption is driven
 * entirely by that metadata.
 */

mod engine;
mod envelope;
pub mod kdf;

pub use engine::EncryptionEngine;
pub use envelope::{EncryptedPackage, EnvelopeMetadata, SecurityLevel, PACKAGE_VERSION};

#[cfg(test)]
mod tests;
