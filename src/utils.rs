use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroize;

/// Generate cryptographically secure random bytes of the specified length
pub fn random_bytes(length: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; length];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Securely zero out sensitive data from memory
///
/// This function uses the zeroize crate to ensure the data is properly
/// zeroed and not optimized away by the compiler.
pub fn secure_zero(data: &mut [u8]) {
    data.zeroize();
}

/// XOR two byte slices position by position
///
/// The result has the length of `data`; `key` must be at least as long.
pub fn xor_bytes(data: &[u8], key: &[u8]) -> Vec<u8> {
    debug_assert!(key.len() >= data.len());
    data.iter().zip(key.iter()).map(|(d, k)| d ^ k).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_bytes() {
        let bytes1 = random_bytes(32);
        let bytes2 = random_bytes(32);

        assert_eq!(bytes1.len(), 32);
        assert_eq!(bytes2.len(), 32);
        // Two random byte arrays should be different
        assert_ne!(bytes1, bytes2);
    }

    #[test]
    fn test_secure_zero() {
        let mut data = [1, 2, 3, 4];
        secure_zero(&mut data);
        assert_eq!(data, [0, 0, 0, 0]);
    }

    #[test]
    fn test_xor_bytes_is_involutive() {
        let data = b"attack at dawn";
        let key = random_bytes(data.len());

        let ciphertext = xor_bytes(data, &key);
        assert_ne!(ciphertext, data.to_vec());
        assert_eq!(xor_bytes(&ciphertext, &key), data.to_vec());
    }
}
