use rand::{rngs::OsRng, Rng};
use sha2::{Digest, Sha256};

use crate::error::{error_codes, CryptoError, CryptoResult};

/// QBER threshold above which an exchange is treated as eavesdropped
///
/// 11% is the usual abort bound for BB84 with one-way post-processing.
pub const DEFAULT_QBER_THRESHOLD: f64 = 0.11;

/// Raw transmission length as a multiple of the target key length
///
/// Roughly half of all positions are discarded during sifting and a
/// further sample is sacrificed for error estimation, so the exchange
/// starts from four times the requested number of bits.
pub const OVERSAMPLING_FACTOR: usize = 4;

/// Measurement basis for a single qubit
///
/// `Rectilinear` is the + basis (0°/90°), `Diagonal` the × basis
/// (45°/135°). Only basis agreement matters to the logical simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Basis {
    Rectilinear,
    Diagonal,
}

/// Logical BB84 protocol simulator
///
/// Produces a shared secret of a caller-chosen bit length while
/// reproducing the statistical behaviour of BB84: sifting discards about
/// half of the transmitted positions, and a channel error rate above the
/// QBER threshold aborts the exchange instead of degrading the key.
///
/// The target key length is an explicit parameter of
/// [`QkdSimulator::generate_quantum_key`]; the simulator itself carries
/// only channel characteristics.
///
/// # Examples
///
/// ```
/// use qumail::qkd::QkdSimulator;
///
/// let simulator = QkdSimulator::new();
/// let (key, key_id) = simulator.generate_quantum_key(256).unwrap();
/// assert_eq!(key.len(), 32);
/// assert_eq!(key_id.len(), 16);
/// ```
#[derive(Debug, Clone)]
pub struct QkdSimulator {
    channel_error_rate: f64,
    qber_threshold: f64,
}

impl Default for QkdSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl QkdSimulator {
    /// Create a simulator with a noiseless channel and the default
    /// QBER abort threshold
    pub fn new() -> Self {
        Self {
            channel_error_rate: 0.0,
            qber_threshold: DEFAULT_QBER_THRESHOLD,
        }
    }

    /// Create a simulator whose channel flips matching-basis bits with
    /// the given probability
    ///
    /// Rates above the QBER threshold model an eavesdropper and make
    /// [`QkdSimulator::generate_quantum_key`] abort with high
    /// probability.
    pub fn with_channel_error_rate(channel_error_rate: f64) -> Self {
        Self {
            channel_error_rate,
            qber_threshold: DEFAULT_QBER_THRESHOLD,
        }
    }

    /// The configured channel error rate
    pub fn channel_error_rate(&self) -> f64 {
        self.channel_error_rate
    }

    /// The configured QBER abort threshold
    pub fn qber_threshold(&self) -> f64 {
        self.qber_threshold
    }

    /// Draw `length` uniform independent bits from the OS entropy source
    pub fn generate_random_bits(&self, length: usize) -> Vec<bool> {
        let mut rng = OsRng;
        (0..length).map(|_| rng.gen()).collect()
    }

    /// Draw `length` uniform independent measurement bases
    pub fn generate_random_bases(&self, length: usize) -> Vec<Basis> {
        let mut rng = OsRng;
        (0..length)
            .map(|_| {
                if rng.gen() {
                    Basis::Diagonal
                } else {
                    Basis::Rectilinear
                }
            })
            .collect()
    }

    /// Transmit Alice's prepared bits through the simulated channel
    ///
    /// The receiver draws a random basis per position. Where the bases
    /// match, the bit arrives correctly except that it is flipped with
    /// the channel error rate; where they differ, the measurement result
    /// is uniformly random.
    ///
    /// Returns the received bits and the receiver's bases.
    pub fn simulate_quantum_channel(
        &self,
        bits: &[bool],
        bases: &[Basis],
    ) -> (Vec<bool>, Vec<Basis>) {
        let mut rng = OsRng;
        let receiver_bases = self.generate_random_bases(bits.len());

        let received_bits = bits
            .iter()
            .zip(bases.iter())
            .zip(receiver_bases.iter())
            .map(|((&bit, &alice_basis), &bob_basis)| {
                if alice_basis == bob_basis {
                    if rng.gen::<f64>() < self.channel_error_rate {
                        !bit
                    } else {
                        bit
                    }
                } else {
                    rng.gen()
                }
            })
            .collect();

        (received_bits, receiver_bases)
    }

    /// Basis reconciliation: keep only positions where both bases agree
    ///
    /// The sifted length is non-deterministic, about half of the input
    /// on average.
    pub fn sift_key(
        &self,
        alice_bits: &[bool],
        alice_bases: &[Basis],
        bob_bits: &[bool],
        bob_bases: &[Basis],
    ) -> (Vec<bool>, Vec<bool>) {
        let mut alice_sifted = Vec::new();
        let mut bob_sifted = Vec::new();

        for i in 0..alice_bases.len().min(bob_bases.len()) {
            if alice_bases[i] == bob_bases[i] {
                alice_sifted.push(alice_bits[i]);
                bob_sifted.push(bob_bits[i]);
            }
        }

        (alice_sifted, bob_sifted)
    }

    /// Estimate the quantum bit error rate over a sample prefix
    ///
    /// QBER = mismatches / sample size. The sampled bits are disclosed
    /// by comparison and must not contribute to the final key.
    pub fn estimate_error_rate(
        &self,
        alice_sifted: &[bool],
        bob_sifted: &[bool],
        sample_size: usize,
    ) -> CryptoResult<f64> {
        let available = alice_sifted.len().min(bob_sifted.len());
        if sample_size > available {
            return Err(CryptoError::qkd_error(
                "estimate_error_rate",
                &format!(
                    "sample of {} bits exceeds sifted length {}",
                    sample_size, available
                ),
                error_codes::QKD_SAMPLE_TOO_LARGE,
            ));
        }
        if sample_size == 0 {
            return Ok(0.0);
        }

        let errors = alice_sifted[..sample_size]
            .iter()
            .zip(bob_sifted[..sample_size].iter())
            .filter(|(a, b)| a != b)
            .count();

        Ok(errors as f64 / sample_size as f64)
    }

    /// Compress sifted bits into exactly `key_length_bits / 8` bytes
    ///
    /// Iterated SHA-256 over the packed bit string destroys partial
    /// information an eavesdropper might hold about individual bits.
    /// Deterministic: the same sifted input always yields the same key.
    pub fn privacy_amplification(&self, bits: &[bool], key_length_bits: usize) -> Vec<u8> {
        let key_length_bytes = key_length_bits / 8;

        // Pack the bit sequence, most significant bit first
        let mut packed = Vec::with_capacity(bits.len() / 8 + 1);
        for chunk in bits.chunks(8) {
            let mut byte = 0u8;
            for (i, &bit) in chunk.iter().enumerate() {
                if bit {
                    byte |= 1 << (7 - i);
                }
            }
            packed.push(byte);
        }

        let mut key: Vec<u8> = Sha256::digest(&packed).to_vec();
        while key.len() < key_length_bytes {
            let next = Sha256::digest(&key[key.len() - 32..]);
            key.extend_from_slice(&next);
        }
        key.truncate(key_length_bytes);
        key
    }

    /// Run the complete BB84 exchange for a key of `key_length_bits`
    ///
    /// Oversamples the raw transmission by [`OVERSAMPLING_FACTOR`],
    /// sifts, sacrifices a tenth of the sifted bits for QBER estimation
    /// and amplifies the remainder into the final key. A QBER above the
    /// threshold aborts the exchange entirely; no partial or degraded
    /// key is ever returned.
    ///
    /// Returns the key bytes and a key identifier derived from a
    /// truncated hash of the key material. Identifier collisions are
    /// treated as practically impossible and are not separately checked.
    ///
    /// # Errors
    ///
    /// * [`CryptoError::InvalidParameter`] if `key_length_bits` is zero
    ///   or not a multiple of eight
    /// * [`CryptoError::QkdError`] if the estimated QBER exceeds the
    ///   threshold or too few bits survive sifting
    pub fn generate_quantum_key(&self, key_length_bits: usize) -> CryptoResult<(Vec<u8>, String)> {
        if key_length_bits == 0 || key_length_bits % 8 != 0 {
            return Err(CryptoError::invalid_parameter(
                "key_length_bits",
                "a positive multiple of 8",
                &key_length_bits.to_string(),
            ));
        }

        let transmission_length = key_length_bits * OVERSAMPLING_FACTOR;

        let alice_bits = self.generate_random_bits(transmission_length);
        let alice_bases = self.generate_random_bases(transmission_length);

        let (bob_bits, bob_bases) = self.simulate_quantum_channel(&alice_bits, &alice_bases);

        let (alice_sifted, bob_sifted) =
            self.sift_key(&alice_bits, &alice_bases, &bob_bits, &bob_bases);

        let sample_size = (alice_sifted.len() / 10).max(1).min(alice_sifted.len());
        let qber = self.estimate_error_rate(&alice_sifted, &bob_sifted, sample_size)?;

        if qber > self.qber_threshold {
            return Err(CryptoError::qkd_error(
                "generate_quantum_key",
                &format!(
                    "QBER {:.4} exceeds threshold {:.4}; possible eavesdropping",
                    qber, self.qber_threshold
                ),
                error_codes::QKD_QBER_ABOVE_THRESHOLD,
            ));
        }

        // The disclosed sample is discarded before amplification
        let remaining = &alice_sifted[sample_size..];
        if remaining.len() < key_length_bits {
            return Err(CryptoError::qkd_error(
                "generate_quantum_key",
                &format!(
                    "only {} sifted bits remain for a {}-bit key",
                    remaining.len(),
                    key_length_bits
                ),
                error_codes::QKD_INSUFFICIENT_SIFTED_BITS,
            ));
        }

        let key = self.privacy_amplification(remaining, key_length_bits);
        let key_id = derive_key_id(&key);

        log::debug!(
            "BB84 exchange complete: {} raw bits, {} sifted, QBER {:.4}, key {}",
            transmission_length,
            alice_sifted.len(),
            qber,
            key_id
        );

        Ok((key, key_id))
    }
}

/// Derive a stable key identifier from key material
///
/// First 16 hex characters of SHA-256 over the key bytes.
pub(crate) fn derive_key_id(key: &[u8]) -> String {
    let digest = Sha256::digest(key);
    hex::encode(digest)[..16].to_string()
}
