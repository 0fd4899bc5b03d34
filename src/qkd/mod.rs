/*!
 * BB84 Quantum Key Distribution simulation
 *
 * This module implements a logical BB84 exchange: random bit/basis
 * generation, a simulated quantum channel with a tunable error rate,
 * basis sifting, QBER estimation and privacy amplification. There is no
 * photon-level physics here; the simulation reproduces the statistical
 * shape of the protocol so the rest of the system can be exercised
 * without QKD hardware.
 */

mod channel;
mod simulator;

pub use channel::LocalKeyChannel;
pub use simulator::{Basis, QkdSimulator, DEFAULT_QBER_THRESHOLD, OVERSAMPLING_FACTOR};
