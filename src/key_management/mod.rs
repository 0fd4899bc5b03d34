/*!
 * Key lifecycle management
 *
 * The authoritative per-party key store. Every key is a single-use (or
 * policy-limited-use) secret with explicit state transitions, lazy
 * expiry and secure destruction. Persistence sits behind the
 * [`KeyRepository`] trait with an in-memory and a file-backed
 * implementation, so the lifecycle logic is tested independently of
 * I/O.
 */

mod entry;
mod manager;
mod repository;

pub use entry::{KeyEntry, KeyEntrySummary, KeyMetadata, KeyPolicy, KeyRole, KeyState};
pub use manager::{local_pair, KeyManager};
pub use repository::{FileKeyRepository, KeyRepository, MemoryKeyRepository};

#[cfg(test)]
mod tests;
