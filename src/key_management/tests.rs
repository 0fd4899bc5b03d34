use std::thread;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tempfile::tempdir;

use super::*;
use crate::error::error_codes;

fn test_metadata(peer: &str) -> KeyMetadata {
    KeyMetadata {
        peer_id: peer.to_string(),
        role: KeyRole::Master,
        source: "local-bb84".to_string(),
        standard: None,
    }
}

fn manager_with_policy(policy: KeyPolicy) -> KeyManager {
    KeyManager::new(
        "alice",
        Box::new(crate::provider::LocalQkdProvider::standalone("alice")),
        Box::new(MemoryKeyRepository::new()),
        policy,
    )
}

#[test]
fn test_request_and_get_round_trip() {
    let manager = KeyManager::in_memory("alice");
    let (key_id, key) = manager.request_quantum_key("bob", 256).unwrap();

    assert_eq!(key.len(), 32);
    let fetched = manager.get_key(&key_id).unwrap().unwrap();
    assert_eq!(&*fetched, &*key);
}

#[test]
fn test_store_is_idempotent_on_key_id() {
    let manager = KeyManager::in_memory("alice");
    assert!(manager
        .store_key("key-1", &[1, 2, 3, 4], test_metadata("bob"))
        .unwrap());
    // Second store with different material must not overwrite
    assert!(!manager
        .store_key("key-1", &[9, 9, 9, 9], test_metadata("bob"))
        .unwrap());

    let fetched = manager.get_key("key-1").unwrap().unwrap();
    assert_eq!(&*fetched, &[1, 2, 3, 4]);
}

#[test]
fn test_key_consumed_after_max_usage() {
    let manager = manager_with_policy(KeyPolicy::new(Duration::hours(1), Some(2)));
    manager
        .store_key("key-1", &[7; 32], test_metadata("bob"))
        .unwrap();

    assert!(manager.get_key("key-1").unwrap().is_some());
    assert!(manager.get_key("key-1").unwrap().is_some());
    // Third retrieval misses: the key is consumed, not an error
    assert!(manager.get_key("key-1").unwrap().is_none());

    let summaries = manager.list_keys().unwrap();
    assert_eq!(summaries[0].state, KeyState::Consumed);
    assert_eq!(summaries[0].usage_count, 2);
}

#[test]
fn test_unlimited_usage_policy() {
    let manager = manager_with_policy(KeyPolicy::new(Duration::hours(1), None));
    manager
        .store_key("key-1", &[7; 32], test_metadata("bob"))
        .unwrap();

    for _ in 0..10 {
        assert!(manager.get_key("key-1").unwrap().is_some());
    }
}

#[test]
fn test_expired_key_misses_and_transitions() {
    let manager = manager_with_policy(KeyPolicy::new(Duration::milliseconds(30), Some(2)));
    manager
        .store_key("key-1", &[7; 32], test_metadata("bob"))
        .unwrap();

    thread::sleep(StdDuration::from_millis(60));
    assert!(manager.get_key("key-1").unwrap().is_none());

    let summaries = manager.list_keys().unwrap();
    assert_eq!(summaries[0].state, KeyState::Expired);
}

#[test]
fn test_cleanup_removes_only_inactive_keys() {
    let manager = manager_with_policy(KeyPolicy::new(Duration::milliseconds(30), Some(1)));
    manager
        .store_key("stale", &[1; 32], test_metadata("bob"))
        .unwrap();
    manager
        .store_key("used", &[2; 32], test_metadata("bob"))
        .unwrap();
    manager.get_key("used").unwrap().unwrap();

    thread::sleep(StdDuration::from_millis(60));
    // Stored after the sleep, so still fresh
    let long_lived = manager_with_policy(KeyPolicy::default());
    long_lived
        .store_key("fresh", &[3; 32], test_metadata("bob"))
        .unwrap();

    assert_eq!(manager.cleanup_expired_keys().unwrap(), 2);
    assert!(manager.list_keys().unwrap().is_empty());
    assert_eq!(long_lived.cleanup_expired_keys().unwrap(), 0);
    assert_eq!(long_lived.list_keys().unwrap().len(), 1);
}

#[test]
fn test_delete_key_reports_presence() {
    let manager = KeyManager::in_memory("alice");
    manager
        .store_key("key-1", &[7; 16], test_metadata("bob"))
        .unwrap();

    assert!(manager.delete_key("key-1").unwrap());
    assert!(!manager.delete_key("key-1").unwrap());
    assert!(manager.get_key("key-1").unwrap().is_none());
}

#[test]
fn test_unknown_key_is_a_miss_not_an_error() {
    let manager = KeyManager::in_memory("alice");
    assert!(manager.get_key("never-stored").unwrap().is_none());
}

#[test]
fn test_file_repository_survives_reopen() {
    let dir = tempdir().unwrap();

    {
        let mut repo = FileKeyRepository::new(dir.path()).unwrap();
        let mut entry = KeyEntry::new(
            "persisted",
            vec![5; 32],
            &KeyPolicy::default(),
            test_metadata("bob"),
        );
        entry.usage_count = 1;
        assert!(repo.insert(&entry).unwrap());
    }

    let mut reopened = FileKeyRepository::new(dir.path()).unwrap();
    let entry = reopened.load("persisted").unwrap().unwrap();
    assert_eq!(entry.key_bytes, vec![5; 32]);
    assert_eq!(entry.usage_count, 1);
    assert_eq!(entry.state, KeyState::Active);
    assert_eq!(reopened.key_ids().unwrap(), vec!["persisted".to_string()]);
}

#[test]
fn test_file_repository_remove_unlinks_file() {
    let dir = tempdir().unwrap();
    let mut repo = FileKeyRepository::new(dir.path()).unwrap();
    let entry = KeyEntry::new(
        "doomed",
        vec![5; 32],
        &KeyPolicy::default(),
        test_metadata("bob"),
    );
    repo.insert(&entry).unwrap();

    let path = dir.path().join("doomed.json");
    assert!(path.exists());
    assert!(repo.remove("doomed").unwrap());
    assert!(!path.exists());
    assert!(repo.load("doomed").unwrap().is_none());
}

#[test]
fn test_file_repository_rejects_hostile_key_id() {
    let dir = tempdir().unwrap();
    let mut repo = FileKeyRepository::new(dir.path()).unwrap();

    let err = repo.load("../../etc/passwd").unwrap_err();
    assert_eq!(err.error_code(), error_codes::KEY_INVALID_ID);
}

#[test]
fn test_file_backed_manager_full_lifecycle() {
    let dir = tempdir().unwrap();
    let manager = KeyManager::new(
        "alice",
        Box::new(crate::provider::LocalQkdProvider::standalone("alice")),
        Box::new(FileKeyRepository::new(dir.path()).unwrap()),
        KeyPolicy::new(Duration::hours(1), Some(2)),
    );

    let (key_id, key) = manager.request_quantum_key("bob", 128).unwrap();
    let fetched = manager.get_key(&key_id).unwrap().unwrap();
    assert_eq!(&*fetched, &*key);

    manager.get_key(&key_id).unwrap().unwrap();
    assert!(manager.get_key(&key_id).unwrap().is_none());
    assert_eq!(manager.cleanup_expired_keys().unwrap(), 1);
}

#[test]
fn test_local_pair_shares_keys_between_parties() {
    let (alice, bob) = local_pair("alice", "bob", KeyPolicy::interactive());

    let (key_id, alice_key) = alice.request_quantum_key("bob", 256).unwrap();
    let bob_key = bob.retrieve_quantum_key("alice", &key_id).unwrap();
    assert_eq!(&*alice_key, &*bob_key);

    let summaries = bob.list_keys().unwrap();
    assert_eq!(summaries[0].metadata.role, KeyRole::Slave);
    assert_eq!(summaries[0].metadata.peer_id, "alice");
}

#[test]
fn test_successive_keys_get_distinct_ids() {
    let manager = KeyManager::in_memory("alice");
    let (id_a, _) = manager.request_quantum_key("bob", 128).unwrap();
    let (id_b, _) = manager.request_quantum_key("bob", 128).unwrap();
    assert_ne!(id_a, id_b);
}
