use proptest::prelude::*;
use rand::rngs::OsRng;
use rsa::{RsaPrivateKey, RsaPublicKey};

use super::*;
use crate::error::error_codes;
use crate::utils;

fn engine() -> EncryptionEngine {
    EncryptionEngine::new()
}

fn rsa_keypair() -> (RsaPrivateKey, RsaPublicKey) {
    let private = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
    let public = RsaPublicKey::from(&private);
    (private, public)
}

#[test]
fn test_basic_otp_known_vector() {
    let key = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
    let (ciphertext, metadata) = engine()
        .encrypt(b"HELLO", &key, SecurityLevel::Basic, None)
        .unwrap();

    // "HELLO" = 48 45 4c 4c 4f, XORed with 00 01 02 03 04
    assert_eq!(hex::encode(&ciphertext), "48444e4f4b");
    assert_eq!(metadata, EnvelopeMetadata::Basic { key_length: 5 });

    let plaintext = engine().decrypt(&ciphertext, &key, &metadata, None).unwrap();
    assert_eq!(plaintext, b"HELLO");
}

#[test]
fn test_basic_rejects_short_key() {
    let key = utils::random_bytes(4);
    let err = engine()
        .encrypt(b"longer than the key", &key, SecurityLevel::Basic, None)
        .unwrap_err();
    assert_eq!(err.error_code(), error_codes::POLICY_KEY_TOO_SHORT);
    assert_eq!(err.error_type(), "KeyPolicyError");
}

#[test]
fn test_basic_metadata_length_mismatch_is_decryption_error() {
    let key = utils::random_bytes(16);
    let (ciphertext, _) = engine()
        .encrypt(b"HELLO", &key, SecurityLevel::Basic, None)
        .unwrap();

    let wrong = EnvelopeMetadata::Basic { key_length: 3 };
    let err = engine().decrypt(&ciphertext, &key, &wrong, None).unwrap_err();
    assert_eq!(err.error_code(), error_codes::DECRYPTION_METADATA_INVALID);
}

#[test]
fn test_standard_round_trip() {
    let key = utils::random_bytes(32);
    let (ciphertext, metadata) = engine()
        .encrypt(b"standard message", &key, SecurityLevel::Standard, None)
        .unwrap();

    match &metadata {
        EnvelopeMetadata::Standard { nonce } => assert_eq!(nonce.len(), 24),
        other => panic!("unexpected metadata {:?}", other),
    }
    assert_ne!(ciphertext, b"standard message".to_vec());

    let plaintext = engine().decrypt(&ciphertext, &key, &metadata, None).unwrap();
    assert_eq!(plaintext, b"standard message");
}

#[test]
fn test_standard_tamper_is_integrity_error() {
    let key = utils::random_bytes(32);
    let (mut ciphertext, metadata) = engine()
        .encrypt(b"standard message", &key, SecurityLevel::Standard, None)
        .unwrap();
    ciphertext[0] ^= 0x01;

    let err = engine()
        .decrypt(&ciphertext, &key, &metadata, None)
        .unwrap_err();
    assert_eq!(err.error_type(), "CryptoIntegrityError");
    assert_eq!(err.error_code(), error_codes::DECRYPTION_AUTH_FAILED);
}

#[test]
fn test_standard_wrong_key_is_integrity_error() {
    let key = utils::random_bytes(32);
    let (ciphertext, metadata) = engine()
        .encrypt(b"standard message", &key, SecurityLevel::Standard, None)
        .unwrap();

    let other_key = utils::random_bytes(32);
    let err = engine()
        .decrypt(&ciphertext, &other_key, &metadata, None)
        .unwrap_err();
    assert_eq!(err.error_type(), "CryptoIntegrityError");
}

#[test]
fn test_high_round_trip_with_key_mixing() {
    let key = utils::random_bytes(32);
    let (ciphertext, metadata) = engine()
        .encrypt(b"high tier message", &key, SecurityLevel::High, None)
        .unwrap();

    match &metadata {
        EnvelopeMetadata::High { key_mixing, .. } => assert!(key_mixing),
        other => panic!("unexpected metadata {:?}", other),
    }

    let plaintext = engine().decrypt(&ciphertext, &key, &metadata, None).unwrap();
    assert_eq!(plaintext, b"high tier message");
}

#[test]
fn test_high_tamper_is_integrity_error() {
    let key = utils::random_bytes(32);
    let (mut ciphertext, metadata) = engine()
        .encrypt(b"high tier message", &key, SecurityLevel::High, None)
        .unwrap();
    let last = ciphertext.len() - 1;
    ciphertext[last] ^= 0x80;

    let err = engine()
        .decrypt(&ciphertext, &key, &metadata, None)
        .unwrap_err();
    assert_eq!(err.error_type(), "CryptoIntegrityError");
}

#[test]
fn test_maximum_wrapped_round_trip() {
    let (private, public) = rsa_keypair();
    let key = utils::random_bytes(32);
    let (ciphertext, metadata) = engine()
        .encrypt(b"top secret", &key, SecurityLevel::Maximum, Some(&public))
        .unwrap();

    match &metadata {
        EnvelopeMetadata::Maximum {
            wrapped_key,
            derived_fallback,
            ..
        } => {
            assert!(wrapped_key.is_some());
            assert!(!derived_fallback);
        }
        other => panic!("unexpected metadata {:?}", other),
    }

    let plaintext = engine()
        .decrypt(&ciphertext, &key, &metadata, Some(&private))
        .unwrap();
    assert_eq!(plaintext, b"top secret");
}

#[test]
fn test_maximum_wrapped_requires_private_key() {
    let (_, public) = rsa_keypair();
    let key = utils::random_bytes(32);
    let (ciphertext, metadata) = engine()
        .encrypt(b"top secret", &key, SecurityLevel::Maximum, Some(&public))
        .unwrap();

    let err = engine()
        .decrypt(&ciphertext, &key, &metadata, None)
        .unwrap_err();
    assert_eq!(err.error_code(), error_codes::DECRYPTION_KEY_UNWRAP_FAILED);
}

#[test]
fn test_maximum_wrong_private_key_is_unwrap_failure() {
    let (_, public) = rsa_keypair();
    let (other_private, _) = rsa_keypair();
    let key = utils::random_bytes(32);
    let (ciphertext, metadata) = engine()
        .encrypt(b"top secret", &key, SecurityLevel::Maximum, Some(&public))
        .unwrap();

    let err = engine()
        .decrypt(&ciphertext, &key, &metadata, Some(&other_private))
        .unwrap_err();
    assert_eq!(err.error_code(), error_codes::DECRYPTION_KEY_UNWRAP_FAILED);
}

#[test]
fn test_maximum_fallback_round_trip_without_rsa() {
    let key = utils::random_bytes(32);
    let (ciphertext, metadata) = engine()
        .encrypt(b"top secret", &key, SecurityLevel::Maximum, None)
        .unwrap();

    match &metadata {
        EnvelopeMetadata::Maximum {
            wrapped_key,
            derived_fallback,
            ..
        } => {
            assert!(wrapped_key.is_none());
            assert!(derived_fallback);
        }
        other => panic!("unexpected metadata {:?}", other),
    }

    // No private key needed: the receiver re-derives the ephemeral
    let plaintext = engine().decrypt(&ciphertext, &key, &metadata, None).unwrap();
    assert_eq!(plaintext, b"top secret");
}

#[test]
fn test_maximum_inconsistent_metadata_is_rejected() {
    let key = utils::random_bytes(32);
    let metadata = EnvelopeMetadata::Maximum {
        nonce: hex::encode([0u8; 12]),
        wrapped_key: None,
        derived_fallback: false,
    };

    let err = engine().decrypt(&[1, 2, 3], &key, &metadata, None).unwrap_err();
    assert_eq!(err.error_code(), error_codes::DECRYPTION_METADATA_INVALID);
}

#[test]
fn test_malformed_nonce_is_metadata_error() {
    let key = utils::random_bytes(32);
    let (ciphertext, _) = engine()
        .encrypt(b"msg", &key, SecurityLevel::Standard, None)
        .unwrap();

    for bad_nonce in ["zz-not-hex", "00ff"] {
        let metadata = EnvelopeMetadata::Standard {
            nonce: bad_nonce.to_string(),
        };
        let err = engine()
            .decrypt(&ciphertext, &key, &metadata, None)
            .unwrap_err();
        assert_eq!(err.error_code(), error_codes::DECRYPTION_METADATA_INVALID);
    }
}

#[test]
fn test_security_level_ordinals() {
    for ordinal in 1u8..=4 {
        let level = SecurityLevel::try_from(ordinal).unwrap();
        assert_eq!(level.ordinal(), ordinal);
    }
    assert!(SecurityLevel::try_from(0).is_err());
    assert!(SecurityLevel::try_from(5).is_err());
}

#[test]
fn test_package_json_round_trip() {
    let key = utils::random_bytes(32);
    let (ciphertext, metadata) = engine()
        .encrypt(b"payload", &key, SecurityLevel::High, None)
        .unwrap();
    let package = EncryptedPackage::new("alice", "key-1", ciphertext, metadata);

    let json = package.to_json().unwrap();
    assert!(json.contains(r#""security_level":"high""#));

    let restored = EncryptedPackage::from_json(&json).unwrap();
    assert_eq!(restored.version, PACKAGE_VERSION);
    assert_eq!(restored.sender_id, "alice");
    assert_eq!(restored.key_id, "key-1");
    assert_eq!(restored.ciphertext, package.ciphertext);
    assert_eq!(restored.metadata, package.metadata);
}

#[test]
fn test_derive_key_is_deterministic() {
    let input = utils::random_bytes(16);
    let a = kdf::derive_key(&input, 32).unwrap();
    let b = kdf::derive_key(&input, 32).unwrap();
    assert_eq!(&*a, &*b);
    assert_eq!(a.len(), 32);
}

#[test]
fn test_mix_keys_depends_on_both_inputs() {
    let a = utils::random_bytes(32);
    let b = utils::random_bytes(32);
    let c = utils::random_bytes(32);

    let mixed_ab = kdf::mix_keys(&a, &b);
    assert_eq!(mixed_ab.len(), 32);
    assert_ne!(&*mixed_ab, &*kdf::mix_keys(&a, &c));
    assert_eq!(&*mixed_ab, &*kdf::mix_keys(&a, &b));
}

proptest! {
    #[test]
    fn prop_basic_otp_round_trips(plaintext in proptest::collection::vec(any::<u8>(), 0..256)) {
        let key = utils::random_bytes(plaintext.len());
        let (ciphertext, metadata) = engine()
            .encrypt(&plaintext, &key, SecurityLevel::Basic, None)
            .unwrap();
        let recovered = engine().decrypt(&ciphertext, &key, &metadata, None).unwrap();
        prop_assert_eq!(recovered, plaintext);
    }

    #[test]
    fn prop_aead_levels_round_trip(
        plaintext in proptest::collection::vec(any::<u8>(), 0..256),
        level in prop_oneof![
            Just(SecurityLevel::Standard),
            Just(SecurityLevel::High),
        ],
    ) {
        let key = utils::random_bytes(32);
        let (ciphertext, metadata) = engine()
            .encrypt(&plaintext, &key, level, None)
            .unwrap();
        let recovered = engine().decrypt(&ciphertext, &key, &metadata, None).unwrap();
        prop_assert_eq!(recovered, plaintext);
    }
}
