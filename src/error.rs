/*!
 * Error Handling for the QuMail Cryptography Core
 *
 * Provides structured error types with numeric error codes for every
 * subsystem: QKD simulation, key providers, key lifecycle management,
 * and the tiered encryption engine.
 */

use thiserror::Error;

/// Comprehensive error type for all operations in the crate
///
/// The variants map onto the failure taxonomy of the system:
///
/// * [`CryptoError::QkdError`] - BB84 simulation failures, including a
///   quantum bit error rate above the eavesdropping-detection threshold
/// * [`CryptoError::ProviderTransportError`] - network/TLS failures
///   reaching a Key Management Entity
/// * [`CryptoError::ProviderProtocolError`] - well-formed HTTP responses
///   carrying an API-level error, or malformed/undecodable key material
/// * [`CryptoError::KeyPolicyError`] - policy violations such as an OTP
///   key shorter than the plaintext, a key size above the KME's advertised
///   maximum, or a role violation
/// * [`CryptoError::CryptoIntegrityError`] - AEAD authentication failure
///   on decrypt; never conflated with any other decryption failure
///
/// A key that is absent, expired or consumed is *not* an error: lookups
/// return `None` and callers treat it as "key unavailable".
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("QKD failure: {operation} - {cause}")]
    QkdError {
        operation: String,
        cause: String,
        error_code: u32,
    },

    #[error("Provider transport failure: {endpoint} - {cause}")]
    ProviderTransportError {
        endpoint: String,
        cause: String,
        error_code: u32,
    },

    #[error("Provider protocol failure: {operation} - {cause}")]
    ProviderProtocolError {
        operation: String,
        cause: String,
        error_code: u32,
    },

    #[error("Key policy violation: {policy} - {details}")]
    KeyPolicyError {
        policy: String,
        details: String,
        error_code: u32,
    },

    #[error("Key management error: {operation} - {cause}")]
    KeyManagementError {
        operation: String,
        cause: String,
        error_code: u32,
    },

    #[error("Encryption failed: {algorithm} - {cause}")]
    EncryptionError {
        algorithm: String,
        cause: String,
        error_code: u32,
    },

    #[error("Integrity check failed: {algorithm} - {cause}")]
    CryptoIntegrityError {
        algorithm: String,
        cause: String,
        error_code: u32,
    },

    #[error("Invalid parameter: {parameter} - expected {expected}, got {actual}")]
    InvalidParameter {
        parameter: String,
        expected: String,
        actual: String,
        error_code: u32,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Error code constants for different error categories
pub mod error_codes {
    // QKD simulation errors: 1000-1999
    pub const QKD_QBER_ABOVE_THRESHOLD: u32 = 1001;
    pub const QKD_INSUFFICIENT_SIFTED_BITS: u32 = 1002;
    pub const QKD_SAMPLE_TOO_LARGE: u32 = 1003;

    // Provider errors: 2000-2999
    pub const PROVIDER_CONNECTION_FAILED: u32 = 2001;
    pub const PROVIDER_HTTP_ERROR: u32 = 2002;
    pub const PROVIDER_API_ERROR: u32 = 2003;
    pub const PROVIDER_MALFORMED_KEY: u32 = 2004;
    pub const PROVIDER_NO_KEYS_RETURNED: u32 = 2005;
    pub const PROVIDER_TLS_SETUP_FAILED: u32 = 2006;
    pub const PROVIDER_INVALID_RESPONSE: u32 = 2007;

    // Key policy errors: 3000-3999
    pub const POLICY_KEY_TOO_SHORT: u32 = 3001;
    pub const POLICY_KEY_SIZE_EXCEEDED: u32 = 3002;
    pub const POLICY_ROLE_VIOLATION: u32 = 3003;
    pub const POLICY_KEY_STREAM_EMPTY: u32 = 3004;

    // Key management errors: 4000-4999
    pub const KEY_NOT_FOUND: u32 = 4001;
    pub const KEY_STORAGE_FAILED: u32 = 4002;
    pub const KEY_INVALID_ID: u32 = 4003;

    // Encryption engine errors: 5000-5999
    pub const ENCRYPTION_FAILED: u32 = 5001;
    pub const DECRYPTION_AUTH_FAILED: u32 = 5002;
    pub const DECRYPTION_METADATA_INVALID: u32 = 5003;
    pub const DECRYPTION_KEY_UNWRAP_FAILED: u32 = 5004;
}

impl CryptoError {
    /// Get the numeric error code for this error
    pub fn error_code(&self) -> u32 {
        match self {
            CryptoError::QkdError { error_code, .. } => *error_code,
            CryptoError::ProviderTransportError { error_code, .. } => *error_code,
            CryptoError::ProviderProtocolError { error_code, .. } => *error_code,
            CryptoError::KeyPolicyError { error_code, .. } => *error_code,
            CryptoError::KeyManagementError { error_code, .. } => *error_code,
            CryptoError::EncryptionError { error_code, .. } => *error_code,
            CryptoError::CryptoIntegrityError { error_code, .. } => *error_code,
            CryptoError::InvalidParameter { error_code, .. } => *error_code,
            CryptoError::SerializationError(_) => 9001,
            CryptoError::IoError(_) => 9002,
        }
    }

    /// Get the error category as a string
    pub fn error_type(&self) -> &'static str {
        match self {
            CryptoError::QkdError { .. } => "QkdError",
            CryptoError::ProviderTransportError { .. } => "ProviderTransportError",
            CryptoError::ProviderProtocolError { .. } => "ProviderProtocolError",
            CryptoError::KeyPolicyError { .. } => "KeyPolicyError",
            CryptoError::KeyManagementError { .. } => "KeyManagementError",
            CryptoError::EncryptionError { .. } => "EncryptionError",
            CryptoError::CryptoIntegrityError { .. } => "CryptoIntegrityError",
            CryptoError::InvalidParameter { .. } => "InvalidParameter",
            CryptoError::SerializationError(_) => "SerializationError",
            CryptoError::IoError(_) => "IoError",
        }
    }
}

/// Convenience constructors for common error types
impl CryptoError {
    pub fn qkd_error(operation: &str, cause: &str, error_code: u32) -> Self {
        CryptoError::QkdError {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn transport_error(endpoint: &str, cause: &str, error_code: u32) -> Self {
        CryptoError::ProviderTransportError {
            endpoint: endpoint.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn protocol_error(operation: &str, cause: &str, error_code: u32) -> Self {
        CryptoError::ProviderProtocolError {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn policy_error(policy: &str, details: &str, error_code: u32) -> Self {
        CryptoError::KeyPolicyError {
            policy: policy.to_string(),
            details: details.to_string(),
            error_code,
        }
    }

    pub fn key_management_error(operation: &str, cause: &str, error_code: u32) -> Self {
        CryptoError::KeyManagementError {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn encryption_error(algorithm: &str, cause: &str) -> Self {
        CryptoError::EncryptionError {
            algorithm: algorithm.to_string(),
            cause: cause.to_string(),
            error_code: error_codes::ENCRYPTION_FAILED,
        }
    }

    pub fn decryption_error(algorithm: &str, cause: &str, error_code: u32) -> Self {
        CryptoError::EncryptionError {
            algorithm: algorithm.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn integrity_error(algorithm: &str, cause: &str) -> Self {
        CryptoError::CryptoIntegrityError {
            algorithm: algorithm.to_string(),
            cause: cause.to_string(),
            error_code: error_codes::DECRYPTION_AUTH_FAILED,
        }
    }

    pub fn invalid_parameter(parameter: &str, expected: &str, actual: &str) -> Self {
        CryptoError::InvalidParameter {
            parameter: parameter.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
            error_code: 9999,
        }
    }
}

impl From<std::io::Error> for CryptoError {
    fn from(err: std::io::Error) -> Self {
        CryptoError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for CryptoError {
    fn from(err: serde_json::Error) -> Self {
        CryptoError::SerializationError(err.to_string())
    }
}

/// Result type alias for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;
