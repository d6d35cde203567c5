//! Error types for the envelope core and the backup protocol.

use core::fmt;

// ---------------------------------------------------------------------------
// Core cryptographic error
// ---------------------------------------------------------------------------

/// Failure of a core cryptographic operation.
///
/// Variants carry no detail. Every decrypt-side failure collapses into
/// `AuthenticationFailure` so callers cannot tell a bad tag from a wrong key,
/// nonce or AAD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// Wrong-length key or nonce, public key bytes that are not a usable RSA
    /// SPKI, or input past the GCM size limit.
    InvalidKeyMaterial,
    /// GCM tag did not verify.
    AuthenticationFailure,
    /// Malformed Base64 input.
    Encoding,
    /// The random source or a primitive was unavailable.
    ProviderFailure,
}

impl CryptoError {
    /// Only provider failures (e.g. entropy exhaustion) are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderFailure)
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKeyMaterial => write!(f, "invalid key material"),
            Self::AuthenticationFailure => write!(f, "decryption failed"),
            Self::Encoding => write!(f, "encoding error"),
            Self::ProviderFailure => write!(f, "crypto provider failure"),
        }
    }
}

impl std::error::Error for CryptoError {}

// ---------------------------------------------------------------------------
// Backup protocol error
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum BackupError {
    Crypto(CryptoError),
    InputTooLarge { len: usize, limit: usize },
    UnknownKeyVersion(String),
    RecordNotFound(String),
    Api(String),
    Storage(String),
    Busy,
}

impl fmt::Display for BackupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crypto(e) => write!(f, "crypto: {}", e),
            Self::InputTooLarge { len, limit } => {
                write!(f, "input too large: {} bytes (limit {})", len, limit)
            }
            Self::UnknownKeyVersion(v) => write!(f, "unknown key version: {}", v),
            Self::RecordNotFound(user) => write!(f, "no backup record for user: {}", user),
            Self::Api(msg) => write!(f, "backup api error: {}", msg),
            Self::Storage(msg) => write!(f, "storage error: {}", msg),
            Self::Busy => write!(f, "another operation is in flight"),
        }
    }
}

impl std::error::Error for BackupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Crypto(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CryptoError> for BackupError {
    fn from(e: CryptoError) -> Self {
        Self::Crypto(e)
    }
}

impl BackupError {
    /// The underlying crypto error, if any.
    pub fn crypto(&self) -> Option<CryptoError> {
        match self {
            Self::Crypto(e) => Some(*e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_provider_failure_is_retryable() {
        assert!(CryptoError::ProviderFailure.is_retryable());
        assert!(!CryptoError::AuthenticationFailure.is_retryable());
        assert!(!CryptoError::InvalidKeyMaterial.is_retryable());
        assert!(!CryptoError::Encoding.is_retryable());
    }

    #[test]
    fn backup_error_wraps_crypto_error() {
        let e: BackupError = CryptoError::AuthenticationFailure.into();
        assert_eq!(e.crypto(), Some(CryptoError::AuthenticationFailure));
        assert_eq!(e.to_string(), "crypto: decryption failed");
    }
}
