//! Key material: data encryption keys, nonces, server key versions.
//!
//! A `Dek` only exists in memory. It is zeroized on drop, never printed, and
//! compared in constant time. Persisted forms always go through `wrap`.

use core::fmt;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::wire::{DEK_BYTES, NONCE_BYTES};

// ---------------------------------------------------------------------------
// Data encryption key
// ---------------------------------------------------------------------------

/// 256-bit AES data encryption key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Dek([u8; DEK_BYTES]);

impl Dek {
    /// Wrap raw bytes. The caller's copy is not cleared.
    pub fn from_bytes(bytes: [u8; DEK_BYTES]) -> Self {
        Self(bytes)
    }

    /// Rebuild a key from an unwrap response or other untyped source.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let raw: [u8; DEK_BYTES] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyMaterial)?;
        Ok(Self(raw))
    }

    /// Raw key bytes. Only the AEAD and wrap paths should need this.
    pub fn expose_secret(&self) -> &[u8; DEK_BYTES] {
        &self.0
    }
}

impl fmt::Debug for Dek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Dek([REDACTED])")
    }
}

impl PartialEq for Dek {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for Dek {}

// ---------------------------------------------------------------------------
// Nonce
// ---------------------------------------------------------------------------

/// 96-bit GCM nonce. Never reuse one with the same key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_BYTES]);

impl Nonce {
    pub fn from_bytes(bytes: [u8; NONCE_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let raw: [u8; NONCE_BYTES] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyMaterial)?;
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_BYTES] {
        &self.0
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce(")?;
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

// ---------------------------------------------------------------------------
// Server key version
// ---------------------------------------------------------------------------

/// Identifies which server keypair wrapped a DEK (e.g. `rsa-2024-10`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyVersion(String);

impl KeyVersion {
    pub fn new(v: impl Into<String>) -> Self {
        Self(v.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Key handle capability
// ---------------------------------------------------------------------------

/// Something that can run AES-GCM without handing out its key bytes.
///
/// `Dek` is the software implementation. A hardware-backed key (platform
/// keystore, secure enclave) implements the same two methods and keeps the
/// key non-extractable.
pub trait KeyHandle {
    fn seal(
        &self,
        nonce: &Nonce,
        plaintext: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<Vec<u8>, CryptoError>;

    fn open(
        &self,
        nonce: &Nonce,
        blob: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<Vec<u8>, CryptoError>;
}

impl KeyHandle for Dek {
    fn seal(
        &self,
        nonce: &Nonce,
        plaintext: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<Vec<u8>, CryptoError> {
        crate::aead::encrypt(self, nonce, plaintext, aad)
    }

    fn open(
        &self,
        nonce: &Nonce,
        blob: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<Vec<u8>, CryptoError> {
        crate::aead::decrypt(self, nonce, blob, aad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dek_debug_is_redacted() {
        let dek = Dek::from_bytes([0x41; DEK_BYTES]);
        let shown = format!("{:?}", dek);
        assert_eq!(shown, "Dek([REDACTED])");
        assert!(!shown.contains("41"));
    }

    #[test]
    fn dek_from_slice_checks_length() {
        assert!(Dek::from_slice(&[0u8; 32]).is_ok());
        assert_eq!(Dek::from_slice(&[0u8; 16]), Err(CryptoError::InvalidKeyMaterial));
        assert_eq!(Dek::from_slice(&[0u8; 33]), Err(CryptoError::InvalidKeyMaterial));
        assert_eq!(Dek::from_slice(&[]), Err(CryptoError::InvalidKeyMaterial));
    }

    #[test]
    fn dek_equality() {
        let a = Dek::from_bytes([1; DEK_BYTES]);
        let b = Dek::from_bytes([1; DEK_BYTES]);
        let c = Dek::from_bytes([2; DEK_BYTES]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn nonce_from_slice_checks_length() {
        assert!(Nonce::from_slice(&[0u8; 12]).is_ok());
        assert_eq!(Nonce::from_slice(&[0u8; 8]), Err(CryptoError::InvalidKeyMaterial));
    }

    #[test]
    fn nonce_debug_is_hex() {
        let n = Nonce::from_bytes([0xab; NONCE_BYTES]);
        assert_eq!(format!("{:?}", n), "Nonce(abababababababababababab)");
    }

    #[test]
    fn key_version_serializes_as_plain_string() {
        let v = KeyVersion::new("rsa-2024-10");
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"rsa-2024-10\"");
        assert_eq!(v.to_string(), "rsa-2024-10");
    }
}
