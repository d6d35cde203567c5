//! AEAD: AES-256-GCM
//!
//! blob = ciphertext || tag[16]
//!
//! The nonce is supplied by the caller so it can be stored next to the blob.
//! No internal randomness on the encrypt path: identical inputs give
//! identical output.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm,
};
use getrandom::getrandom;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::keys::{Dek, Nonce};
use crate::wire::{AEAD_TAG_BYTES, DEK_BYTES, GCM_MAX_PLAINTEXT_BYTES, NONCE_BYTES};

/// Generate a fresh DEK from the OS random source.
pub fn generate_key() -> Result<Dek, CryptoError> {
    let mut raw = Zeroizing::new([0u8; DEK_BYTES]);
    getrandom(&mut raw[..]).map_err(|e| {
        tracing::error!(error = %e, "entropy source unavailable for key generation");
        CryptoError::ProviderFailure
    })?;
    Ok(Dek::from_bytes(*raw))
}

/// Generate a random 12-byte nonce.
pub fn generate_nonce() -> Result<Nonce, CryptoError> {
    let mut n = [0u8; NONCE_BYTES];
    getrandom(&mut n).map_err(|e| {
        tracing::error!(error = %e, "entropy source unavailable for nonce generation");
        CryptoError::ProviderFailure
    })?;
    Ok(Nonce::from_bytes(n))
}

/// AEAD seal. Absent AAD and empty AAD are the same thing to GCM.
pub fn encrypt(
    key: &Dek,
    nonce: &Nonce,
    plaintext: &[u8],
    aad: Option<&[u8]>,
) -> Result<Vec<u8>, CryptoError> {
    let aad = aad.unwrap_or_default();
    check_input_len(plaintext.len() as u64, aad.len() as u64)?;

    let cipher = Aes256Gcm::new_from_slice(key.expose_secret())
        .map_err(|_| CryptoError::InvalidKeyMaterial)?;
    let n = aes_gcm::Nonce::from_slice(nonce.as_bytes());
    let payload = Payload { msg: plaintext, aad };
    cipher.encrypt(n, payload).map_err(|_| CryptoError::InvalidKeyMaterial)
}

// GCM per-message limits. Exceeding them is permanent, not a provider failure.
fn check_input_len(plaintext_len: u64, aad_len: u64) -> Result<(), CryptoError> {
    if plaintext_len > GCM_MAX_PLAINTEXT_BYTES || aad_len > GCM_MAX_PLAINTEXT_BYTES {
        tracing::debug!(plaintext_len, aad_len, "input exceeds gcm limit");
        return Err(CryptoError::InvalidKeyMaterial);
    }
    Ok(())
}

/// AEAD open. The tag is checked before any plaintext is returned.
pub fn decrypt(
    key: &Dek,
    nonce: &Nonce,
    blob: &[u8],
    aad: Option<&[u8]>,
) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < AEAD_TAG_BYTES {
        tracing::debug!(len = blob.len(), "blob shorter than tag");
        return Err(CryptoError::AuthenticationFailure);
    }
    let cipher = Aes256Gcm::new_from_slice(key.expose_secret())
        .map_err(|_| CryptoError::AuthenticationFailure)?;
    let n = aes_gcm::Nonce::from_slice(nonce.as_bytes());
    let payload = Payload {
        msg: blob,
        aad: aad.unwrap_or_default(),
    };
    cipher.decrypt(n, payload).map_err(|_| {
        tracing::debug!(len = blob.len(), has_aad = aad.is_some(), "tag verification failed");
        CryptoError::AuthenticationFailure
    })
}
