//! Sizes, suite labels and persisted field names.
//!
//! Ciphertext blob (AES-256-GCM):
//!   ciphertext[len(plaintext)] || tag[16]
//!
//! Wrapped DEK (RSA-OAEP, SHA-256, MGF1-SHA-256, empty label):
//!   rsa_ct[modulus_bytes]      (256 bytes for RSA-2048)
//!
//! Local record schema (one entry per user):
//!   key_version, iv_b64, ct_b64, wrapped_dek_b64 [, aad_b64]

// ---------------------------------------------------------------------------
// Component sizes
// ---------------------------------------------------------------------------

/// AES-256 data encryption key.
pub const DEK_BYTES: usize = 32;

/// GCM nonce (96 bits).
pub const NONCE_BYTES: usize = 12;

/// GCM authentication tag (128 bits).
pub const AEAD_TAG_BYTES: usize = 16;

/// Smallest RSA modulus accepted for wrapping.
pub const MIN_RSA_MODULUS_BITS: usize = 2048;

/// Largest RSA modulus accepted for wrapping.
pub const MAX_RSA_MODULUS_BITS: usize = 16384;

/// GCM per-message plaintext limit (2^36 - 32 bytes).
pub const GCM_MAX_PLAINTEXT_BYTES: u64 = (1 << 36) - 32;

// ---------------------------------------------------------------------------
// Suite labels
// ---------------------------------------------------------------------------

pub const SUITE_AEAD: &str = "AES-256-GCM";
pub const SUITE_WRAP: &str = "RSA-OAEP-SHA256-MGF1SHA256";

/// Length of the blob produced by encrypting `plaintext_len` bytes.
#[inline]
pub const fn blob_len(plaintext_len: usize) -> usize {
    plaintext_len + AEAD_TAG_BYTES
}
