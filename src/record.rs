//! Backup record: the unit stored locally and uploaded for recovery.
//!
//! JSON shape:
//! ```text
//! {
//!   "user_id": "...",
//!   "key_version": "rsa-2024-10",
//!   "iv_b64": "...",            12-byte nonce
//!   "ct_b64": "...",            ciphertext || tag
//!   "wrapped_dek_b64": "...",   RSA-OAEP(dek)
//!   "aad_b64": "..."            optional
//! }
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::encoding::{from_base64, to_base64};
use crate::error::CryptoError;
use crate::keys::{KeyVersion, Nonce};
use crate::wire::{AEAD_TAG_BYTES, SUITE_AEAD, SUITE_WRAP};
use crate::wrap::WrappedDek;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub user_id: String,
    pub key_version: KeyVersion,
    pub iv_b64: String,
    pub ct_b64: String,
    pub wrapped_dek_b64: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aad_b64: Option<String>,
}

/// Assemble a record. Pure data shuffling plus Base64; no crypto.
pub fn build_backup_record(
    user_id: impl Into<String>,
    key_version: KeyVersion,
    nonce: &Nonce,
    blob: &[u8],
    wrapped: &WrappedDek,
    aad: Option<&[u8]>,
) -> BackupRecord {
    BackupRecord {
        user_id: user_id.into(),
        key_version,
        iv_b64: to_base64(nonce.as_bytes()),
        ct_b64: to_base64(blob),
        wrapped_dek_b64: to_base64(wrapped.as_bytes()),
        aad_b64: aad.map(to_base64),
    }
}

impl BackupRecord {
    pub fn nonce(&self) -> Result<Nonce, CryptoError> {
        Nonce::from_slice(&from_base64(&self.iv_b64)?)
    }

    pub fn ciphertext(&self) -> Result<Vec<u8>, CryptoError> {
        from_base64(&self.ct_b64)
    }

    pub fn wrapped_dek(&self) -> Result<WrappedDek, CryptoError> {
        from_base64(&self.wrapped_dek_b64).map(WrappedDek::from_bytes)
    }

    pub fn aad(&self) -> Result<Option<Vec<u8>>, CryptoError> {
        self.aad_b64.as_deref().map(from_base64).transpose()
    }

    pub fn to_json(&self) -> Result<String, CryptoError> {
        serde_json::to_string_pretty(self).map_err(|_| CryptoError::Encoding)
    }

    pub fn from_json(s: &str) -> Result<Self, CryptoError> {
        serde_json::from_str(s).map_err(|e| {
            tracing::debug!(error = %e, "backup record did not parse");
            CryptoError::Encoding
        })
    }

    /// Sizes and suites without touching any key.
    pub fn info(&self) -> Result<RecordInfo, CryptoError> {
        self.nonce()?;
        let ct = self.ciphertext()?;
        let wrapped = self.wrapped_dek()?;
        Ok(RecordInfo {
            user_id: self.user_id.clone(),
            key_version: self.key_version.clone(),
            aead_suite: SUITE_AEAD,
            wrap_suite: SUITE_WRAP,
            ciphertext_bytes: ct.len(),
            plaintext_bytes: ct.len().saturating_sub(AEAD_TAG_BYTES),
            wrapped_dek_bytes: wrapped.len(),
            has_aad: self.aad_b64.is_some(),
        })
    }
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

/// Record metadata, safe to log.
#[derive(Debug, Clone)]
pub struct RecordInfo {
    pub user_id: String,
    pub key_version: KeyVersion,
    pub aead_suite: &'static str,
    pub wrap_suite: &'static str,
    pub ciphertext_bytes: usize,
    pub plaintext_bytes: usize,
    pub wrapped_dek_bytes: usize,
    pub has_aad: bool,
}

impl fmt::Display for RecordInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} | {} + {} | {} bytes ({} plaintext) | wrapped dek {} bytes{}",
            self.user_id,
            self.key_version,
            self.aead_suite,
            self.wrap_suite,
            self.ciphertext_bytes,
            self.plaintext_bytes,
            self.wrapped_dek_bytes,
            if self.has_aad { " | aad" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(aad: Option<&[u8]>) -> BackupRecord {
        build_backup_record(
            "user-1",
            KeyVersion::new("rsa-2024-10"),
            &Nonce::from_bytes([1; 12]),
            &[2u8; 21],
            &WrappedDek::from_bytes(vec![3u8; 256]),
            aad,
        )
    }

    #[test]
    fn fields_are_base64() {
        let r = sample(Some(b"ctx".as_slice()));
        assert_eq!(r.iv_b64, "AQEBAQEBAQEBAQEB");
        assert_eq!(r.aad_b64.as_deref(), Some("Y3R4"));
        assert_eq!(r.nonce().unwrap(), Nonce::from_bytes([1; 12]));
        assert_eq!(r.ciphertext().unwrap(), vec![2u8; 21]);
        assert_eq!(r.wrapped_dek().unwrap().len(), 256);
        assert_eq!(r.aad().unwrap(), Some(b"ctx".to_vec()));
    }

    #[test]
    fn json_uses_persisted_field_names() {
        let json = sample(Some(b"ctx".as_slice())).to_json().unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        for field in ["user_id", "key_version", "iv_b64", "ct_b64", "wrapped_dek_b64", "aad_b64"] {
            assert!(v.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(v["key_version"], "rsa-2024-10");
        assert_eq!(v.as_object().unwrap().len(), 6);
    }

    #[test]
    fn absent_aad_is_omitted() {
        let r = sample(None);
        let json = r.to_json().unwrap();
        assert!(!json.contains("aad_b64"));
        assert_eq!(BackupRecord::from_json(&json).unwrap(), r);
        assert_eq!(r.aad().unwrap(), None);
    }

    #[test]
    fn bad_nonce_length_is_invalid_key_material() {
        let mut r = sample(None);
        r.iv_b64 = to_base64(&[0u8; 16]);
        assert_eq!(r.nonce(), Err(CryptoError::InvalidKeyMaterial));
    }

    #[test]
    fn bad_base64_is_encoding_error() {
        let mut r = sample(None);
        r.ct_b64 = "%%%".into();
        assert_eq!(r.ciphertext(), Err(CryptoError::Encoding));
        assert!(BackupRecord::from_json("{not json").is_err());
    }

    #[test]
    fn info_reports_sizes() {
        let info = sample(None).info().unwrap();
        assert_eq!(info.ciphertext_bytes, 21);
        assert_eq!(info.plaintext_bytes, 5);
        assert_eq!(info.wrapped_dek_bytes, 256);
        assert!(!info.has_aad);
        assert!(info.to_string().starts_with("user-1 @ rsa-2024-10"));
    }
}
