//! Local reference implementation of the backup service.
//!
//! Holds one RSA keypair under a single `KeyVersion`, keeps uploaded records
//! in memory and unwraps DEKs on request. Used by tests and the CLI; a real
//! deployment puts the private key behind an HSM or KMS on the server.

use std::collections::HashMap;
use std::sync::RwLock;

use rand_core::OsRng;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::backup::{BackupApi, ServerKey};
use crate::encoding::from_base64;
use crate::error::{BackupError, CryptoError};
use crate::keys::KeyVersion;
use crate::record::BackupRecord;
use crate::wire::{DEK_BYTES, MIN_RSA_MODULUS_BITS};

pub struct LocalBackupServer {
    version: KeyVersion,
    secret: RsaPrivateKey,
    public_der: Vec<u8>,
    records: RwLock<HashMap<String, BackupRecord>>,
    strict: bool,
}

impl LocalBackupServer {
    /// Fresh keypair of `bits` (at least 2048).
    pub fn generate(version: KeyVersion, bits: usize) -> Result<Self, BackupError> {
        if bits < MIN_RSA_MODULUS_BITS {
            return Err(CryptoError::InvalidKeyMaterial.into());
        }
        let secret = RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| {
            tracing::error!(error = %e, "rsa key generation failed");
            BackupError::Crypto(CryptoError::ProviderFailure)
        })?;
        Self::from_secret(version, secret)
    }

    /// Load a PKCS#8 DER private key.
    pub fn from_pkcs8_der(version: KeyVersion, der: &[u8]) -> Result<Self, BackupError> {
        let secret = RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|_| BackupError::Crypto(CryptoError::InvalidKeyMaterial))?;
        Self::from_secret(version, secret)
    }

    pub fn from_secret(version: KeyVersion, secret: RsaPrivateKey) -> Result<Self, BackupError> {
        let public_der = RsaPublicKey::from(&secret)
            .to_public_key_der()
            .map_err(|_| BackupError::Crypto(CryptoError::InvalidKeyMaterial))?
            .as_bytes()
            .to_vec();
        Ok(Self {
            version,
            secret,
            public_der,
            records: RwLock::new(HashMap::new()),
            strict: false,
        })
    }

    /// Only unwrap a DEK that matches the caller's uploaded record.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn version(&self) -> &KeyVersion {
        &self.version
    }

    pub fn public_key_der(&self) -> &[u8] {
        &self.public_der
    }

    pub fn secret_key_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>, BackupError> {
        let doc = self
            .secret
            .to_pkcs8_der()
            .map_err(|_| BackupError::Crypto(CryptoError::InvalidKeyMaterial))?;
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }

    /// Uploaded record for `user_id`, if any.
    pub fn record(&self, user_id: &str) -> Result<Option<BackupRecord>, BackupError> {
        let records = self.records.read().map_err(|_| BackupError::Api("lock poisoned".into()))?;
        Ok(records.get(user_id).cloned())
    }

    fn check_version(&self, v: &KeyVersion) -> Result<(), BackupError> {
        if v != &self.version {
            tracing::warn!(requested = %v, current = %self.version, "unknown key version");
            return Err(BackupError::UnknownKeyVersion(v.to_string()));
        }
        Ok(())
    }

    fn check_uploaded(&self, user_id: &str, wrapped_dek_b64: &str) -> Result<(), BackupError> {
        let stored = self
            .record(user_id)?
            .ok_or_else(|| BackupError::RecordNotFound(user_id.to_string()))?;
        let matches: bool = stored
            .wrapped_dek_b64
            .as_bytes()
            .ct_eq(wrapped_dek_b64.as_bytes())
            .into();
        if !matches {
            tracing::warn!(user_id, "unwrap request does not match uploaded record");
            return Err(CryptoError::AuthenticationFailure.into());
        }
        Ok(())
    }
}

impl BackupApi for LocalBackupServer {
    fn fetch_server_public_key(&self) -> Result<ServerKey, BackupError> {
        Ok(ServerKey {
            version: self.version.clone(),
            der: self.public_der.clone(),
        })
    }

    fn upload_backup(&self, record: &BackupRecord) -> Result<(), BackupError> {
        self.check_version(&record.key_version)?;
        let mut records = self
            .records
            .write()
            .map_err(|_| BackupError::Api("lock poisoned".into()))?;
        records.insert(record.user_id.clone(), record.clone());
        tracing::info!(
            user_id = %record.user_id,
            key_version = %record.key_version,
            "backup uploaded"
        );
        Ok(())
    }

    fn request_dek_unwrap(
        &self,
        user_id: &str,
        key_version: &KeyVersion,
        wrapped_dek_b64: &str,
    ) -> Result<Zeroizing<Vec<u8>>, BackupError> {
        self.check_version(key_version)?;
        if self.strict {
            self.check_uploaded(user_id, wrapped_dek_b64)?;
        }
        let wrapped = from_base64(wrapped_dek_b64)?;

        // Every OAEP failure looks the same to the caller.
        let raw = self
            .secret
            .decrypt_blinded(&mut OsRng, Oaep::new::<Sha256>(), &wrapped)
            .map(Zeroizing::new)
            .map_err(|_| BackupError::Crypto(CryptoError::AuthenticationFailure))?;
        if raw.len() != DEK_BYTES {
            return Err(CryptoError::AuthenticationFailure.into());
        }

        tracing::info!(user_id, key_version = %key_version, "dek unwrapped");
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aead::{generate_key, generate_nonce};
    use crate::encoding::to_base64;
    use crate::keys::Dek;
    use crate::record::build_backup_record;
    use crate::wrap::wrap_dek;
    use once_cell::sync::Lazy;

    static KEY: Lazy<RsaPrivateKey> = Lazy::new(|| RsaPrivateKey::new(&mut OsRng, 2048).unwrap());

    fn server() -> LocalBackupServer {
        LocalBackupServer::from_secret(KeyVersion::new("v1"), KEY.clone()).unwrap()
    }

    #[test]
    fn unwrap_returns_original_dek() {
        let srv = server();
        let dek = generate_key().unwrap();
        let wrapped = wrap_dek(srv.public_key_der(), &dek).unwrap();

        let raw = srv
            .request_dek_unwrap("u", &KeyVersion::new("v1"), &to_base64(wrapped.as_bytes()))
            .unwrap();
        assert_eq!(Dek::from_slice(&raw).unwrap(), dek);
    }

    #[test]
    fn wrong_version_rejected() {
        let srv = server();
        let err = srv.request_dek_unwrap("u", &KeyVersion::new("v0"), "AAAA").unwrap_err();
        assert!(matches!(err, BackupError::UnknownKeyVersion(v) if v == "v0"));
    }

    #[test]
    fn garbage_wrapped_dek_is_generic_failure() {
        let srv = server();
        let err = srv
            .request_dek_unwrap("u", &KeyVersion::new("v1"), &to_base64(&[0u8; 256]))
            .unwrap_err();
        assert_eq!(err.crypto(), Some(CryptoError::AuthenticationFailure));

        let err = srv.request_dek_unwrap("u", &KeyVersion::new("v1"), "!!").unwrap_err();
        assert_eq!(err.crypto(), Some(CryptoError::Encoding));
    }

    #[test]
    fn strict_mode_requires_matching_upload() {
        let srv = server().strict();
        let dek = generate_key().unwrap();
        let wrapped = wrap_dek(srv.public_key_der(), &dek).unwrap();
        let wrapped_b64 = to_base64(wrapped.as_bytes());
        let v1 = KeyVersion::new("v1");

        let err = srv.request_dek_unwrap("u", &v1, &wrapped_b64).unwrap_err();
        assert!(matches!(err, BackupError::RecordNotFound(_)));

        let record = build_backup_record(
            "u",
            v1.clone(),
            &generate_nonce().unwrap(),
            &[0u8; 16],
            &wrapped,
            None,
        );
        srv.upload_backup(&record).unwrap();
        assert!(srv.request_dek_unwrap("u", &v1, &wrapped_b64).is_ok());

        let other = wrap_dek(srv.public_key_der(), &generate_key().unwrap()).unwrap();
        let err = srv.request_dek_unwrap("u", &v1, &to_base64(other.as_bytes())).unwrap_err();
        assert_eq!(err.crypto(), Some(CryptoError::AuthenticationFailure));
    }

    #[test]
    fn upload_with_wrong_version_rejected() {
        let srv = server();
        let wrapped = wrap_dek(srv.public_key_der(), &generate_key().unwrap()).unwrap();
        let record = build_backup_record(
            "u",
            KeyVersion::new("old"),
            &generate_nonce().unwrap(),
            &[0u8; 16],
            &wrapped,
            None,
        );
        assert!(matches!(srv.upload_backup(&record), Err(BackupError::UnknownKeyVersion(_))));
        assert!(srv.record("u").unwrap().is_none());
    }

    #[test]
    fn pkcs8_roundtrip() {
        let srv = server();
        let der = srv.secret_key_pkcs8_der().unwrap();
        let again = LocalBackupServer::from_pkcs8_der(KeyVersion::new("v1"), &der).unwrap();
        assert_eq!(again.public_key_der(), srv.public_key_der());
    }

    #[test]
    fn small_keys_refused() {
        assert!(LocalBackupServer::generate(KeyVersion::new("v1"), 1024).is_err());
    }
}
