//! Backup and recovery protocol.
//!
//! seal:    fetch server key → fresh DEK + nonce → AES-GCM(payload)
//!          → RSA-OAEP(DEK) → record → upload
//! recover: record → request_dek_unwrap(user, version, wrapped) → DEK
//!          → AES-GCM open
//!
//! Per record there are two states. `Sealed` holds only the record and is
//! what gets persisted. `Unsealed` holds a live DEK in memory; dropping it
//! (or calling `into_sealed`) zeroizes the key.

use zeroize::Zeroizing;

use crate::aead;
use crate::config::BackupConfig;
use crate::error::BackupError;
use crate::keys::{Dek, KeyVersion};
use crate::record::{build_backup_record, BackupRecord};
use crate::store::RecordStore;
use crate::wrap::ServerPublicKey;

// ---------------------------------------------------------------------------
// Collaborator contract
// ---------------------------------------------------------------------------

/// Server public key as handed out by the backup service.
#[derive(Clone, Debug)]
pub struct ServerKey {
    pub version: KeyVersion,
    /// X.509 SubjectPublicKeyInfo DER.
    pub der: Vec<u8>,
}

/// The remote backup service. It owns transport, timeouts and retries; the
/// channel is assumed authenticated and confidential.
pub trait BackupApi: Send + Sync {
    fn fetch_server_public_key(&self) -> Result<ServerKey, BackupError>;

    fn upload_backup(&self, record: &BackupRecord) -> Result<(), BackupError>;

    /// Server-side unwrap. Returns the raw DEK bytes.
    fn request_dek_unwrap(
        &self,
        user_id: &str,
        key_version: &KeyVersion,
        wrapped_dek_b64: &str,
    ) -> Result<Zeroizing<Vec<u8>>, BackupError>;
}

impl<T: BackupApi + ?Sized> BackupApi for &T {
    fn fetch_server_public_key(&self) -> Result<ServerKey, BackupError> {
        (**self).fetch_server_public_key()
    }

    fn upload_backup(&self, record: &BackupRecord) -> Result<(), BackupError> {
        (**self).upload_backup(record)
    }

    fn request_dek_unwrap(
        &self,
        user_id: &str,
        key_version: &KeyVersion,
        wrapped_dek_b64: &str,
    ) -> Result<Zeroizing<Vec<u8>>, BackupError> {
        (**self).request_dek_unwrap(user_id, key_version, wrapped_dek_b64)
    }
}

// ---------------------------------------------------------------------------
// Record states
// ---------------------------------------------------------------------------

/// At-rest form: wrapped DEK + ciphertext, no live key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sealed {
    record: BackupRecord,
}

impl Sealed {
    pub fn new(record: BackupRecord) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &BackupRecord {
        &self.record
    }

    pub fn into_record(self) -> BackupRecord {
        self.record
    }

    /// Ask the server to unwrap the DEK. The only way into `Unsealed`.
    pub fn unseal(self, api: &impl BackupApi) -> Result<Unsealed, BackupError> {
        // Reject a corrupt record before spending a server round trip.
        self.record.nonce()?;

        let raw = api.request_dek_unwrap(
            &self.record.user_id,
            &self.record.key_version,
            &self.record.wrapped_dek_b64,
        )?;
        let dek = Dek::from_slice(&raw)?;

        tracing::debug!(
            user_id = %self.record.user_id,
            key_version = %self.record.key_version,
            "record unsealed"
        );
        Ok(Unsealed {
            record: self.record,
            dek,
        })
    }
}

/// Transient form: live DEK in memory. Zeroized on drop.
#[derive(Debug)]
pub struct Unsealed {
    record: BackupRecord,
    dek: Dek,
}

impl Unsealed {
    pub fn record(&self) -> &BackupRecord {
        &self.record
    }

    /// Decrypt the payload with the record's own nonce and AAD.
    pub fn plaintext(&self) -> Result<Vec<u8>, BackupError> {
        let nonce = self.record.nonce()?;
        let blob = self.record.ciphertext()?;
        let aad = self.record.aad()?;
        Ok(aead::decrypt(&self.dek, &nonce, &blob, aad.as_deref())?)
    }

    /// Same as `plaintext` but with AAD supplied by the caller rather than
    /// taken from the record.
    pub fn plaintext_with_aad(&self, aad: Option<&[u8]>) -> Result<Vec<u8>, BackupError> {
        let nonce = self.record.nonce()?;
        let blob = self.record.ciphertext()?;
        Ok(aead::decrypt(&self.dek, &nonce, &blob, aad)?)
    }

    /// Discard the DEK and go back to the at-rest form.
    pub fn into_sealed(self) -> Sealed {
        Sealed {
            record: self.record,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Drives the seal/recover round trips against a `BackupApi`.
pub struct BackupClient<A: BackupApi> {
    api: A,
    config: BackupConfig,
}

impl<A: BackupApi> BackupClient<A> {
    pub fn new(api: A) -> Self {
        Self::with_config(api, BackupConfig::default())
    }

    pub fn with_config(api: A, config: BackupConfig) -> Self {
        Self { api, config }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    /// Encrypt `plaintext` under a fresh DEK, wrap the DEK for the server,
    /// upload the record and return it sealed.
    pub fn seal(
        &self,
        user_id: &str,
        plaintext: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<Sealed, BackupError> {
        if plaintext.len() > self.config.max_input_bytes {
            return Err(BackupError::InputTooLarge {
                len: plaintext.len(),
                limit: self.config.max_input_bytes,
            });
        }

        let server = self.api.fetch_server_public_key()?;
        let server_pk = ServerPublicKey::from_der(&server.der)?;

        let dek = aead::generate_key()?;
        let nonce = aead::generate_nonce()?;
        let blob = aead::encrypt(&dek, &nonce, plaintext, aad)?;
        let wrapped = server_pk.wrap(&dek)?;
        drop(dek);

        let record = build_backup_record(user_id, server.version, &nonce, &blob, &wrapped, aad);
        self.api.upload_backup(&record)?;

        tracing::info!(
            user_id,
            key_version = %record.key_version,
            plaintext_bytes = plaintext.len(),
            wrapped_dek_bytes = wrapped.len(),
            "backup sealed and uploaded"
        );
        Ok(Sealed::new(record))
    }

    /// Unwrap through the server and decrypt.
    pub fn recover(&self, sealed: Sealed) -> Result<Vec<u8>, BackupError> {
        let user_id = sealed.record().user_id.clone();
        let unsealed = sealed.unseal(&self.api)?;
        let plaintext = unsealed.plaintext().map_err(|e| {
            tracing::warn!(user_id = %user_id, error = %e, "recovered key did not open record");
            e
        })?;
        tracing::info!(user_id = %user_id, plaintext_bytes = plaintext.len(), "backup recovered");
        Ok(plaintext)
    }

    /// `seal`, then keep a local copy. The local copy is written only after
    /// the upload succeeded.
    pub fn seal_and_store(
        &self,
        store: &dyn RecordStore,
        user_id: &str,
        plaintext: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<Sealed, BackupError> {
        let sealed = self.seal(user_id, plaintext, aad)?;
        store.put(sealed.record())?;
        Ok(sealed)
    }

    /// Load the local record for `user_id` and recover it.
    pub fn recover_from_store(
        &self,
        store: &dyn RecordStore,
        user_id: &str,
    ) -> Result<Vec<u8>, BackupError> {
        let record = store
            .get(user_id)?
            .ok_or_else(|| BackupError::RecordNotFound(user_id.to_string()))?;
        self.recover(Sealed::new(record))
    }
}
