//! DEK wrapping under a server RSA public key.
//!
//! wrapped = RSA-OAEP(hash = SHA-256, mgf = MGF1-SHA-256, label = "")(dek[32])
//!
//! The public key arrives as X.509 SubjectPublicKeyInfo DER. Unwrapping
//! happens server-side; see `server` for the local reference collaborator.

use rand_core::OsRng;
use rsa::pkcs1;
use rsa::pkcs8::der::Decode;
use rsa::pkcs8::SubjectPublicKeyInfoRef;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Oaep, RsaPublicKey};
use sha2::Sha256;

use crate::error::CryptoError;
use crate::keys::Dek;
use crate::wire::{MAX_RSA_MODULUS_BITS, MIN_RSA_MODULUS_BITS};

// ---------------------------------------------------------------------------
// Server public key
// ---------------------------------------------------------------------------

/// Parsed recipient key for DEK wrapping.
#[derive(Clone, Debug)]
pub struct ServerPublicKey {
    inner: RsaPublicKey,
}

impl ServerPublicKey {
    /// Decode X.509 SPKI DER. Anything that is not an RSA SPKI is
    /// `InvalidKeyMaterial`.
    ///
    /// Moduli from 2048 up to 16384 bits are accepted. Keys under 2048 bits
    /// decode fine but are refused here as a local policy, stricter than a
    /// plain X.509 key factory.
    pub fn from_der(der: &[u8]) -> Result<Self, CryptoError> {
        let inner = decode_spki(der).map_err(|e| {
            tracing::debug!(len = der.len(), error = %e, "server public key did not decode");
            CryptoError::InvalidKeyMaterial
        })?;
        let bits = inner.size() * 8;
        if bits < MIN_RSA_MODULUS_BITS {
            tracing::debug!(bits, "server public key too small");
            return Err(CryptoError::InvalidKeyMaterial);
        }
        Ok(Self { inner })
    }

    /// Modulus length in bytes; every wrapped DEK has exactly this length.
    pub fn modulus_bytes(&self) -> usize {
        self.inner.size()
    }

    /// RSA-OAEP encrypt the DEK's raw bytes.
    pub fn wrap(&self, dek: &Dek) -> Result<WrappedDek, CryptoError> {
        let bytes = self
            .inner
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), dek.expose_secret())
            .map_err(|e| {
                tracing::error!(error = %e, "rsa-oaep wrap failed");
                CryptoError::ProviderFailure
            })?;
        debug_assert_eq!(bytes.len(), self.modulus_bytes());
        Ok(WrappedDek(bytes))
    }
}

// `DecodePublicKey` goes through `RsaPublicKey::new`, which stops at 4096
// bits. Decode the two layers by hand to lift that cap.
fn decode_spki(der: &[u8]) -> Result<RsaPublicKey, Box<dyn std::error::Error>> {
    let spki = SubjectPublicKeyInfoRef::from_der(der)?;
    spki.algorithm.assert_algorithm_oid(pkcs1::ALGORITHM_OID)?;
    let bits = spki.subject_public_key.as_bytes().ok_or("unaligned key bit string")?;
    let key = pkcs1::RsaPublicKey::from_der(bits)?;
    let n = BigUint::from_bytes_be(key.modulus.as_bytes());
    let e = BigUint::from_bytes_be(key.public_exponent.as_bytes());
    Ok(RsaPublicKey::new_with_max_size(n, e, MAX_RSA_MODULUS_BITS)?)
}

impl From<RsaPublicKey> for ServerPublicKey {
    fn from(inner: RsaPublicKey) -> Self {
        Self { inner }
    }
}

// ---------------------------------------------------------------------------
// Wrapped DEK
// ---------------------------------------------------------------------------

/// RSA-OAEP ciphertext of a DEK. Only meaningful next to its `KeyVersion`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrappedDek(Vec<u8>);

impl WrappedDek {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Wrap `dek` under the DER-encoded server public key.
pub fn wrap_dek(server_public_key_der: &[u8], dek: &Dek) -> Result<WrappedDek, CryptoError> {
    ServerPublicKey::from_der(server_public_key_der)?.wrap(dek)
}
