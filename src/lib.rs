//! # dek-envelope
//!
//! Envelope encryption with server-side key recovery.
//!
//! Each record gets a fresh 256-bit data encryption key (DEK). The payload is
//! sealed with AES-256-GCM under that DEK, and the DEK itself is wrapped with
//! the backup server's RSA-OAEP(SHA-256) public key. Recovery sends the
//! wrapped DEK back to the server, which unwraps it over an authenticated
//! channel.
//!
//! ## Quick Start
//!
//! ```rust
//! use dek_envelope::{BackupClient, KeyVersion, LocalBackupServer};
//!
//! let server = LocalBackupServer::generate(KeyVersion::new("rsa-2024-10"), 2048).unwrap();
//! let client = BackupClient::new(&server);
//!
//! let sealed = client.seal("user-42", b"secret", Some(b"profile".as_slice())).unwrap();
//! let plaintext = client.recover(sealed).unwrap();
//!
//! assert_eq!(plaintext, b"secret");
//! ```
//!
//! ## Low-level API
//!
//! ```rust
//! use dek_envelope::{decrypt, encrypt, generate_key, generate_nonce};
//!
//! let dek = generate_key().unwrap();
//! let nonce = generate_nonce().unwrap();
//! let blob = encrypt(&dek, &nonce, b"hello", None).unwrap();
//! assert_eq!(decrypt(&dek, &nonce, &blob, None).unwrap(), b"hello");
//! ```
//!
//! ## Security Properties
//!
//! - **Fresh key per record**: a DEK seals exactly one payload
//! - **Uniform errors**: every decrypt failure is `AuthenticationFailure`
//! - **AAD binding**: different AAD at decrypt fails the tag check
//! - **Key hygiene**: DEKs are zeroized on drop and never printed
//!
//! ## What's NOT Provided
//!
//! - Network transport for the backup service
//! - Platform keystore bindings (see [`KeyHandle`])
//! - Server-side key rotation

#![deny(unsafe_code)]

pub mod aead;
pub mod backup;
pub mod config;
pub mod encoding;
pub mod error;
pub mod guard;
pub mod keys;
pub mod record;
pub mod server;
pub mod store;
pub mod wire;
pub mod wrap;

pub use aead::{decrypt, encrypt, generate_key, generate_nonce};
pub use backup::{BackupApi, BackupClient, Sealed, ServerKey, Unsealed};
pub use config::BackupConfig;
pub use encoding::{from_base64, to_base64};
pub use error::{BackupError, CryptoError};
pub use guard::{InFlightGuard, InFlightPermit};
pub use keys::{Dek, KeyHandle, KeyVersion, Nonce};
pub use record::{build_backup_record, BackupRecord, RecordInfo};
pub use server::LocalBackupServer;
pub use store::{FileStore, InMemoryStore, RecordStore};
pub use wrap::{wrap_dek, ServerPublicKey, WrappedDek};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
