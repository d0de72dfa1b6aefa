//! Password-protected local keystore.
//!
//! A single encrypted file durably holds named key material and metadata,
//! decryptable only with the correct passphrase. The encryption key is
//! stretched from the passphrase with scrypt; the serialized document is
//! sealed with AES-256-GCM under a fresh nonce on every persist.
//!
//! One `FileKeystore` is the sole owner of its in-memory document for the
//! lifetime of an open session. The crate does not take a file lock; a
//! keystore file must not have two concurrently mutating sessions, and
//! cross-process mutual exclusion is the caller's responsibility.
//!
//! ```no_run
//! use keysafe::{FileKeystore, KdfParams, KeyEntry, Keystore};
//!
//! # fn main() -> keysafe::Result<()> {
//! let path = std::path::PathBuf::from("/tmp/ks");
//! FileKeystore::create(path.clone(), "pw1", KdfParams::default(), false)?;
//!
//! let mut ks = FileKeystore::load(path, "pw1")?;
//! ks.set_key("db-key", "", KeyEntry::secret("db-key", "AES256", vec![0; 32])?)?;
//! let entry = ks.get_key("db-key", "")?;
//! assert_eq!(entry.algorithm(), "AES256");
//! # Ok(())
//! # }
//! ```

mod crypto;
mod document;
mod entry;
mod error;
mod format;
mod storage;

pub use crate::crypto::{KdfParams, KEY_LEN, NONCE_LEN};
pub use crate::document::Document;
pub use crate::entry::{EntryKind, KeyEntry};
pub use crate::error::{KeystoreError, Result};
pub use crate::storage::Storage;

use crate::format::KeystoreFile;
use std::path::PathBuf;
use zeroize::Zeroizing;

/// Provider identifier returned by [`FileKeystore`].
pub const PROVIDER_FILE: &str = "file";

/// The generic keystore capability.
///
/// The `password` parameter is reserved for per-entry secondary protection.
/// The file-based backend does not layer per-entry encryption: entries share
/// the store-level passphrase and the parameter is ignored.
pub trait Keystore {
    /// Returns the entry stored under `alias`.
    fn get_key(&self, alias: &str, password: &str) -> Result<&KeyEntry>;

    /// Stores `entry` under `alias`, replacing any prior entry, and persists
    /// before returning.
    fn set_key(&mut self, alias: &str, password: &str, entry: KeyEntry) -> Result<()>;

    /// Removes the entry under `alias` and persists before returning.
    fn delete_key(&mut self, alias: &str, password: &str) -> Result<KeyEntry>;

    /// Backend identifier, so callers can branch on the keystore kind.
    fn provider(&self) -> &'static str;

    /// Current entry count. Reads the in-memory document, no I/O.
    fn size(&self) -> usize;
}

struct Session {
    key: Zeroizing<[u8; KEY_LEN]>,
    document: Document,
}

/// File-based keystore session.
///
/// [`FileKeystore::create`] writes a sealed empty document and returns without
/// holding a session; [`FileKeystore::load`] opens one. Every mutation
/// re-seals the document under a fresh nonce and persists atomically before
/// returning. [`FileKeystore::close`] (or drop) discards the session and
/// zeroizes the derived key.
pub struct FileKeystore {
    storage: Storage,
    kdf: KdfParams,
    salt: Vec<u8>,
    session: Option<Session>,
}

impl FileKeystore {
    /// Creates a new keystore file at `path` sealed under `passphrase`.
    ///
    /// Fails with `AlreadyExists` if something is already at `path` and
    /// `overwrite` is false (a directory can never be overwritten). Neither
    /// the passphrase nor the derived key is retained after return.
    pub fn create(path: PathBuf, passphrase: &str, kdf: KdfParams, overwrite: bool) -> Result<()> {
        kdf.validate()?;

        let storage = Storage::new(path);
        if storage.is_dir() || (storage.exists() && !overwrite) {
            return Err(KeystoreError::AlreadyExists(storage.path().to_path_buf()));
        }

        let salt = crypto::generate_salt(kdf.salt_len())?;
        let key = crypto::derive_key(passphrase, &salt, &kdf)?;

        persist(&storage, &kdf, &salt, &key, &Document::new())
    }

    /// Loads the keystore file at `path` and opens a session.
    ///
    /// A failing authentication tag surfaces as `WrongPasswordOrCorrupted`;
    /// whether the passphrase was wrong or the file was tampered with is
    /// intentionally not revealed.
    pub fn load(path: PathBuf, passphrase: &str) -> Result<Self> {
        let storage = Storage::new(path);
        let data = storage.load()?;

        let file = KeystoreFile::from_bytes(&data)?;
        let key = crypto::derive_key(passphrase, file.salt(), file.kdf())?;

        let plaintext = crypto::open(&*key, file.nonce(), file.ciphertext(), &file.aad())
            .map_err(|e| match e {
                KeystoreError::AuthenticationFailed => KeystoreError::WrongPasswordOrCorrupted,
                other => other,
            })?;
        let document = Document::from_bytes(&plaintext)?;

        Ok(Self {
            storage,
            kdf: *file.kdf(),
            salt: file.salt().to_vec(),
            session: Some(Session { key, document }),
        })
    }

    /// Discards the session. The derived key is zeroized and subsequent
    /// `get_key`/`set_key`/`delete_key` calls fail with `NotLoaded`.
    pub fn close(&mut self) {
        self.session = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    pub fn path(&self) -> &std::path::Path {
        self.storage.path()
    }

    /// Document creation/update timestamps and alias listing, for callers
    /// that inspect the store without touching key material.
    pub fn document(&self) -> Result<&Document> {
        Ok(&self.session()?.document)
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(KeystoreError::NotLoaded)
    }

    fn session_mut(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or(KeystoreError::NotLoaded)
    }
}

impl Keystore for FileKeystore {
    fn get_key(&self, alias: &str, _password: &str) -> Result<&KeyEntry> {
        self.session()?.document.get(alias)
    }

    /// A failed persist leaves the file untouched (the atomic write either
    /// lands or it doesn't); the caller must treat the write as not taken.
    fn set_key(&mut self, alias: &str, _password: &str, mut entry: KeyEntry) -> Result<()> {
        entry.set_alias(alias);
        entry.validate()?;

        let session = self.session_mut()?;
        session.document.put(entry);

        let session = self.session()?;
        persist(
            &self.storage,
            &self.kdf,
            &self.salt,
            &session.key,
            &session.document,
        )
    }

    fn delete_key(&mut self, alias: &str, _password: &str) -> Result<KeyEntry> {
        let session = self.session_mut()?;
        let removed = session.document.remove(alias)?;

        let session = self.session()?;
        persist(
            &self.storage,
            &self.kdf,
            &self.salt,
            &session.key,
            &session.document,
        )?;
        Ok(removed)
    }

    fn provider(&self) -> &'static str {
        PROVIDER_FILE
    }

    fn size(&self) -> usize {
        self.session
            .as_ref()
            .map(|s| s.document.size())
            .unwrap_or(0)
    }
}

/// Seals `document` under a fresh nonce and writes the file atomically.
fn persist(
    storage: &Storage,
    kdf: &KdfParams,
    salt: &[u8],
    key: &[u8; KEY_LEN],
    document: &Document,
) -> Result<()> {
    let plaintext = document.to_bytes()?;
    let nonce = crypto::generate_nonce()?;
    let aad = format::aad(kdf, salt);

    let ciphertext = crypto::seal(key, &nonce, &plaintext, &aad)?;
    let file = KeystoreFile::new(*kdf, salt.to_vec(), nonce, ciphertext);

    storage.save(&file.to_bytes()?)
}
