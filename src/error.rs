//! Error taxonomy for the keystore.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Custom `Result` type used throughout the crate.
pub type Result<T> = std::result::Result<T, KeystoreError>;

/// Errors surfaced by keystore operations.
///
/// `AuthenticationFailed` and `WrongPasswordOrCorrupted` deliberately carry no
/// detail: an attacker must not be able to tell a wrong password apart from a
/// tampered or corrupted file.
#[derive(Debug, Error)]
pub enum KeystoreError {
    /// KDF tuning rejected before derivation was attempted.
    #[error("invalid KDF parameters: {0}")]
    InvalidParameters(String),

    /// The derivation primitive itself rejected the inputs.
    #[error("key derivation failed: {0}")]
    DerivationFailed(String),

    /// A keystore file (or a directory) is already present at the target path.
    #[error("keystore already exists at {}", .0.display())]
    AlreadyExists(PathBuf),

    /// The target path is not writable or readable.
    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    /// AEAD tag verification failed.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The passphrase is wrong, or the file was tampered with. Indistinguishable.
    #[error("wrong password or corrupted keystore")]
    WrongPasswordOrCorrupted,

    /// No entry under the given alias.
    #[error("alias not found: {0}")]
    NotFound(String),

    /// Operation requires an open session.
    #[error("keystore is not loaded")]
    NotLoaded,

    /// Entry is missing required fields.
    #[error("invalid key entry: {0}")]
    InvalidEntry(String),

    /// The file is not a parseable keystore file.
    #[error("invalid keystore file: {0}")]
    InvalidFormat(String),

    /// Read/write error from the underlying storage.
    #[error("I/O failure")]
    Io(#[from] io::Error),
}
