//! Cryptographic primitives for the keystore.
//!
//! Provides scrypt key derivation and AES-256-GCM sealing.

pub mod aead;
pub mod kdf;

pub use aead::{generate_nonce, generate_salt, open, seal};
pub use kdf::{KdfParams, derive_key};

/// Length of the encryption key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
/// Length of the nonce (12 bytes for AES-256-GCM).
pub const NONCE_LEN: usize = 12;
/// Default salt length (16 bytes).
pub const DEFAULT_SALT_LEN: usize = 16;
