use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use getrandom::fill;
use std::io;
use zeroize::Zeroizing;

use super::NONCE_LEN;
use crate::error::{KeystoreError, Result};

/// Fill buffer with cryptographically secure random bytes
fn secure_random(buf: &mut [u8]) -> Result<()> {
    fill(buf).map_err(|_| KeystoreError::Io(io::Error::other("OS random generator unavailable")))
}

/// Generate a fresh salt of the given length
pub fn generate_salt(len: usize) -> Result<Vec<u8>> {
    let mut salt = vec![0u8; len];
    secure_random(&mut salt)?;
    Ok(salt)
}

/// Generate a fresh nonce. Called once per seal; a nonce is never reused
/// with the same key.
pub fn generate_nonce() -> Result<[u8; NONCE_LEN]> {
    let mut nonce = [0u8; NONCE_LEN];
    secure_random(&mut nonce)?;
    Ok(nonce)
}

/// Seal plaintext under `key` and `nonce`, binding `aad` into the
/// authentication tag. Output is ciphertext with the tag appended.
pub fn seal(key: &[u8], nonce: &[u8; NONCE_LEN], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| KeystoreError::InvalidParameters("AEAD key must be 32 bytes".into()))?;

    cipher
        .encrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| KeystoreError::Io(io::Error::other("encryption failed")))
}

/// Open a sealed buffer. Fails with `AuthenticationFailed` whenever the tag
/// does not verify; a wrong key, flipped ciphertext bit, or mismatched `aad`
/// all look the same.
pub fn open(
    key: &[u8],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| KeystoreError::InvalidParameters("AEAD key must be 32 bytes".into()))?;

    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| KeystoreError::AuthenticationFailed)?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let key = [9u8; 32];
        let nonce = generate_nonce().unwrap();

        let sealed = seal(&key, &nonce, b"secret data", b"header").unwrap();
        let opened = open(&key, &nonce, &sealed, b"header").unwrap();

        assert_eq!(&*opened, b"secret data");
    }

    #[test]
    fn empty_plaintext_roundtrips() {
        let key = [9u8; 32];
        let nonce = generate_nonce().unwrap();

        let sealed = seal(&key, &nonce, b"", b"").unwrap();
        let opened = open(&key, &nonce, &sealed, b"").unwrap();

        assert!(opened.is_empty());
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let nonce = generate_nonce().unwrap();
        let sealed = seal(&[1u8; 32], &nonce, b"data", b"").unwrap();

        assert!(matches!(
            open(&[2u8; 32], &nonce, &sealed, b""),
            Err(KeystoreError::AuthenticationFailed)
        ));
    }

    #[test]
    fn any_flipped_bit_fails_authentication() {
        let key = [3u8; 32];
        let nonce = generate_nonce().unwrap();
        let sealed = seal(&key, &nonce, b"payload", b"aad").unwrap();

        for i in 0..sealed.len() {
            for bit in 0..8 {
                let mut tampered = sealed.clone();
                tampered[i] ^= 1 << bit;
                assert!(matches!(
                    open(&key, &nonce, &tampered, b"aad"),
                    Err(KeystoreError::AuthenticationFailed)
                ));
            }
        }
    }

    #[test]
    fn mismatched_aad_fails_authentication() {
        let key = [4u8; 32];
        let nonce = generate_nonce().unwrap();
        let sealed = seal(&key, &nonce, b"payload", b"header-a").unwrap();

        assert!(matches!(
            open(&key, &nonce, &sealed, b"header-b"),
            Err(KeystoreError::AuthenticationFailed)
        ));
    }

    #[test]
    fn nonces_are_unique() {
        let a = generate_nonce().unwrap();
        let b = generate_nonce().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn salts_are_unique() {
        let a = generate_salt(16).unwrap();
        let b = generate_salt(16).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn short_key_is_rejected() {
        let nonce = [0u8; NONCE_LEN];
        assert!(matches!(
            seal(&[0u8; 16], &nonce, b"x", b""),
            Err(KeystoreError::InvalidParameters(_))
        ));
    }
}
