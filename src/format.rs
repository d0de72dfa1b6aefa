//! Persisted keystore file format.
//!
//! ```text
//! {
//!   "scrypt": { "n": int, "r": int, "p": int, "salt": hex },
//!   "iv":     hex,
//!   "cipher": hex   // AEAD ciphertext with the tag appended
//! }
//! ```
//!
//! Everything outside `cipher` is public by design: the KDF parameters and
//! salt are needed to re-derive the key on load, and the nonce is needed to
//! open the ciphertext. They are still bound to the ciphertext through the
//! AEAD associated data, so swapping the header of one file onto another
//! fails authentication.

use serde::{Deserialize, Serialize};

use crate::crypto::{KEY_LEN, KdfParams, NONCE_LEN};
use crate::error::{KeystoreError, Result};

#[derive(Serialize, Deserialize)]
struct FileRepr {
    scrypt: ScryptSection,
    iv: String,
    cipher: String,
}

#[derive(Serialize, Deserialize)]
struct ScryptSection {
    n: u32,
    r: u32,
    p: u32,
    salt: String,
}

/// A parsed keystore file: KDF parameters, salt, nonce, and ciphertext.
pub(crate) struct KeystoreFile {
    kdf: KdfParams,
    salt: Vec<u8>,
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

impl KeystoreFile {
    pub fn new(kdf: KdfParams, salt: Vec<u8>, nonce: [u8; NONCE_LEN], ciphertext: Vec<u8>) -> Self {
        Self {
            kdf,
            salt,
            nonce,
            ciphertext,
        }
    }

    pub fn kdf(&self) -> &KdfParams {
        &self.kdf
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Associated data for the AEAD layer: the KDF parameters and salt in a
    /// fixed textual form.
    pub fn aad(&self) -> Vec<u8> {
        aad(&self.kdf, &self.salt)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let repr = FileRepr {
            scrypt: ScryptSection {
                n: self.kdf.n(),
                r: self.kdf.r(),
                p: self.kdf.p(),
                salt: hex::encode(&self.salt),
            },
            iv: hex::encode(self.nonce),
            cipher: hex::encode(&self.ciphertext),
        };
        serde_json::to_vec(&repr).map_err(|e| KeystoreError::Io(std::io::Error::other(e)))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let repr: FileRepr = serde_json::from_slice(data)
            .map_err(|e| KeystoreError::InvalidFormat(format!("not a keystore file: {e}")))?;

        let salt = decode_hex("scrypt.salt", &repr.scrypt.salt)?;
        let nonce: [u8; NONCE_LEN] = decode_hex("iv", &repr.iv)?
            .try_into()
            .map_err(|_| KeystoreError::InvalidFormat("iv must be 12 bytes".into()))?;
        let ciphertext = decode_hex("cipher", &repr.cipher)?;

        let kdf = KdfParams::new(
            repr.scrypt.n,
            repr.scrypt.r,
            repr.scrypt.p,
            salt.len(),
            KEY_LEN,
        )?;

        Ok(Self::new(kdf, salt, nonce, ciphertext))
    }
}

/// Canonical associated-data bytes binding the header to the ciphertext.
pub(crate) fn aad(kdf: &KdfParams, salt: &[u8]) -> Vec<u8> {
    format!(
        "scrypt:n={},r={},p={},salt={}",
        kdf.n(),
        kdf.r(),
        kdf.p(),
        hex::encode(salt)
    )
    .into_bytes()
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value)
        .map_err(|_| KeystoreError::InvalidFormat(format!("{field} is not valid hex")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> KeystoreFile {
        KeystoreFile::new(
            KdfParams::default(),
            vec![1u8; 16],
            [2u8; NONCE_LEN],
            vec![3u8; 40],
        )
    }

    #[test]
    fn file_roundtrip() {
        let file = sample();
        let bytes = file.to_bytes().unwrap();
        let parsed = KeystoreFile::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.kdf(), file.kdf());
        assert_eq!(parsed.salt(), file.salt());
        assert_eq!(parsed.nonce(), file.nonce());
        assert_eq!(parsed.ciphertext(), file.ciphertext());
    }

    #[test]
    fn wire_fields_are_hex() {
        let bytes = sample().to_bytes().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["scrypt"]["n"], 16384);
        assert_eq!(value["scrypt"]["salt"], hex::encode([1u8; 16]));
        assert_eq!(value["iv"], hex::encode([2u8; NONCE_LEN]));
    }

    #[test]
    fn not_json_fails() {
        assert!(matches!(
            KeystoreFile::from_bytes(b"KNST\x01garbage"),
            Err(KeystoreError::InvalidFormat(_))
        ));
    }

    #[test]
    fn bad_hex_fails() {
        let mut bytes = sample().to_bytes().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        bytes = text.replacen(&hex::encode([2u8; NONCE_LEN]), "zz", 1).into_bytes();

        assert!(matches!(
            KeystoreFile::from_bytes(&bytes),
            Err(KeystoreError::InvalidFormat(_))
        ));
    }

    #[test]
    fn wrong_iv_length_fails() {
        let file = KeystoreFile::new(KdfParams::default(), vec![1u8; 16], [2u8; NONCE_LEN], vec![]);
        let text = String::from_utf8(file.to_bytes().unwrap()).unwrap();
        let short_iv = text.replacen(&hex::encode([2u8; NONCE_LEN]), "0102", 1);

        assert!(matches!(
            KeystoreFile::from_bytes(short_iv.as_bytes()),
            Err(KeystoreError::InvalidFormat(_))
        ));
    }

    #[test]
    fn invalid_kdf_parameters_fail() {
        let text = String::from_utf8(sample().to_bytes().unwrap()).unwrap();
        let bad_n = text.replacen("16384", "1000", 1);

        assert!(matches!(
            KeystoreFile::from_bytes(bad_n.as_bytes()),
            Err(KeystoreError::InvalidParameters(_))
        ));
    }

    #[test]
    fn aad_commits_to_params_and_salt() {
        let a = aad(&KdfParams::default(), &[1u8; 16]);
        let b = aad(&KdfParams::default(), &[2u8; 16]);
        let c = aad(&KdfParams::new(8192, 8, 1, 16, 32).unwrap(), &[1u8; 16]);

        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
