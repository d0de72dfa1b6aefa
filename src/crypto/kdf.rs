use scrypt::Params;
use zeroize::Zeroizing;

use super::{DEFAULT_SALT_LEN, KEY_LEN};
use crate::error::{KeystoreError, Result};

/// Upper bound on the scrypt working set (128 * n * r bytes).
const MAX_MEMORY: u64 = 1 << 30; // 1 GiB

/// Input parameters to the scrypt key derivation function as per
/// Colin Percival's scrypt paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    n: u32,
    r: u32,
    p: u32,
    salt_len: usize,
    dk_len: usize,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            // CPU/memory cost; 128 * n * r = 16 MiB, tolerable for interactive use
            n: 16384,
            // block size
            r: 8,
            // parallelisation
            p: 1,
            salt_len: DEFAULT_SALT_LEN,
            dk_len: KEY_LEN,
        }
    }
}

impl KdfParams {
    pub fn new(n: u32, r: u32, p: u32, salt_len: usize, dk_len: usize) -> Result<Self> {
        let params = Self {
            n,
            r,
            p,
            salt_len,
            dk_len,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn n(&self) -> u32 {
        self.n
    }

    pub fn r(&self) -> u32 {
        self.r
    }

    pub fn p(&self) -> u32 {
        self.p
    }

    pub fn salt_len(&self) -> usize {
        self.salt_len
    }

    pub fn dk_len(&self) -> usize {
        self.dk_len
    }

    pub fn validate(&self) -> Result<()> {
        if self.n < 2 || !self.n.is_power_of_two() {
            return Err(KeystoreError::InvalidParameters(
                "scrypt cost must be a power of two >= 2".into(),
            ));
        }
        if self.r < 1 {
            return Err(KeystoreError::InvalidParameters(
                "scrypt block size must be >= 1".into(),
            ));
        }
        if self.p < 1 {
            return Err(KeystoreError::InvalidParameters(
                "scrypt parallelism must be >= 1".into(),
            ));
        }
        if u64::from(self.n) * u64::from(self.r) * 128 > MAX_MEMORY {
            return Err(KeystoreError::InvalidParameters(
                "scrypt working set exceeds 1 GiB".into(),
            ));
        }
        if self.salt_len < 8 {
            return Err(KeystoreError::InvalidParameters(
                "salt must be at least 8 bytes".into(),
            ));
        }
        if self.dk_len != KEY_LEN {
            return Err(KeystoreError::InvalidParameters(
                "derived key length must match the AES-256 key size".into(),
            ));
        }
        Ok(())
    }

    /// log2(n), the cost exponent the scrypt primitive expects.
    fn log_n(&self) -> u8 {
        self.n.trailing_zeros() as u8
    }
}

/// Derives the symmetric encryption key from a passphrase and salt.
///
/// Deterministic, and deliberately expensive: every call re-runs the full
/// scrypt cost, there is no caching.
pub fn derive_key(
    passphrase: &str,
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    params.validate()?;

    let scrypt_params = Params::new(params.log_n(), params.r, params.p, params.dk_len)
        .map_err(|e| KeystoreError::DerivationFailed(format!("scrypt rejected parameters: {e}")))?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    scrypt::scrypt(passphrase.as_bytes(), salt, &scrypt_params, &mut *key)
        .map_err(|e| KeystoreError::DerivationFailed(format!("scrypt derivation failed: {e}")))?;

    Ok(key)
}
