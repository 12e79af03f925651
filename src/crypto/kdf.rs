//! Seed → key material derivation.
//!
//! The seed is full-entropy key material, not a password, so it goes
//! through HKDF-SHA256 rather than a password hash. One fixed salt, one
//! `info` label per derived key. Same seed, same keys; different seeds,
//! independent keys.
//!
//! Seed and keys are held in `Zeroizing` and never logged.

use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{RabbitlockError, Result};

/// Decoded seed length (256-bit).
pub const SEED_LEN: usize = 32;

/// Derived key length (256-bit).
pub const KEY_LEN: usize = 32;

/// Derivation salt (domain separation, not secret).
pub const KDF_SALT: &[u8] = b"rabbitlock/kdf/v1";

const DATA_KEY_INFO: &[u8] = b"rabbitlock/data-key";
const MAC_KEY_INFO: &[u8] = b"rabbitlock/mac-key";

/// Caller-supplied seed.
pub struct Seed(Zeroizing<[u8; SEED_LEN]>);

impl Seed {
    /// Decodes a hex seed. Surrounding whitespace is ignored.
    pub fn from_hex(seed_hex: &str) -> Result<Self> {
        let decoded = Zeroizing::new(
            hex::decode(seed_hex.trim())
                .map_err(|_| RabbitlockError::InvalidSeedFormat("seed is not valid hex"))?,
        );
        Self::from_bytes(&decoded)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SEED_LEN {
            return Err(RabbitlockError::InvalidSeedFormat(
                "seed must decode to 32 bytes",
            ));
        }

        let mut seed = Zeroizing::new([0u8; SEED_LEN]);
        seed.copy_from_slice(bytes);
        Ok(Self(seed))
    }

    fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(..)")
    }
}

/// Keys for one decrypt or encrypt call. Wiped on drop.
pub struct DerivedKeyMaterial {
    data_key: Zeroizing<[u8; KEY_LEN]>,
    mac_key: Zeroizing<[u8; KEY_LEN]>,
}

impl DerivedKeyMaterial {
    /// AEAD key for leaf values.
    pub fn data_key(&self) -> &[u8; KEY_LEN] {
        &self.data_key
    }

    /// HMAC key for the document MAC.
    pub fn mac_key(&self) -> &[u8; KEY_LEN] {
        &self.mac_key
    }
}

impl fmt::Debug for DerivedKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKeyMaterial(..)")
    }
}

/// Decodes `seed_hex` and derives the key material from it.
pub fn derive(seed_hex: &str) -> Result<DerivedKeyMaterial> {
    derive_from_seed(&Seed::from_hex(seed_hex)?)
}

pub fn derive_from_seed(seed: &Seed) -> Result<DerivedKeyMaterial> {
    let hkdf = Hkdf::<Sha256>::new(Some(KDF_SALT), seed.as_bytes());

    let mut data_key = Zeroizing::new([0u8; KEY_LEN]);
    hkdf.expand(DATA_KEY_INFO, &mut data_key[..])
        .map_err(|_| RabbitlockError::DerivationFailure)?;

    let mut mac_key = Zeroizing::new([0u8; KEY_LEN]);
    hkdf.expand(MAC_KEY_INFO, &mut mac_key[..])
        .map_err(|_| RabbitlockError::DerivationFailure)?;

    Ok(DerivedKeyMaterial { data_key, mac_key })
}
