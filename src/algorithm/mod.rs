//! Leaf AEAD algorithms and their identifiers in the document format.
//!
//! The cipher implementations live in `crate::algorithms`.

use std::fmt;

/// Authentication tag length shared by every supported algorithm.
pub const TAG_SIZE: usize = 16;

/// Supported AEAD algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AeadAlgorithm {
    #[default]
    Aes256Gcm,
    XChaCha20Poly1305,
}

impl AeadAlgorithm {
    pub const AES_256_GCM_ID: &'static str = "AES256_GCM";
    pub const XCHACHA20_POLY1305_ID: &'static str = "XCHACHA20_POLY1305";

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aes256Gcm => Self::AES_256_GCM_ID,
            Self::XChaCha20Poly1305 => Self::XCHACHA20_POLY1305_ID,
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            Self::AES_256_GCM_ID => Some(Self::Aes256Gcm),
            Self::XCHACHA20_POLY1305_ID => Some(Self::XChaCha20Poly1305),
            _ => None,
        }
    }

    pub fn nonce_len(self) -> usize {
        match self {
            Self::Aes256Gcm => crate::algorithms::aes_256_gcm::NONCE_SIZE,
            Self::XChaCha20Poly1305 => crate::algorithms::xchacha20_poly1305::NONCE_SIZE,
        }
    }
}

impl fmt::Display for AeadAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
