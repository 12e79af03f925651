//! Document MAC: HMAC-SHA256 over every value of a document.
//!
//! Per-leaf AEAD already protects each ciphertext. The MAC additionally
//! covers plain values and the shape of the tree, so editing an unencrypted
//! value, dropping a leaf or adding an empty container is detected too.
//! Entries must be fed in document order, each container before its
//! children; each entry is length-prefixed.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::crypto::kdf::KEY_LEN;
use crate::error::{RabbitlockError, Result};
use crate::format::KeyPath;

type HmacSha256 = Hmac<Sha256>;

const PLAIN_ENTRY: u8 = b'p';
const SECRET_ENTRY: u8 = b's';
const MAPPING_ENTRY: u8 = b'm';
const SEQUENCE_ENTRY: u8 = b'q';

pub struct DocumentMac(HmacSha256);

impl DocumentMac {
    pub fn new(key: &[u8; KEY_LEN], lastmodified: Option<&str>) -> Result<Self> {
        let mut mac =
            HmacSha256::new_from_slice(key).map_err(|_| RabbitlockError::DerivationFailure)?;
        update_prefixed(&mut mac, lastmodified.unwrap_or_default().as_bytes());
        Ok(Self(mac))
    }

    pub fn update_plain(&mut self, path: &KeyPath, canonical: &[u8]) {
        self.update_entry(PLAIN_ENTRY, path, canonical);
    }

    pub fn update_secret(&mut self, path: &KeyPath, plaintext: &[u8]) {
        self.update_entry(SECRET_ENTRY, path, plaintext);
    }

    pub fn update_mapping(&mut self, path: &KeyPath, len: usize) {
        self.update_entry(MAPPING_ENTRY, path, &(len as u64).to_be_bytes());
    }

    pub fn update_sequence(&mut self, path: &KeyPath, len: usize) {
        self.update_entry(SEQUENCE_ENTRY, path, &(len as u64).to_be_bytes());
    }

    fn update_entry(&mut self, kind: u8, path: &KeyPath, value: &[u8]) {
        update_prefixed(&mut self.0, &path.aad());
        self.0.update(&[kind]);
        update_prefixed(&mut self.0, value);
    }

    pub fn finalize_hex(self) -> String {
        hex::encode(self.0.finalize().into_bytes())
    }

    /// Constant-time comparison against a hex MAC.
    pub fn verify_hex(self, expected: &str) -> bool {
        match hex::decode(expected.trim()) {
            Ok(bytes) => self.0.verify_slice(&bytes).is_ok(),
            Err(_) => false,
        }
    }
}

fn update_prefixed(mac: &mut HmacSha256, bytes: &[u8]) {
    mac.update(&(bytes.len() as u64).to_be_bytes());
    mac.update(bytes);
}
