//! Seed-derived secret decryption.
//!
//! A secrets document is JSON whose sensitive leaves are replaced by
//! `ENC[...]` envelopes. A single 32-byte seed yields the keys that open
//! every leaf; the rest of the document is returned as is.
//!
//! ```no_run
//! # fn main() -> rabbitlock_engine::Result<()> {
//! let raw = std::fs::read("env.sops.json")?;
//! let doc = rabbitlock_engine::decrypt(&std::env::var("RABBITLOCK_SEED_HEX").unwrap_or_default(), &raw)?;
//! let password = doc.get("db").and_then(|db| db.get("password"));
//! # let _ = password;
//! # Ok(())
//! # }
//! ```

mod decrypt;
mod encrypt;

pub mod algorithm;
mod algorithms;
pub mod config;
pub mod crypto;
pub mod env;
pub mod error;
pub mod format;
pub mod fs;
pub mod plaintext;
pub mod reassemble;

pub use algorithm::AeadAlgorithm;
pub use config::{DecryptOptions, EncryptOptions, LoaderConfig};
pub use crypto::{decrypt_leaf, derive};
pub use decrypt::decrypt_all;
pub use error::{RabbitlockError, Result, Stage};
pub use format::parse;
pub use plaintext::{PlainValue, PlaintextDocument};
pub use reassemble::{DecryptedLeaves, reassemble};

use std::path::Path;

/// Decrypts a secrets document with default options.
pub fn decrypt(seed_hex: &str, raw: &[u8]) -> Result<PlaintextDocument> {
    decrypt::decrypt_document(seed_hex, raw, &DecryptOptions::default())
}

pub fn decrypt_with_options(
    seed_hex: &str,
    raw: &[u8],
    options: &DecryptOptions,
) -> Result<PlaintextDocument> {
    decrypt::decrypt_document(seed_hex, raw, options)
}

pub fn decrypt_file(path: &Path, seed_hex: &str) -> Result<PlaintextDocument> {
    decrypt::decrypt_file(path, seed_hex, &DecryptOptions::default())
}

/// Encrypts a plaintext JSON document into a secrets document.
pub fn encrypt(seed_hex: &str, plaintext_json: &[u8], options: &EncryptOptions) -> Result<String> {
    encrypt::encrypt_document(seed_hex, plaintext_json, options)
}

pub fn encrypt_file(
    input: &Path,
    output: &Path,
    seed_hex: &str,
    options: &EncryptOptions,
) -> Result<()> {
    encrypt::encrypt_file(input, output, seed_hex, options)
}
