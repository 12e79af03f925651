//! Decryption pipeline
//!
//! Single linear pass, no retries:
//! 1. Parse the document
//! 2. Derive key material from the seed
//! 3. Decrypt every leaf (in parallel)
//! 4. Verify the document MAC (a missing MAC is an error unless allowed)
//! 5. Reassemble the plaintext tree
//!
//! Any failure aborts the whole call. Decrypted leaves of a failed call are
//! wiped and never returned.

use std::fs;
use std::path::Path;

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::config::DecryptOptions;
use crate::crypto::kdf::{self, DerivedKeyMaterial};
use crate::crypto::{decrypt_leaf, mac::DocumentMac};
use crate::error::{RabbitlockError, Result, Stage};
use crate::format::metadata::METADATA_KEY;
use crate::format::{self, EncryptedLeaf, KeyPath, LeafId, SecretNode, SecretsDocument};
use crate::plaintext::PlaintextDocument;
use crate::reassemble::{DecryptedLeaves, reassemble};

pub fn decrypt_document(
    seed_hex: &str,
    raw: &[u8],
    options: &DecryptOptions,
) -> Result<PlaintextDocument> {
    let doc = format::parse(raw)?;
    let keys = kdf::derive(seed_hex)?;

    let decrypted = decrypt_all(&doc, &keys, options.workers)?;
    verify_mac(&doc, &decrypted, &keys, options.require_mac)?;
    let plaintext = reassemble(&doc, &decrypted)?;

    debug!(leaves = decrypted.len(), "decrypted secrets document");
    Ok(plaintext)
}

pub fn decrypt_file(
    path: &Path,
    seed_hex: &str,
    options: &DecryptOptions,
) -> Result<PlaintextDocument> {
    debug!(path = %path.display(), "reading secrets document");
    let raw = fs::read(path)?;
    decrypt_document(seed_hex, &raw, options)
}

/// Decrypts every leaf of `doc`.
///
/// With `workers` set, a dedicated pool of that many threads is used for
/// this call; otherwise rayon's global pool. When several leaves fail, the
/// first one in document order is reported.
pub fn decrypt_all(
    doc: &SecretsDocument,
    keys: &DerivedKeyMaterial,
    workers: Option<usize>,
) -> Result<DecryptedLeaves> {
    let leaves = doc.leaves();

    let results = match workers {
        Some(threads) => ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("rabbitlock-decrypt-{i}"))
            .build()?
            .install(|| decrypt_each(leaves, keys)),
        None => decrypt_each(leaves, keys),
    };

    results
        .into_iter()
        .enumerate()
        .map(|(i, result)| result.map(|plaintext| (LeafId(i), plaintext)))
        .collect()
}

fn decrypt_each(
    leaves: &[EncryptedLeaf],
    keys: &DerivedKeyMaterial,
) -> Vec<Result<Zeroizing<Vec<u8>>>> {
    leaves
        .par_iter()
        .map(|leaf| decrypt_leaf(leaf, keys))
        .collect()
}

fn verify_mac(
    doc: &SecretsDocument,
    decrypted: &DecryptedLeaves,
    keys: &DerivedKeyMaterial,
    require_mac: bool,
) -> Result<()> {
    let metadata = doc.metadata();
    let Some(expected) = metadata.and_then(|m| m.mac.as_deref()) else {
        if require_mac {
            return Err(RabbitlockError::malformed(
                METADATA_KEY,
                "document carries no MAC",
            ));
        }
        debug!("document has no MAC, skipping verification");
        return Ok(());
    };

    let lastmodified = metadata.and_then(|m| m.lastmodified.as_deref());
    let mut mac = DocumentMac::new(keys.mac_key(), lastmodified)?;
    feed_mac(doc.root(), &KeyPath::root(), decrypted, &mut mac)?;

    if !mac.verify_hex(expected) {
        warn!("document MAC mismatch");
        return Err(RabbitlockError::integrity(
            Stage::Verify,
            format!("{METADATA_KEY}.mac"),
        ));
    }

    Ok(())
}

fn feed_mac(
    node: &SecretNode,
    path: &KeyPath,
    decrypted: &DecryptedLeaves,
    mac: &mut DocumentMac,
) -> Result<()> {
    match node {
        SecretNode::Mapping(entries) => {
            mac.update_mapping(path, entries.len());
            for (key, child) in entries {
                feed_mac(child, &path.child_key(key), decrypted, mac)?;
            }
        }
        SecretNode::Sequence(items) => {
            mac.update_sequence(path, items.len());
            for (index, child) in items.iter().enumerate() {
                feed_mac(child, &path.child_index(index), decrypted, mac)?;
            }
        }
        SecretNode::Plain(scalar) => mac.update_plain(path, &scalar.canonical_bytes()),
        SecretNode::Encrypted(id) => {
            let plaintext = decrypted
                .get(*id)
                .ok_or_else(|| RabbitlockError::malformed(path, "leaf was not decrypted"))?;
            mac.update_secret(path, plaintext);
        }
    }
    Ok(())
}
