//! Per-leaf authenticated encryption.
//!
//! Each leaf is sealed with its own random nonce and its key path as
//! associated data. A leaf that fails authentication yields no plaintext.

use rand::{RngCore, rngs::OsRng};
use tracing::warn;
use zeroize::Zeroizing;

use crate::algorithm::AeadAlgorithm;
use crate::algorithms::{aes_256_gcm, xchacha20_poly1305};
use crate::crypto::kdf::DerivedKeyMaterial;
use crate::error::{RabbitlockError, Result, Stage};
use crate::format::{EncryptedLeaf, Envelope, KeyPath, ValueType};

/// Decrypts one leaf and checks its tag.
///
/// # Errors
/// - `UnsupportedAlgorithm` for an unknown algorithm identifier
/// - `IntegrityViolation` on tag mismatch (wrong seed, tampered leaf, or a
///   leaf moved to another path)
pub fn decrypt_leaf(leaf: &EncryptedLeaf, keys: &DerivedKeyMaterial) -> Result<Zeroizing<Vec<u8>>> {
    let algorithm = AeadAlgorithm::from_id(&leaf.algorithm).ok_or_else(|| {
        RabbitlockError::UnsupportedAlgorithm {
            path: leaf.path.to_string(),
            algorithm: leaf.algorithm.clone(),
        }
    })?;

    let aad = leaf.path.aad();
    let opened = match algorithm {
        AeadAlgorithm::Aes256Gcm => aes_256_gcm::open(
            keys.data_key(),
            &nonce_array(leaf)?,
            &leaf.ciphertext,
            &leaf.tag,
            &aad,
        ),
        AeadAlgorithm::XChaCha20Poly1305 => xchacha20_poly1305::open(
            keys.data_key(),
            &nonce_array(leaf)?,
            &leaf.ciphertext,
            &leaf.tag,
            &aad,
        ),
    };

    opened.map_err(|_| {
        warn!(path = %leaf.path, %algorithm, "leaf failed authentication");
        RabbitlockError::integrity(Stage::Decrypt, &leaf.path)
    })
}

/// Encrypts one value under a fresh random nonce.
pub fn encrypt_leaf(
    algorithm: AeadAlgorithm,
    keys: &DerivedKeyMaterial,
    path: &KeyPath,
    plaintext: &[u8],
    value_type: ValueType,
) -> Result<Envelope> {
    let aad = path.aad();

    let (iv, sealed) = match algorithm {
        AeadAlgorithm::Aes256Gcm => {
            let nonce = random_nonce::<{ aes_256_gcm::NONCE_SIZE }>();
            let sealed = aes_256_gcm::seal(keys.data_key(), &nonce, plaintext, &aad);
            (nonce.to_vec(), sealed)
        }
        AeadAlgorithm::XChaCha20Poly1305 => {
            let nonce = random_nonce::<{ xchacha20_poly1305::NONCE_SIZE }>();
            let sealed = xchacha20_poly1305::seal(keys.data_key(), &nonce, plaintext, &aad);
            (nonce.to_vec(), sealed)
        }
    };

    let (data, tag) =
        sealed.map_err(|_| RabbitlockError::malformed(path, "value too large to encrypt"))?;

    Ok(Envelope {
        algorithm: algorithm.as_str().to_owned(),
        data,
        iv,
        tag: tag.to_vec(),
        value_type,
    })
}

fn nonce_array<const N: usize>(leaf: &EncryptedLeaf) -> Result<[u8; N]> {
    leaf.nonce
        .as_slice()
        .try_into()
        .map_err(|_| RabbitlockError::malformed(&leaf.path, format!("nonce must be {N} bytes")))
}

// Nonces must never repeat under one key.
fn random_nonce<const N: usize>() -> [u8; N] {
    let mut nonce = [0u8; N];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::kdf::derive;

    const SEED: &str = "1111111111111111111111111111111111111111111111111111111111111111";

    fn leaf_from(envelope: Envelope, path: KeyPath) -> EncryptedLeaf {
        EncryptedLeaf {
            path,
            algorithm: envelope.algorithm,
            ciphertext: envelope.data,
            nonce: envelope.iv,
            tag: envelope.tag.try_into().unwrap(),
            value_type: envelope.value_type,
        }
    }

    #[test]
    fn both_algorithms_open_what_they_seal() {
        let keys = derive(SEED).unwrap();
        let path = KeyPath::root().child_key("token");

        for algorithm in [AeadAlgorithm::Aes256Gcm, AeadAlgorithm::XChaCha20Poly1305] {
            let envelope = encrypt_leaf(algorithm, &keys, &path, b"hunter2", ValueType::Str).unwrap();
            assert_eq!(envelope.iv.len(), algorithm.nonce_len());
            assert_ne!(envelope.data, b"hunter2");

            let plaintext = decrypt_leaf(&leaf_from(envelope, path.clone()), &keys).unwrap();
            assert_eq!(plaintext.as_slice(), b"hunter2");
        }
    }

    #[test]
    fn nonces_are_fresh() {
        let keys = derive(SEED).unwrap();
        let path = KeyPath::root().child_key("k");
        let a = encrypt_leaf(AeadAlgorithm::Aes256Gcm, &keys, &path, b"v", ValueType::Str).unwrap();
        let b = encrypt_leaf(AeadAlgorithm::Aes256Gcm, &keys, &path, b"v", ValueType::Str).unwrap();
        assert_ne!(a.iv, b.iv);
    }

    #[test]
    fn moved_leaf_fails_authentication() {
        let keys = derive(SEED).unwrap();
        let envelope = encrypt_leaf(
            AeadAlgorithm::Aes256Gcm,
            &keys,
            &KeyPath::root().child_key("a"),
            b"value",
            ValueType::Str,
        )
        .unwrap();

        let err = decrypt_leaf(&leaf_from(envelope, KeyPath::root().child_key("b")), &keys)
            .unwrap_err();
        assert!(matches!(
            err,
            RabbitlockError::IntegrityViolation { stage: Stage::Decrypt, ref path } if path == "b"
        ));
    }

    #[test]
    fn unknown_algorithm_is_unsupported() {
        let keys = derive(SEED).unwrap();
        let leaf = EncryptedLeaf {
            path: KeyPath::root().child_key("k"),
            algorithm: "AES128_CBC".into(),
            ciphertext: vec![1, 2, 3],
            nonce: vec![0; 16],
            tag: [0; 16],
            value_type: ValueType::Str,
        };
        assert!(matches!(
            decrypt_leaf(&leaf, &keys),
            Err(RabbitlockError::UnsupportedAlgorithm { ref algorithm, .. }) if algorithm == "AES128_CBC"
        ));
    }
}
