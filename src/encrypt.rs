//! Sealing a plaintext JSON document for a seed.
//!
//! The inverse of the decryption pipeline:
//! 1. Derive key material from the seed
//! 2. Walk the document, encrypting each selected leaf under a fresh nonce
//!    and feeding every value into the document MAC
//! 3. Append the metadata block
//!
//! The output is pretty-printed JSON in the input's key order.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use std::{fs, io::Write};

use serde_json::{Map, Value};
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::config::EncryptOptions;
use crate::crypto::kdf::{self, DerivedKeyMaterial};
use crate::crypto::{encrypt_leaf, mac::DocumentMac};
use crate::error::{RabbitlockError, Result};
use crate::format::envelope;
use crate::format::metadata::{FORMAT_VERSION, METADATA_KEY, Metadata};
use crate::format::{KeyPath, Scalar, ValueType};
use crate::fs::atomic::write_atomic;

pub fn encrypt_document(
    seed_hex: &str,
    plaintext_json: &[u8],
    options: &EncryptOptions,
) -> Result<String> {
    let value: Value = serde_json::from_slice(plaintext_json)
        .map_err(|e| RabbitlockError::malformed(KeyPath::root(), e.to_string()))?;

    if let Value::Object(map) = &value {
        if map.contains_key(METADATA_KEY) {
            return Err(RabbitlockError::malformed(
                METADATA_KEY,
                "reserved key in plaintext document",
            ));
        }
    } else if options.with_mac {
        return Err(RabbitlockError::malformed(
            KeyPath::root(),
            "document MAC needs a mapping at the root",
        ));
    }

    let keys = kdf::derive(seed_hex)?;
    let lastmodified = timestamp();

    let mut sealer = Sealer {
        keys: &keys,
        options,
        mac: DocumentMac::new(keys.mac_key(), Some(lastmodified.as_str()))?,
        sealed: 0,
    };
    let mut out = sealer.node(value, &KeyPath::root(), false)?;
    let Sealer { mac, sealed, .. } = sealer;

    if options.with_mac {
        let metadata = Metadata {
            version: Some(FORMAT_VERSION.to_owned()),
            lastmodified: Some(lastmodified),
            mac: Some(mac.finalize_hex()),
        };
        let metadata = serde_json::to_value(metadata)
            .map_err(|e| RabbitlockError::malformed(METADATA_KEY, e.to_string()))?;
        if let Value::Object(map) = &mut out {
            map.insert(METADATA_KEY.to_owned(), metadata);
        }
    }

    debug!(leaves = sealed, algorithm = %options.algorithm, "encrypted secrets document");

    serde_json::to_string_pretty(&out)
        .map_err(|e| RabbitlockError::malformed(KeyPath::root(), e.to_string()))
}

pub fn encrypt_file(
    input: &Path,
    output: &Path,
    seed_hex: &str,
    options: &EncryptOptions,
) -> Result<()> {
    let plaintext = Zeroizing::new(fs::read(input)?);
    let sealed = encrypt_document(seed_hex, &plaintext, options)?;

    write_atomic(output, |file| file.write_all(sealed.as_bytes()))?;
    debug!(path = %output.display(), "wrote secrets document");

    Ok(())
}

struct Sealer<'a> {
    keys: &'a DerivedKeyMaterial,
    options: &'a EncryptOptions,
    mac: DocumentMac,
    sealed: usize,
}

impl Sealer<'_> {
    fn node(&mut self, value: Value, path: &KeyPath, keep_plain: bool) -> Result<Value> {
        match value {
            Value::Object(map) => {
                self.mac.update_mapping(path, map.len());
                let mut out = Map::with_capacity(map.len());
                for (key, child) in map {
                    let plain = keep_plain || self.is_unencrypted(&key);
                    let child = self.node(child, &path.child_key(&key), plain)?;
                    out.insert(key, child);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                self.mac.update_sequence(path, items.len());
                items
                    .into_iter()
                    .enumerate()
                    .map(|(index, child)| self.node(child, &path.child_index(index), keep_plain))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Array)
            }
            scalar if keep_plain => self.plain(scalar, path),
            scalar => self.leaf(scalar, path),
        }
    }

    fn is_unencrypted(&self, key: &str) -> bool {
        self.options
            .unencrypted_suffix
            .as_deref()
            .is_some_and(|suffix| !suffix.is_empty() && key.ends_with(suffix))
    }

    fn leaf(&mut self, value: Value, path: &KeyPath) -> Result<Value> {
        let Some((bytes, value_type)) = self.encode(&value) else {
            return self.plain(value, path);
        };

        let envelope = encrypt_leaf(self.options.algorithm, self.keys, path, &bytes, value_type)?;
        self.mac.update_secret(path, &bytes);
        self.sealed += 1;

        if let Value::String(mut s) = value {
            s.zeroize();
        }

        Ok(Value::String(envelope.render()))
    }

    /// Bytes to encrypt for a scalar, or `None` when it stays plain.
    fn encode(&self, value: &Value) -> Option<(Zeroizing<Vec<u8>>, ValueType)> {
        let (bytes, value_type) = match value {
            Value::String(s) => (s.as_bytes().to_vec(), ValueType::Str),
            Value::Number(n) if self.options.encrypt_scalars => {
                let value_type = if n.is_f64() { ValueType::Float } else { ValueType::Int };
                (n.to_string().into_bytes(), value_type)
            }
            Value::Bool(b) if self.options.encrypt_scalars => {
                let text = if *b { "True" } else { "False" };
                (text.as_bytes().to_vec(), ValueType::Bool)
            }
            _ => return None,
        };
        Some((Zeroizing::new(bytes), value_type))
    }

    fn plain(&mut self, value: Value, path: &KeyPath) -> Result<Value> {
        let scalar = Scalar::from_json(value)
            .ok_or_else(|| RabbitlockError::malformed(path, "expected a scalar value"))?;

        if let Scalar::String(s) = &scalar {
            if envelope::is_envelope(s) {
                return Err(RabbitlockError::malformed(
                    path,
                    "plain value would be read back as an encrypted leaf",
                ));
            }
        }

        self.mac.update_plain(path, &scalar.canonical_bytes());
        Ok(scalar.into_json())
    }
}

fn timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        .to_string()
}
