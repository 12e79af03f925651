//! Secrets document tree and its parser.
//!
//! Parsing separates encrypted leaves from plain values and metadata. It
//! checks everything that can be checked without key material: envelope
//! syntax, tag length, and nonce length for known algorithms. An unknown
//! algorithm identifier is kept and rejected by the decryption engine.

use serde_json::{Number, Value};
use tracing::debug;

use crate::algorithm::{AeadAlgorithm, TAG_SIZE};
use crate::error::{RabbitlockError, Result};
use crate::format::envelope::{self, Envelope, ValueType};
use crate::format::metadata::{METADATA_KEY, Metadata};
use crate::format::path::KeyPath;

/// Index of an encrypted leaf, in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LeafId(pub usize);

/// Plain leaf value, passed through decryption unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl Scalar {
    /// `None` for mappings and sequences.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(b)),
            Value::Number(n) => Some(Self::Number(n)),
            Value::String(s) => Some(Self::String(s)),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn into_json(self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(b),
            Self::Number(n) => Value::Number(n),
            Self::String(s) => Value::String(s),
        }
    }

    /// Bytes fed into the document MAC: raw text for strings, JSON text for
    /// everything else.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        match self {
            Self::Null => b"null".to_vec(),
            Self::Bool(b) => b.to_string().into_bytes(),
            Self::Number(n) => n.to_string().into_bytes(),
            Self::String(s) => s.as_bytes().to_vec(),
        }
    }
}

/// Encrypted leaf with everything needed to decrypt it on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedLeaf {
    pub path: KeyPath,
    pub algorithm: String,
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub tag: [u8; TAG_SIZE],
    pub value_type: ValueType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SecretNode {
    Mapping(Vec<(String, SecretNode)>),
    Sequence(Vec<SecretNode>),
    Plain(Scalar),
    Encrypted(LeafId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecretsDocument {
    root: SecretNode,
    leaves: Vec<EncryptedLeaf>,
    metadata: Option<Metadata>,
}

impl SecretsDocument {
    pub fn root(&self) -> &SecretNode {
        &self.root
    }

    pub fn leaves(&self) -> &[EncryptedLeaf] {
        &self.leaves
    }

    pub fn leaf(&self, id: LeafId) -> Option<&EncryptedLeaf> {
        self.leaves.get(id.0)
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }
}

/// Parses a serialized secrets document.
pub fn parse(raw: &[u8]) -> Result<SecretsDocument> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| RabbitlockError::malformed(KeyPath::root(), e.to_string()))?;

    let mut parser = Parser::default();
    let root = parser.node(value, KeyPath::root())?;

    debug!(
        leaves = parser.leaves.len(),
        has_metadata = parser.metadata.is_some(),
        "parsed secrets document"
    );

    Ok(SecretsDocument {
        root,
        leaves: parser.leaves,
        metadata: parser.metadata,
    })
}

#[derive(Default)]
struct Parser {
    leaves: Vec<EncryptedLeaf>,
    metadata: Option<Metadata>,
}

impl Parser {
    fn node(&mut self, value: Value, path: KeyPath) -> Result<SecretNode> {
        match value {
            Value::Object(map) => {
                let mut entries = Vec::with_capacity(map.len());
                for (key, child) in map {
                    if path.is_root() && key == METADATA_KEY {
                        self.metadata = Some(Metadata::from_value(child)?);
                        continue;
                    }
                    let child_path = path.child_key(&key);
                    entries.push((key, self.node(child, child_path)?));
                }
                Ok(SecretNode::Mapping(entries))
            }
            Value::Array(items) => {
                let mut nodes = Vec::with_capacity(items.len());
                for (index, child) in items.into_iter().enumerate() {
                    nodes.push(self.node(child, path.child_index(index))?);
                }
                Ok(SecretNode::Sequence(nodes))
            }
            Value::String(s) if envelope::is_envelope(&s) => self.leaf(&s, path),
            Value::String(s) => Ok(SecretNode::Plain(Scalar::String(s))),
            Value::Number(n) => Ok(SecretNode::Plain(Scalar::Number(n))),
            Value::Bool(b) => Ok(SecretNode::Plain(Scalar::Bool(b))),
            Value::Null => Ok(SecretNode::Plain(Scalar::Null)),
        }
    }

    fn leaf(&mut self, raw: &str, path: KeyPath) -> Result<SecretNode> {
        let envelope =
            Envelope::parse(raw).map_err(|e| RabbitlockError::malformed(&path, e.to_string()))?;

        let tag: [u8; TAG_SIZE] = envelope.tag.as_slice().try_into().map_err(|_| {
            RabbitlockError::malformed(&path, format!("authentication tag must be {TAG_SIZE} bytes"))
        })?;

        if let Some(algorithm) = AeadAlgorithm::from_id(&envelope.algorithm) {
            if envelope.iv.len() != algorithm.nonce_len() {
                return Err(RabbitlockError::malformed(
                    &path,
                    format!("{algorithm} nonce must be {} bytes", algorithm.nonce_len()),
                ));
            }
        }

        let id = LeafId(self.leaves.len());
        self.leaves.push(EncryptedLeaf {
            path,
            algorithm: envelope.algorithm,
            ciphertext: envelope.data,
            nonce: envelope.iv,
            tag,
            value_type: envelope.value_type,
        });

        Ok(SecretNode::Encrypted(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEAF: &str = "ENC[AES256_GCM,data:AAAA,iv:AAAAAAAAAAAAAAAA,tag:AAAAAAAAAAAAAAAAAAAAAA==,type:str]";

    #[test]
    fn separates_leaves_plain_values_and_metadata() {
        let raw = format!(
            r#"{{"db": {{"password": "{LEAF}", "port": 5432}}, "hosts": ["a", "{LEAF}"],
                "debug": true, "sops": {{"version": "1", "mac": "00"}}}}"#
        );
        let doc = parse(raw.as_bytes()).unwrap();

        assert_eq!(doc.leaves().len(), 2);
        assert_eq!(doc.leaves()[0].path.to_string(), "db.password");
        assert_eq!(doc.leaves()[1].path.to_string(), "hosts[1]");
        assert_eq!(doc.metadata().and_then(|m| m.mac.as_deref()), Some("00"));

        let SecretNode::Mapping(entries) = doc.root() else {
            panic!("root should be a mapping");
        };
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["db", "hosts", "debug"]);
        assert_eq!(entries[2].1, SecretNode::Plain(Scalar::Bool(true)));
    }

    #[test]
    fn metadata_key_is_only_reserved_at_root() {
        let raw = r#"{"nested": {"sops": "plain"}}"#;
        let doc = parse(raw.as_bytes()).unwrap();
        assert!(doc.metadata().is_none());
        assert_eq!(
            doc.root(),
            &SecretNode::Mapping(vec![(
                "nested".into(),
                SecretNode::Mapping(vec![(
                    "sops".into(),
                    SecretNode::Plain(Scalar::String("plain".into()))
                )])
            )])
        );
    }

    #[test]
    fn syntax_error_is_malformed() {
        let err = parse(b"{\"db\": ").unwrap_err();
        assert!(matches!(err, RabbitlockError::MalformedDocument { .. }));
    }

    #[test]
    fn short_tag_is_malformed() {
        let raw = r#"{"k": "ENC[AES256_GCM,data:AAAA,iv:AAAAAAAAAAAAAAAA,tag:AAAA,type:str]"}"#;
        let err = parse(raw.as_bytes()).unwrap_err();
        match err {
            RabbitlockError::MalformedDocument { path, .. } => assert_eq!(path, "k"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn nonce_length_is_checked_for_known_algorithms_only() {
        let wrong = r#"{"k": "ENC[XCHACHA20_POLY1305,data:AAAA,iv:AAAAAAAAAAAAAAAA,tag:AAAAAAAAAAAAAAAAAAAAAA==]"}"#;
        assert!(matches!(
            parse(wrong.as_bytes()),
            Err(RabbitlockError::MalformedDocument { .. })
        ));

        let unknown = r#"{"k": "ENC[ROT13,data:AAAA,iv:AA==,tag:AAAAAAAAAAAAAAAAAAAAAA==]"}"#;
        let doc = parse(unknown.as_bytes()).unwrap();
        assert_eq!(doc.leaves()[0].algorithm, "ROT13");
    }

    #[test]
    fn unsupported_metadata_version_is_malformed() {
        let raw = r#"{"a": 1, "sops": {"version": "9"}}"#;
        assert!(matches!(
            parse(raw.as_bytes()),
            Err(RabbitlockError::MalformedDocument { .. })
        ));
    }
}
