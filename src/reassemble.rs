//! Rebuilds the document tree with decrypted values in place of the
//! encrypted leaves. The output has exactly the shape of the input.

use std::collections::BTreeMap;

use serde_json::Number;
use zeroize::Zeroizing;

use crate::error::{RabbitlockError, Result};
use crate::format::{LeafId, Scalar, SecretNode, SecretsDocument, ValueType};
use crate::plaintext::{PlainValue, PlaintextDocument};

/// Decrypted leaf bytes keyed by leaf id. Wiped on drop.
#[derive(Default)]
pub struct DecryptedLeaves(BTreeMap<LeafId, Zeroizing<Vec<u8>>>);

impl DecryptedLeaves {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: LeafId) -> Option<&[u8]> {
        self.0.get(&id).map(|bytes| bytes.as_slice())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(LeafId, Zeroizing<Vec<u8>>)> for DecryptedLeaves {
    fn from_iter<I: IntoIterator<Item = (LeafId, Zeroizing<Vec<u8>>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Substitutes decrypted values into `doc`.
///
/// Each value is typed per its envelope: `str` becomes a string when it is
/// valid UTF-8 and bytes otherwise. A value that does not parse as its
/// declared type is reported without echoing it.
pub fn reassemble(doc: &SecretsDocument, decrypted: &DecryptedLeaves) -> Result<PlaintextDocument> {
    let root = rebuild(doc, doc.root(), decrypted)?;
    Ok(PlaintextDocument::new(root))
}

fn rebuild(doc: &SecretsDocument, node: &SecretNode, decrypted: &DecryptedLeaves) -> Result<PlainValue> {
    match node {
        SecretNode::Mapping(entries) => {
            let mut out = Vec::with_capacity(entries.len());
            for (key, child) in entries {
                out.push((key.clone(), rebuild(doc, child, decrypted)?));
            }
            Ok(PlainValue::Mapping(out))
        }
        SecretNode::Sequence(items) => items
            .iter()
            .map(|child| rebuild(doc, child, decrypted))
            .collect::<Result<Vec<_>>>()
            .map(PlainValue::Sequence),
        SecretNode::Plain(scalar) => Ok(plain(scalar)),
        SecretNode::Encrypted(id) => {
            let leaf = doc
                .leaf(*id)
                .ok_or_else(|| RabbitlockError::malformed("<document>", "dangling leaf reference"))?;
            let bytes = decrypted
                .get(*id)
                .ok_or_else(|| RabbitlockError::malformed(&leaf.path, "leaf was not decrypted"))?;
            typed(bytes, leaf.value_type)
                .ok_or_else(|| {
                    RabbitlockError::malformed(
                        &leaf.path,
                        format!("decrypted value is not a valid `{}`", leaf.value_type.as_str()),
                    )
                })
        }
    }
}

fn plain(scalar: &Scalar) -> PlainValue {
    match scalar {
        Scalar::Null => PlainValue::Null,
        Scalar::Bool(b) => PlainValue::Bool(*b),
        Scalar::Number(n) => PlainValue::Number(n.clone()),
        Scalar::String(s) => PlainValue::String(s.clone()),
    }
}

fn typed(bytes: &[u8], value_type: ValueType) -> Option<PlainValue> {
    match value_type {
        ValueType::Str => Some(match std::str::from_utf8(bytes) {
            Ok(text) => PlainValue::String(text.to_owned()),
            Err(_) => PlainValue::Bytes(bytes.to_vec()),
        }),
        ValueType::Bytes => Some(PlainValue::Bytes(bytes.to_vec())),
        ValueType::Int => {
            let text = std::str::from_utf8(bytes).ok()?;
            text.parse::<i64>()
                .map(Number::from)
                .or_else(|_| text.parse::<u64>().map(Number::from))
                .ok()
                .map(PlainValue::Number)
        }
        ValueType::Float => {
            let text = std::str::from_utf8(bytes).ok()?;
            let value = text.parse::<f64>().ok()?;
            Number::from_f64(value).map(PlainValue::Number)
        }
        ValueType::Bool => match bytes {
            b"True" | b"true" => Some(PlainValue::Bool(true)),
            b"False" | b"false" => Some(PlainValue::Bool(false)),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_values() {
        assert_eq!(typed(b"abc", ValueType::Str), Some(PlainValue::String("abc".into())));
        assert_eq!(typed(&[0xc3, 0x28], ValueType::Str), Some(PlainValue::Bytes(vec![0xc3, 0x28])));
        assert_eq!(typed(b"abc", ValueType::Bytes), Some(PlainValue::Bytes(b"abc".to_vec())));
        assert_eq!(typed(b"-42", ValueType::Int), Some(PlainValue::Number((-42i64).into())));
        assert_eq!(
            typed(b"18446744073709551615", ValueType::Int),
            Some(PlainValue::Number(u64::MAX.into()))
        );
        assert_eq!(
            typed(b"2.5", ValueType::Float),
            Number::from_f64(2.5).map(PlainValue::Number)
        );
        assert_eq!(typed(b"True", ValueType::Bool), Some(PlainValue::Bool(true)));
        assert_eq!(typed(b"false", ValueType::Bool), Some(PlainValue::Bool(false)));
    }

    #[test]
    fn type_mismatches_are_rejected() {
        assert_eq!(typed(b"4.2", ValueType::Int), None);
        assert_eq!(typed(b"NaN", ValueType::Float), None);
        assert_eq!(typed(b"yes", ValueType::Bool), None);
    }

    #[test]
    fn missing_decrypted_leaf_is_reported() {
        let doc = crate::format::parse(
            br#"{"k": "ENC[AES256_GCM,data:AAAA,iv:AAAAAAAAAAAAAAAA,tag:AAAAAAAAAAAAAAAAAAAAAA==]"}"#,
        )
        .unwrap();
        let err = reassemble(&doc, &DecryptedLeaves::new()).unwrap_err();
        assert!(matches!(err, RabbitlockError::MalformedDocument { ref path, .. } if path == "k"));
    }

    #[test]
    fn mismatch_error_does_not_echo_value() {
        let doc = crate::format::parse(
            br#"{"n": "ENC[AES256_GCM,data:AAAA,iv:AAAAAAAAAAAAAAAA,tag:AAAAAAAAAAAAAAAAAAAAAA==,type:int]"}"#,
        )
        .unwrap();
        let decrypted: DecryptedLeaves =
            [(LeafId(0), Zeroizing::new(b"s3cr3t".to_vec()))].into_iter().collect();
        let err = reassemble(&doc, &decrypted).unwrap_err();
        assert!(!err.to_string().contains("s3cr3t"));
    }
}
