//! Decrypted document handed back to the caller.

use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::{Number, Value};
use zeroize::Zeroize;

use crate::error::{RabbitlockError, Result};
use crate::format::KeyPath;

/// A node of a decrypted document.
///
/// `Bytes` holds decrypted values that are not UTF-8 text; it serializes as
/// standard base64. `Debug` prints the shape only, never string or byte
/// contents.
#[derive(Clone, Default, PartialEq)]
pub enum PlainValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Bytes(Vec<u8>),
    Mapping(Vec<(String, PlainValue)>),
    Sequence(Vec<PlainValue>),
}

impl PlainValue {
    /// Looks up a key of a mapping.
    pub fn get(&self, key: &str) -> Option<&PlainValue> {
        match self {
            Self::Mapping(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn index(&self, index: usize) -> Option<&PlainValue> {
        match self {
            Self::Sequence(items) => items.get(index),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Self::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// JSON view of the value; bytes become base64 strings.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::Bytes(b) => Value::String(STANDARD.encode(b)),
            Self::Mapping(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Sequence(items) => Value::Array(items.iter().map(PlainValue::to_json).collect()),
        }
    }

    /// Visits every scalar with its path, in document order.
    pub fn walk_scalars<F>(&self, mut visit: F)
    where
        F: FnMut(&KeyPath, &PlainValue),
    {
        self.walk_inner(&KeyPath::root(), &mut visit);
    }

    fn walk_inner<F>(&self, path: &KeyPath, visit: &mut F)
    where
        F: FnMut(&KeyPath, &PlainValue),
    {
        match self {
            Self::Mapping(entries) => {
                for (key, child) in entries {
                    child.walk_inner(&path.child_key(key), visit);
                }
            }
            Self::Sequence(items) => {
                for (index, child) in items.iter().enumerate() {
                    child.walk_inner(&path.child_index(index), visit);
                }
            }
            scalar => visit(path, scalar),
        }
    }
}

impl fmt::Debug for PlainValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::String(_) => f.write_str("String(<redacted>)"),
            Self::Bytes(b) => write!(f, "Bytes(<{} bytes redacted>)", b.len()),
            Self::Mapping(entries) => f
                .debug_map()
                .entries(entries.iter().map(|(k, v)| (k, v)))
                .finish(),
            Self::Sequence(items) => f.debug_list().entries(items).finish(),
        }
    }
}

impl Zeroize for PlainValue {
    fn zeroize(&mut self) {
        match self {
            Self::String(s) => s.zeroize(),
            Self::Bytes(b) => b.zeroize(),
            Self::Mapping(entries) => {
                for (key, child) in entries.iter_mut() {
                    key.zeroize();
                    child.zeroize();
                }
            }
            Self::Sequence(items) => items.iter_mut().for_each(Zeroize::zeroize),
            Self::Null | Self::Bool(_) | Self::Number(_) => {}
        }
        *self = Self::Null;
    }
}

impl Serialize for PlainValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Bytes(b) => serializer.serialize_str(&STANDARD.encode(b)),
            Self::Mapping(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Self::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// Decrypted document, same shape as the input minus the metadata block.
///
/// Owned by the caller; every string and byte buffer is wiped on drop.
#[derive(PartialEq)]
pub struct PlaintextDocument {
    root: PlainValue,
}

impl PlaintextDocument {
    pub(crate) fn new(root: PlainValue) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &PlainValue {
        &self.root
    }

    pub fn get(&self, key: &str) -> Option<&PlainValue> {
        self.root.get(key)
    }

    pub fn to_json(&self) -> Value {
        self.root.to_json()
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(&self.root)
            .map_err(|e| RabbitlockError::malformed(KeyPath::root(), e.to_string()))
    }

    pub fn to_json_string_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.root)
            .map_err(|e| RabbitlockError::malformed(KeyPath::root(), e.to_string()))
    }
}

impl fmt::Debug for PlaintextDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaintextDocument")
            .field("root", &self.root)
            .finish()
    }
}

impl Drop for PlaintextDocument {
    fn drop(&mut self) {
        self.root.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> PlainValue {
        PlainValue::Mapping(vec![
            (
                "db".into(),
                PlainValue::Mapping(vec![("password".into(), PlainValue::String("pw".into()))]),
            ),
            ("blob".into(), PlainValue::Bytes(vec![0xff, 0x00])),
            (
                "ports".into(),
                PlainValue::Sequence(vec![PlainValue::Number(Number::from(80u16)), PlainValue::Null]),
            ),
        ])
    }

    #[test]
    fn json_view_keeps_order_and_encodes_bytes() {
        let doc = PlaintextDocument::new(sample());
        assert_eq!(
            doc.to_json(),
            json!({"db": {"password": "pw"}, "blob": "/wA=", "ports": [80, null]})
        );
        assert_eq!(
            doc.to_json_string().unwrap(),
            r#"{"db":{"password":"pw"},"blob":"/wA=","ports":[80,null]}"#
        );
    }

    #[test]
    fn accessors() {
        let value = sample();
        assert_eq!(
            value
                .get("db")
                .and_then(|db| db.get("password"))
                .and_then(PlainValue::as_str),
            Some("pw")
        );
        assert_eq!(value.get("blob").and_then(PlainValue::as_bytes), Some(&[0xff, 0x00][..]));
        assert!(value.get("ports").and_then(|p| p.index(1)).is_some_and(PlainValue::is_null));
        assert_eq!(
            value.get("ports").and_then(|p| p.index(0)).and_then(PlainValue::as_number),
            Some(&Number::from(80u16))
        );
        assert!(value.get("missing").is_none());
    }

    #[test]
    fn walk_visits_scalars_in_order() {
        let mut seen = Vec::new();
        sample().walk_scalars(|path, _| seen.push(path.to_string()));
        assert_eq!(seen, ["db.password", "blob", "ports[0]", "ports[1]"]);
    }

    #[test]
    fn debug_hides_strings_and_bytes() {
        let doc = PlaintextDocument::new(sample());
        let rendered = format!("{doc:?}");
        assert!(!rendered.contains("\"pw\""));
        assert!(rendered.contains("\"password\": String(<redacted>)"));
        assert!(rendered.contains("Bytes(<2 bytes redacted>)"));
        assert!(rendered.contains("Number(80)"));
    }

    #[test]
    fn zeroize_clears_to_null() {
        let mut value = sample();
        value.zeroize();
        assert!(value.is_null());
    }
}
