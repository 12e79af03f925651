//! Key paths addressing a node inside a secrets document.

use std::fmt;

const KEY_SEGMENT: u8 = b'k';
const INDEX_SEGMENT: u8 = b'i';

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Location of a node, from the document root down.
///
/// The path doubles as the AEAD associated data of an encrypted leaf, so a
/// ciphertext moved to another location no longer authenticates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyPath(Vec<Segment>);

impl KeyPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child_key(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Key(key.to_owned()));
        Self(segments)
    }

    pub fn child_index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Index(index));
        Self(segments)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Associated data bound to a leaf. Each segment is a kind byte (`k` for
    /// a mapping key, `i` for a sequence index) followed by a big-endian
    /// `u64`: the key length then the key bytes, or the index itself. Keys
    /// containing separators or looking like indices cannot collide.
    pub fn aad(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for segment in &self.0 {
            match segment {
                Segment::Key(key) => {
                    out.push(KEY_SEGMENT);
                    out.extend_from_slice(&(key.len() as u64).to_be_bytes());
                    out.extend_from_slice(key.as_bytes());
                }
                Segment::Index(index) => {
                    out.push(INDEX_SEGMENT);
                    out.extend_from_slice(&(*index as u64).to_be_bytes());
                }
            }
        }
        out
    }

    /// Environment variable name: segments joined with `_`, upper-cased.
    /// Sequence indices always get a leading `_`, even at the root.
    pub fn env_name(&self) -> String {
        let mut out = String::new();
        for segment in &self.0 {
            match segment {
                Segment::Key(key) => {
                    if !out.is_empty() {
                        out.push('_');
                    }
                    out.push_str(key);
                }
                Segment::Index(index) => {
                    out.push('_');
                    out.push_str(&index.to_string());
                }
            }
        }
        out.to_uppercase()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }

        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => write!(f, "{key}")?,
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}
