//! Secrets document format: per-leaf `ENC[...]` envelopes inside JSON.

pub mod document;
pub mod envelope;
pub mod metadata;
pub mod path;

pub use document::{EncryptedLeaf, LeafId, Scalar, SecretNode, SecretsDocument, parse};
pub use envelope::{Envelope, ValueType};
pub use metadata::Metadata;
pub use path::KeyPath;
