//! Document metadata stored under the reserved root key.

use serde::{Deserialize, Serialize};

use crate::error::{RabbitlockError, Result};

/// Root key holding [`Metadata`]. Never part of the decrypted output.
pub const METADATA_KEY: &str = "sops";

/// Metadata layout version written and accepted by this crate.
pub const FORMAT_VERSION: &str = "1";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Opaque timestamp, fed into the document MAC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastmodified: Option<String>,

    /// Hex HMAC-SHA256 over every value of the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
}

impl Metadata {
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let metadata: Self = serde_json::from_value(value)
            .map_err(|e| RabbitlockError::malformed(METADATA_KEY, e.to_string()))?;

        match metadata.version.as_deref() {
            None | Some(FORMAT_VERSION) => Ok(metadata),
            Some(_) => Err(RabbitlockError::malformed(
                METADATA_KEY,
                "unsupported metadata version",
            )),
        }
    }
}
