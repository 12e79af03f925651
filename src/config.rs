//! Loader configuration and per-call options.
//!
//! A [`LoaderConfig`] ties a seed to a document path. It is built
//! explicitly or from the environment:
//!
//! | variable               | meaning                       | default         |
//! |------------------------|-------------------------------|-----------------|
//! | `RABBITLOCK_SEED_HEX`  | hex seed                      | required        |
//! | `RABBITLOCK_SOPS_PATH` | secrets document path         | `env.sops.json` |
//! | `RABBITLOCK_WORKERS`   | decryption pool size          | rayon default   |

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;
use zeroize::Zeroizing;

use crate::algorithm::AeadAlgorithm;
use crate::decrypt;
use crate::env::flatten;
use crate::error::{RabbitlockError, Result};
use crate::plaintext::PlaintextDocument;

pub const SEED_ENV: &str = "RABBITLOCK_SEED_HEX";
pub const DOCUMENT_ENV: &str = "RABBITLOCK_SOPS_PATH";
pub const WORKERS_ENV: &str = "RABBITLOCK_WORKERS";
pub const DEFAULT_DOCUMENT_PATH: &str = "env.sops.json";

/// Suffix marking keys whose subtree is written in the clear.
pub const DEFAULT_UNENCRYPTED_SUFFIX: &str = "_unencrypted";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptOptions {
    /// Threads of a dedicated decryption pool; `None` uses rayon's global pool.
    pub workers: Option<usize>,
    /// Reject documents without a MAC. On by default; turning it off skips
    /// verification for documents sealed without one.
    pub require_mac: bool,
}

impl Default for DecryptOptions {
    fn default() -> Self {
        Self {
            workers: None,
            require_mac: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptOptions {
    pub algorithm: AeadAlgorithm,
    /// Also encrypt numbers and booleans. Strings are always encrypted.
    pub encrypt_scalars: bool,
    pub unencrypted_suffix: Option<String>,
    /// Write the metadata block with a document MAC. Needs a mapping root.
    pub with_mac: bool,
}

impl Default for EncryptOptions {
    fn default() -> Self {
        Self {
            algorithm: AeadAlgorithm::default(),
            encrypt_scalars: false,
            unencrypted_suffix: Some(DEFAULT_UNENCRYPTED_SUFFIX.to_owned()),
            with_mac: true,
        }
    }
}

pub struct LoaderConfig {
    seed_hex: Zeroizing<String>,
    document_path: PathBuf,
    options: DecryptOptions,
}

impl LoaderConfig {
    pub fn new(seed_hex: impl Into<String>, document_path: impl Into<PathBuf>) -> Self {
        Self {
            seed_hex: Zeroizing::new(seed_hex.into()),
            document_path: document_path.into(),
            options: DecryptOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DecryptOptions) -> Self {
        self.options = options;
        self
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`LoaderConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let seed_hex = non_empty(SEED_ENV)
            .ok_or(RabbitlockError::InvalidSeedFormat("missing seed, set RABBITLOCK_SEED_HEX"))?;

        let document_path = non_empty(DOCUMENT_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DOCUMENT_PATH));

        let workers = non_empty(WORKERS_ENV)
            .map(|raw| {
                raw.trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|threads| *threads > 0)
                    .ok_or_else(|| {
                        RabbitlockError::Config(format!("{WORKERS_ENV} must be a positive integer"))
                    })
            })
            .transpose()?;

        Ok(Self::new(seed_hex, document_path).with_options(DecryptOptions {
            workers,
            ..DecryptOptions::default()
        }))
    }

    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    pub fn options(&self) -> &DecryptOptions {
        &self.options
    }

    /// Decrypts the configured document.
    pub fn load(&self) -> Result<PlaintextDocument> {
        debug!(
            path = %self.document_path.display(),
            workers = ?self.options.workers,
            "loading secrets document"
        );
        decrypt::decrypt_file(&self.document_path, &self.seed_hex, &self.options)
    }

    /// Decrypts the configured document and flattens it to `(NAME, value)`
    /// pairs. Nothing is written to the process environment.
    pub fn load_env(&self) -> Result<Vec<(String, String)>> {
        Ok(flatten(&self.load()?))
    }
}

impl fmt::Debug for LoaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderConfig")
            .field("seed_hex", &"<redacted>")
            .field("document_path", &self.document_path)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_only_seed_is_set() {
        let config = LoaderConfig::from_lookup(lookup(&[(SEED_ENV, "ab")])).unwrap();
        assert_eq!(config.document_path(), Path::new(DEFAULT_DOCUMENT_PATH));
        assert_eq!(config.options(), &DecryptOptions::default());
        assert!(config.options().require_mac);
    }

    #[test]
    fn reads_path_and_workers() {
        let config = LoaderConfig::from_lookup(lookup(&[
            (SEED_ENV, "ab"),
            (DOCUMENT_ENV, "/etc/app/secrets.json"),
            (WORKERS_ENV, " 4 "),
        ]))
        .unwrap();
        assert_eq!(config.document_path(), Path::new("/etc/app/secrets.json"));
        assert_eq!(config.options().workers, Some(4));
    }

    #[test]
    fn missing_or_blank_seed_is_rejected() {
        for vars in [&[][..], &[(SEED_ENV, "  ")][..]] {
            let err = LoaderConfig::from_lookup(lookup(vars)).unwrap_err();
            assert!(matches!(err, RabbitlockError::InvalidSeedFormat(_)));
        }
    }

    #[test]
    fn bad_worker_count_is_rejected() {
        for raw in ["0", "-1", "many"] {
            let err = LoaderConfig::from_lookup(lookup(&[(SEED_ENV, "ab"), (WORKERS_ENV, raw)]))
                .unwrap_err();
            assert!(matches!(err, RabbitlockError::Config(_)), "{raw}");
        }
    }

    #[test]
    fn debug_redacts_seed() {
        let config = LoaderConfig::new("deadbeef", "x.json");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("deadbeef"));
        assert!(rendered.contains("<redacted>"));
    }
}
