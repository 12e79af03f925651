use std::fmt;

use thiserror::Error;

/// Pipeline stage that detected an integrity violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Leaf authentication tag check.
    Decrypt,
    /// Document MAC check.
    Verify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Decrypt => "decrypt",
            Self::Verify => "verify",
        };
        f.write_str(name)
    }
}

/// Terminal failure of a decrypt or encrypt call.
///
/// Messages name the stage and the key path of the offending leaf. They
/// never carry ciphertext, key material or plaintext.
#[derive(Debug, Error)]
pub enum RabbitlockError {
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("invalid seed format: {0}")]
    InvalidSeedFormat(&'static str),

    #[error("malformed document at {path}: {reason}")]
    MalformedDocument { path: String, reason: String },

    #[error("unsupported algorithm `{algorithm}` at {path}")]
    UnsupportedAlgorithm { path: String, algorithm: String },

    #[error("integrity violation during {stage} at {path}")]
    IntegrityViolation { stage: Stage, path: String },

    #[error("key derivation failed")]
    DerivationFailure,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to build worker pool")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl RabbitlockError {
    pub(crate) fn malformed(path: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn integrity(stage: Stage, path: impl fmt::Display) -> Self {
        Self::IntegrityViolation {
            stage,
            path: path.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RabbitlockError>;
