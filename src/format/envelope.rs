//! `ENC[...]` envelope: the string form of an encrypted leaf.
//!
//! ```text
//! ENC[AES256_GCM,data:<b64>,iv:<b64>,tag:<b64>,type:str]
//! ```
//!
//! Field values are standard padded base64. `data`, `iv` and `tag` are
//! mandatory, `type` defaults to `str`. Error messages never include field
//! values.

use base64::{Engine, engine::general_purpose::STANDARD};
use thiserror::Error;

pub const ENC_PREFIX: &str = "ENC[";
const ENC_SUFFIX: &str = "]";

/// Declared type of the plaintext behind an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueType {
    #[default]
    Str,
    Int,
    Float,
    Bool,
    Bytes,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Bytes => "bytes",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "str" => Some(Self::Str),
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "bool" => Some(Self::Bool),
            "bytes" => Some(Self::Bytes),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("envelope is not terminated by `]`")]
    Unterminated,

    #[error("missing algorithm identifier")]
    MissingAlgorithm,

    #[error("missing `{0}` field")]
    MissingField(&'static str),

    #[error("duplicate `{0}` field")]
    DuplicateField(&'static str),

    #[error("unknown or malformed field")]
    UnknownField,

    #[error("`{0}` field is not valid base64")]
    InvalidBase64(&'static str),

    #[error("unknown value type `{0}`")]
    UnknownType(String),
}

/// Parsed envelope. Lengths are not checked here; that depends on the
/// algorithm and is done by the document parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub algorithm: String,
    pub data: Vec<u8>,
    pub iv: Vec<u8>,
    pub tag: Vec<u8>,
    pub value_type: ValueType,
}

pub fn is_envelope(value: &str) -> bool {
    value.starts_with(ENC_PREFIX)
}

impl Envelope {
    pub fn parse(value: &str) -> Result<Self, EnvelopeError> {
        let body = value
            .strip_prefix(ENC_PREFIX)
            .and_then(|rest| rest.strip_suffix(ENC_SUFFIX))
            .ok_or(EnvelopeError::Unterminated)?;

        let mut parts = body.split(',');
        let algorithm = parts
            .next()
            .filter(|id| !id.is_empty() && !id.contains(':'))
            .ok_or(EnvelopeError::MissingAlgorithm)?;

        let mut data = None;
        let mut iv = None;
        let mut tag = None;
        let mut value_type = None;

        for part in parts {
            let (name, raw) = part.split_once(':').ok_or(EnvelopeError::UnknownField)?;
            match name {
                "data" => set_once(&mut data, "data", decode_field("data", raw)?)?,
                "iv" => set_once(&mut iv, "iv", decode_field("iv", raw)?)?,
                "tag" => set_once(&mut tag, "tag", decode_field("tag", raw)?)?,
                "type" => {
                    let parsed = ValueType::from_name(raw)
                        .ok_or_else(|| EnvelopeError::UnknownType(raw.to_owned()))?;
                    set_once(&mut value_type, "type", parsed)?;
                }
                _ => return Err(EnvelopeError::UnknownField),
            }
        }

        Ok(Self {
            algorithm: algorithm.to_owned(),
            data: data.ok_or(EnvelopeError::MissingField("data"))?,
            iv: iv.ok_or(EnvelopeError::MissingField("iv"))?,
            tag: tag.ok_or(EnvelopeError::MissingField("tag"))?,
            value_type: value_type.unwrap_or_default(),
        })
    }

    pub fn render(&self) -> String {
        format!(
            "{ENC_PREFIX}{},data:{},iv:{},tag:{},type:{}{ENC_SUFFIX}",
            self.algorithm,
            STANDARD.encode(&self.data),
            STANDARD.encode(&self.iv),
            STANDARD.encode(&self.tag),
            self.value_type.as_str(),
        )
    }
}

fn decode_field(name: &'static str, raw: &str) -> Result<Vec<u8>, EnvelopeError> {
    STANDARD
        .decode(raw)
        .map_err(|_| EnvelopeError::InvalidBase64(name))
}

fn set_once<T>(slot: &mut Option<T>, name: &'static str, value: T) -> Result<(), EnvelopeError> {
    if slot.is_some() {
        return Err(EnvelopeError::DuplicateField(name));
    }
    *slot = Some(value);
    Ok(())
}
