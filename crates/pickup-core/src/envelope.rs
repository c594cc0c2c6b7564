//! Wire envelope
//!
//! Current shape, produced by the issuer:
//!
//! ```json
//! {"t":"SS","d":"<base64 ciphertext>","h":"<base64 tag>","k":"<key code>"}
//! ```
//!
//! Two older shapes are still accepted by the verifier: `{"T":..,"DATA":..}`
//! and bare base64 ciphertext. Neither carries a tag.

use pickup_crypto::CipherSuite;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("Envelope is empty")]
    Empty,

    #[error("Envelope must be a JSON object")]
    NotAnObject,

    #[error("Envelope has no ciphertext")]
    MissingData,

    #[error("Unsupported data type '{0}'")]
    UnsupportedDataType(String),

    #[error("Envelope field '{0}' must be a string")]
    Malformed(&'static str),

    #[error("Invalid envelope JSON: {0}")]
    Json(String),
}

/// Encryption strategy tag carried in `t`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    #[default]
    #[serde(rename = "SS")]
    Ecies,
    #[serde(rename = "RS")]
    Rsa,
}

impl DataType {
    pub fn as_tag(self) -> &'static str {
        match self {
            DataType::Ecies => "SS",
            DataType::Rsa => "RS",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "SS" => Some(DataType::Ecies),
            "RS" => Some(DataType::Rsa),
            _ => None,
        }
    }

    pub fn suite(self) -> CipherSuite {
        match self {
            DataType::Ecies => CipherSuite::Ecies,
            DataType::Rsa => CipherSuite::RsaOaep,
        }
    }

    pub fn for_suite(suite: CipherSuite) -> Self {
        match suite {
            CipherSuite::Ecies => DataType::Ecies,
            CipherSuite::RsaOaep => DataType::Rsa,
        }
    }
}

/// Canonical envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub t: DataType,
    pub d: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,
}

impl Envelope {
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(|e| EnvelopeError::Json(e.to_string()))
    }
}

/// Deprecated `{T, DATA}` envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyEnvelope {
    #[serde(rename = "T")]
    pub t: DataType,
    #[serde(rename = "DATA")]
    pub data: String,
}

/// Which shape an input arrived in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    Current,
    Legacy,
    Bare,
}

/// Anything the verifier may be handed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireInput {
    Current(Envelope),
    Legacy(LegacyEnvelope),
    /// Base64 ciphertext with no wrapper
    Bare(String),
}

impl WireInput {
    /// Discriminate by shape: a JSON object with `d` is current, one with
    /// `DATA` is legacy, anything that is not JSON is bare ciphertext.
    pub fn parse(input: &str) -> Result<Self, EnvelopeError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(EnvelopeError::Empty);
        }
        if !input.starts_with('{') && !input.starts_with('[') {
            return Ok(WireInput::Bare(input.to_string()));
        }

        let value: Value =
            serde_json::from_str(input).map_err(|e| EnvelopeError::Json(e.to_string()))?;
        let Value::Object(object) = value else {
            return Err(EnvelopeError::NotAnObject);
        };

        if object.contains_key("d") {
            Ok(WireInput::Current(Envelope {
                t: data_type(&object, "t")?,
                d: required_str(&object, "d")?,
                h: optional_str(&object, "h")?,
                k: optional_str(&object, "k")?,
            }))
        } else if object.contains_key("DATA") {
            Ok(WireInput::Legacy(LegacyEnvelope {
                t: data_type(&object, "T")?,
                data: required_str(&object, "DATA")?,
            }))
        } else {
            Err(EnvelopeError::MissingData)
        }
    }

    pub fn format(&self) -> WireFormat {
        match self {
            WireInput::Current(_) => WireFormat::Current,
            WireInput::Legacy(_) => WireFormat::Legacy,
            WireInput::Bare(_) => WireFormat::Bare,
        }
    }

    /// Declared strategy; bare ciphertext declares none
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            WireInput::Current(envelope) => Some(envelope.t),
            WireInput::Legacy(envelope) => Some(envelope.t),
            WireInput::Bare(_) => None,
        }
    }

    pub fn data(&self) -> &str {
        match self {
            WireInput::Current(envelope) => &envelope.d,
            WireInput::Legacy(envelope) => &envelope.data,
            WireInput::Bare(data) => data,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            WireInput::Current(envelope) => envelope.h.as_deref(),
            _ => None,
        }
    }

    pub fn key_code(&self) -> Option<&str> {
        match self {
            WireInput::Current(envelope) => envelope.k.as_deref(),
            _ => None,
        }
    }
}

fn optional_str(object: &Map<String, Value>, key: &'static str) -> Result<Option<String>, EnvelopeError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(EnvelopeError::Malformed(key)),
    }
}

fn required_str(object: &Map<String, Value>, key: &'static str) -> Result<String, EnvelopeError> {
    match optional_str(object, key)? {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(EnvelopeError::MissingData),
    }
}

// An absent tag means the default strategy
fn data_type(object: &Map<String, Value>, key: &'static str) -> Result<DataType, EnvelopeError> {
    match optional_str(object, key)? {
        None => Ok(DataType::default()),
        Some(tag) => DataType::from_tag(&tag).ok_or(EnvelopeError::UnsupportedDataType(tag)),
    }
}
