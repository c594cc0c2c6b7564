//! Identity fields and their canonical serialization
//!
//! Callers hand in arbitrary name/value pairs. They are validated once, at
//! construction, into a `FieldSet`; everything downstream works with types
//! that cannot hold an invalid name or an oversized value.
//!
//! The canonical form is what the integrity tag is computed over, so issuer
//! and verifier must produce byte-identical output for the same fields:
//! compact JSON, keys in ascending byte order, UTF-8, no whitespace.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Longest accepted field value, in characters
pub const MAX_VALUE_LEN: usize = 500;

/// Payload key that carries the one-time code
pub const CODE_FIELD: &str = "totp";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("At least one field is required")]
    Empty,

    #[error("Field name must not be empty")]
    EmptyName,

    #[error("Invalid field name '{0}': only letters, digits and underscores are allowed")]
    InvalidName(String),

    #[error("Field '{0}' is reserved")]
    ReservedName(String),

    #[error("Field '{0}' must not be empty")]
    EmptyValue(String),

    #[error("Field '{field}' is {len} characters long, the limit is {MAX_VALUE_LEN}")]
    ValueTooLong { field: String, len: usize },

    #[error("Field '{0}' given more than once")]
    DuplicateField(String),

    #[error("Payload must be a JSON object of string values")]
    NotAnObject,

    #[error("Invalid payload JSON: {0}")]
    Json(String),
}

/// Field name restricted to `[A-Za-z0-9_]+`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldName(String);

impl FieldName {
    pub fn parse(name: &str) -> Result<Self, PayloadError> {
        if name.is_empty() {
            return Err(PayloadError::EmptyName);
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(PayloadError::InvalidName(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Non-blank value of at most [`MAX_VALUE_LEN`] characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue(String);

impl FieldValue {
    pub fn parse(field: &FieldName, value: &str) -> Result<Self, PayloadError> {
        if value.trim().is_empty() {
            return Err(PayloadError::EmptyValue(field.to_string()));
        }
        let len = value.chars().count();
        if len > MAX_VALUE_LEN {
            return Err(PayloadError::ValueTooLong {
                field: field.to_string(),
                len,
            });
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validated, ordered identity fields supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSet {
    fields: Vec<(FieldName, FieldValue)>,
}

impl FieldSet {
    /// Validate caller-supplied pairs, keeping their order
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, PayloadError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut fields: Vec<(FieldName, FieldValue)> = Vec::new();
        for (name, value) in pairs {
            let name = FieldName::parse(name.as_ref())?;
            if name.as_str() == CODE_FIELD {
                return Err(PayloadError::ReservedName(name.to_string()));
            }
            if fields.iter().any(|(existing, _)| *existing == name) {
                return Err(PayloadError::DuplicateField(name.to_string()));
            }
            let value = FieldValue::parse(&name, value.as_ref())?;
            fields.push((name, value));
        }

        if fields.is_empty() {
            return Err(PayloadError::Empty);
        }
        Ok(Self { fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldName, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name, value))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field.as_str() == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Fields plus one-time code, as encrypted into a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Payload {
    fields: BTreeMap<String, String>,
}

impl Payload {
    /// Merge the one-time code into the caller's fields
    pub fn with_code(fields: &FieldSet, code: &str) -> Self {
        let mut map: BTreeMap<String, String> = fields
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.as_str().to_string()))
            .collect();
        map.insert(CODE_FIELD.to_string(), code.to_string());
        Self { fields: map }
    }

    /// Parse decrypted plaintext. Only shape is checked here; which fields
    /// must be present is the verifier's call.
    pub fn from_json(bytes: &[u8]) -> Result<Self, PayloadError> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| PayloadError::Json(e.to_string()))?;
        let serde_json::Value::Object(object) = value else {
            return Err(PayloadError::NotAnObject);
        };

        let mut fields = BTreeMap::new();
        for (name, value) in object {
            let serde_json::Value::String(value) = value else {
                return Err(PayloadError::NotAnObject);
            };
            fields.insert(name, value);
        }
        Ok(Self { fields })
    }

    /// Canonical bytes: sorted keys, compact, UTF-8
    pub fn canonical_json(&self) -> String {
        // a map of strings always serializes
        serde_json::to_string(&self.fields).unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn code(&self) -> Option<&str> {
        self.get(CODE_FIELD)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }
}
