//! Issuer and verifier settings
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::path::Path;

use pickup_crypto::{IntegrityAlgorithm, KeyDerivation, Totp, TotpError};
use pickup_qr::QrOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::envelope::DataType;
use crate::payload::{FieldName, CODE_FIELD};

/// Key code used when the caller gives none
pub const DEFAULT_KEY_CODE: &str = "default";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid one-time code settings: {0}")]
    Totp(#[from] TotpError),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    pub totp: Totp,
    pub integrity: IntegrityAlgorithm,
    pub key_derivation: KeyDerivation,
    /// Strategy used when the caller does not pick one
    pub data_type: DataType,
    pub qr: QrOptions,
    pub default_key_code: String,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            totp: Totp::default(),
            integrity: IntegrityAlgorithm::default(),
            key_derivation: KeyDerivation::default(),
            data_type: DataType::default(),
            qr: QrOptions::default(),
            default_key_code: DEFAULT_KEY_CODE.to_string(),
        }
    }
}

impl IssuerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.totp.validate()?;
        if self.qr.width == 0 || self.qr.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "QR size must be positive, got {}x{}",
                self.qr.width, self.qr.height
            )));
        }
        if self.default_key_code.trim().is_empty() {
            return Err(ConfigError::Invalid("default key code must not be blank".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    pub totp: Totp,
    pub integrity: IntegrityAlgorithm,
    pub key_derivation: KeyDerivation,
    /// Identity fields every token must carry, on top of the one-time code
    pub required_fields: Vec<String>,
    /// Reject legacy and bare inputs instead of skipping the integrity check
    pub require_integrity_tag: bool,
}

impl VerifierConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.totp.validate()?;
        for field in &self.required_fields {
            FieldName::parse(field)
                .map_err(|e| ConfigError::Invalid(format!("required field: {e}")))?;
            if field == CODE_FIELD {
                return Err(ConfigError::Invalid(format!(
                    "'{CODE_FIELD}' is always required and cannot be listed"
                )));
            }
        }
        Ok(())
    }
}

/// Both halves, as stored in one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickupConfig {
    pub issuer: IssuerConfig,
    pub verifier: VerifierConfig,
}

impl PickupConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.issuer.validate()?;
        self.verifier.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pickup_qr::{ErrorCorrection, LogoReservation};

    #[test]
    fn test_empty_object_gives_defaults() {
        let config = PickupConfig::from_json("{}").unwrap();
        assert_eq!(config, PickupConfig::default());
        assert_eq!(config.issuer.totp.period, 60);
        assert_eq!(config.issuer.qr.width, 400);
        assert_eq!(config.issuer.qr.logo, Some(LogoReservation { size: 60, margin: 5 }));
        assert_eq!(config.issuer.default_key_code, "default");
        assert!(config.verifier.required_fields.is_empty());
        assert!(!config.verifier.require_integrity_tag);
    }

    #[test]
    fn test_partial_override() {
        let json = r#"{
            "issuer": {
                "data_type": "RS",
                "qr": { "width": 600, "error_correction": "quartile", "logo": null },
                "key_derivation": "hkdf-sha256"
            },
            "verifier": {
                "required_fields": ["name", "phone"],
                "integrity": "hmac-sha512"
            }
        }"#;
        let config = PickupConfig::from_json(json).unwrap();
        assert_eq!(config.issuer.data_type, DataType::Rsa);
        assert_eq!(config.issuer.qr.width, 600);
        assert_eq!(config.issuer.qr.height, 400);
        assert_eq!(config.issuer.qr.error_correction, ErrorCorrection::Quartile);
        assert_eq!(config.issuer.qr.logo, None);
        assert_eq!(config.issuer.key_derivation, KeyDerivation::HkdfSha256);
        assert_eq!(config.verifier.required_fields, ["name", "phone"]);
        assert_eq!(config.verifier.integrity, IntegrityAlgorithm::HmacSha512);
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            PickupConfig::from_json(r#"{"issuer":{"totp":{"period":0}}}"#),
            Err(ConfigError::Totp(TotpError::ZeroPeriod))
        ));
        assert!(matches!(
            PickupConfig::from_json(r#"{"verifier":{"required_fields":["first name"]}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PickupConfig::from_json(r#"{"verifier":{"required_fields":["totp"]}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PickupConfig::from_json(r#"{"issuer":{"qr":{"width":0}}}"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pickup.json");
        std::fs::write(&path, r#"{"verifier":{"require_integrity_tag":true}}"#).unwrap();

        let config = PickupConfig::from_file(&path).unwrap();
        assert!(config.verifier.require_integrity_tag);
        assert!(matches!(
            PickupConfig::from_file(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
