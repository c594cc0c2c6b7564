//! Key files: one JSON document holding every key a party needs

use std::path::Path;

use anyhow::{bail, Context, Result};
use pickup_core::{DataType, IssuerKeys, VerifierKeys};
use pickup_crypto::{
    EcKeyPair, EcPrivateKey, EcPublicKey, IntegrityKey, OwnerKey, RecipientKey, RsaKeyPair,
    RsaPrivateKey, RsaPublicKey, TotpSecret,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Base64 key material. Issuers need the public half, verifiers the private
/// half; both need the one-time code secret and the integrity key.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFile {
    /// Absent in hand-written files; the caller picks a fallback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<DataType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totp_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hmac_key: Option<String>,
}

impl KeyFile {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read key file {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Invalid key file {}", path.display()))
    }

    /// Fresh pair plus fresh symmetric secrets
    pub fn generate(key_type: DataType) -> Result<Self> {
        let (public_key, private_key) = match key_type {
            DataType::Ecies => {
                let pair = EcKeyPair::generate();
                (
                    pair.public_key().to_base64(),
                    pair.private_key().to_base64()?.to_string(),
                )
            }
            DataType::Rsa => {
                let pair = RsaKeyPair::generate()?;
                (
                    pair.public_key().to_base64()?,
                    pair.private_key().to_base64()?.to_string(),
                )
            }
        };

        Ok(Self {
            key_type: Some(key_type),
            public_key: Some(public_key),
            private_key: Some(private_key),
            totp_key: Some(TotpSecret::generate().to_base64().to_string()),
            hmac_key: Some(IntegrityKey::generate_text().to_string()),
        })
    }

    /// Key type from the file, or `fallback` when the file does not name one
    pub fn key_type_or(&self, fallback: DataType) -> DataType {
        match self.key_type {
            Some(key_type) => key_type,
            None => {
                warn!(fallback = fallback.as_tag(), "Key file has no keyType, assuming fallback");
                fallback
            }
        }
    }

    /// Missing entries stay `None`; the issuer reports which one it needed
    pub fn issuer_keys(&self, key_type: DataType) -> Result<IssuerKeys> {
        let recipient = match &self.public_key {
            None => None,
            Some(encoded) => Some(match key_type {
                DataType::Ecies => RecipientKey::from(EcPublicKey::from_base64(encoded)?),
                DataType::Rsa => RecipientKey::from(RsaPublicKey::from_base64(encoded)?),
            }),
        };
        let code_secret = self
            .totp_key
            .as_deref()
            .map(TotpSecret::from_base64)
            .transpose()?;

        Ok(IssuerKeys {
            recipient,
            code_secret,
            integrity_key: self.hmac_key.as_deref().map(IntegrityKey::from_text),
        })
    }

    pub fn verifier_keys(&self, key_type: DataType) -> Result<VerifierKeys> {
        let Some(encoded) = &self.private_key else {
            bail!("Key file has no privateKey");
        };
        let owner = match key_type {
            DataType::Ecies => OwnerKey::from(EcPrivateKey::from_base64(encoded)?),
            DataType::Rsa => OwnerKey::from(RsaPrivateKey::from_base64(encoded)?),
        };
        let Some(totp_key) = &self.totp_key else {
            bail!("Key file has no totpKey");
        };
        let Some(hmac_key) = &self.hmac_key else {
            bail!("Key file has no hmacKey");
        };

        Ok(VerifierKeys {
            owner,
            code_secret: TotpSecret::from_base64(totp_key)?,
            integrity_key: IntegrityKey::from_text(hmac_key),
        })
    }
}
