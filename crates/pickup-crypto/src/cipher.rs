//! Payload encryption strategies
//!
//! Two interchangeable ways to seal a token payload for its recipient:
//! - ECIES: ephemeral-static P-256 ECDH + AES-256-CBC (any payload size)
//! - RSA-OAEP: direct RSA-2048 encryption (payloads up to 190 bytes)
//!
//! Neither strategy authenticates the ciphertext. A successful decrypt is
//! not proof of origin; integrity comes from the keyed tag in `integrity`.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keys::{EcPrivateKey, EcPublicKey, RsaPrivateKey, RsaPublicKey};
use crate::{ecies, rsa_oaep};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Ciphertext could not be decoded: {0}")]
    Decode(String),

    #[error("Plaintext too long: at most {max} bytes, got {actual}")]
    PlaintextTooLong { max: usize, actual: usize },

    #[error("Key derivation failed")]
    KeyDerivation,
}

/// How the AES key is obtained from the raw ECDH output.
///
/// `Truncate` keeps tokens readable by already-deployed verifiers.
/// `HkdfSha256` is the hardened variant; both ends must agree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyDerivation {
    #[default]
    Truncate,
    HkdfSha256,
}

/// Which strategy a key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherSuite {
    Ecies,
    RsaOaep,
}

/// Key used to seal a payload for its recipient
#[derive(Clone, Debug)]
pub enum RecipientKey {
    Ec(EcPublicKey),
    Rsa(RsaPublicKey),
}

impl RecipientKey {
    pub fn suite(&self) -> CipherSuite {
        match self {
            RecipientKey::Ec(_) => CipherSuite::Ecies,
            RecipientKey::Rsa(_) => CipherSuite::RsaOaep,
        }
    }

    /// Encrypt and return the blob as base64
    pub fn seal(&self, plaintext: &[u8], derivation: KeyDerivation) -> Result<String, CipherError> {
        let blob = match self {
            RecipientKey::Ec(key) => ecies::encrypt(plaintext, key, derivation)?,
            RecipientKey::Rsa(key) => rsa_oaep::encrypt(plaintext, key)?,
        };
        Ok(STANDARD.encode(blob))
    }
}

impl From<EcPublicKey> for RecipientKey {
    fn from(key: EcPublicKey) -> Self {
        RecipientKey::Ec(key)
    }
}

impl From<RsaPublicKey> for RecipientKey {
    fn from(key: RsaPublicKey) -> Self {
        RecipientKey::Rsa(key)
    }
}

/// Key used by the verifier to open a sealed payload
#[derive(Clone, Debug)]
pub enum OwnerKey {
    Ec(EcPrivateKey),
    Rsa(RsaPrivateKey),
}

impl OwnerKey {
    pub fn suite(&self) -> CipherSuite {
        match self {
            OwnerKey::Ec(_) => CipherSuite::Ecies,
            OwnerKey::Rsa(_) => CipherSuite::RsaOaep,
        }
    }

    /// Decode a base64 blob and decrypt it
    pub fn open(&self, blob: &str, derivation: KeyDerivation) -> Result<Vec<u8>, CipherError> {
        let bytes = STANDARD
            .decode(blob.trim())
            .map_err(|e| CipherError::Decode(e.to_string()))?;
        match self {
            OwnerKey::Ec(key) => ecies::decrypt(&bytes, key, derivation),
            OwnerKey::Rsa(key) => rsa_oaep::decrypt(&bytes, key),
        }
    }
}

impl From<EcPrivateKey> for OwnerKey {
    fn from(key: EcPrivateKey) -> Self {
        OwnerKey::Ec(key)
    }
}

impl From<RsaPrivateKey> for OwnerKey {
    fn from(key: RsaPrivateKey) -> Self {
        OwnerKey::Rsa(key)
    }
}
