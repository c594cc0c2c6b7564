//! Key material for the token protocol
//!
//! EC keys live on P-256. Public keys travel as SEC1 compressed points
//! (33 bytes), private keys as PKCS#8 DER. RSA keys use SPKI DER for the
//! public half and PKCS#8 DER for the private half. Every external form is
//! standard base64.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{DecodePrivateKey as _, EncodePrivateKey as _};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use thiserror::Error;
use zeroize::Zeroizing;

/// Compressed SEC1 point length
pub const EC_PUBLIC_KEY_LEN: usize = 33;
/// Raw P-256 scalar length
pub const EC_SCALAR_LEN: usize = 32;
/// RSA modulus size in bits
pub const RSA_BITS: usize = 2048;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid base64 encoding")]
    Base64,

    #[error("Invalid EC public key")]
    InvalidEcPublicKey,

    #[error("Invalid EC private key")]
    InvalidEcPrivateKey,

    #[error("Invalid RSA public key")]
    InvalidRsaPublicKey,

    #[error("Invalid RSA private key")]
    InvalidRsaPrivateKey,

    #[error("Key generation failed: {0}")]
    Generation(String),

    #[error("Key encoding failed")]
    Encoding,
}

pub(crate) fn decode_base64(encoded: &str) -> Result<Zeroizing<Vec<u8>>, KeyError> {
    STANDARD
        .decode(encoded.trim())
        .map(Zeroizing::new)
        .map_err(|_| KeyError::Base64)
}

/// P-256 public key of a token recipient
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EcPublicKey(p256::PublicKey);

impl EcPublicKey {
    pub fn from_sec1(bytes: &[u8]) -> Result<Self, KeyError> {
        p256::PublicKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| KeyError::InvalidEcPublicKey)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        Self::from_sec1(&decode_base64(encoded)?)
    }

    /// Compressed SEC1 encoding (33 bytes)
    pub fn to_sec1_compressed(&self) -> Vec<u8> {
        self.0.to_encoded_point(true).as_bytes().to_vec()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_sec1_compressed())
    }

    pub fn inner(&self) -> &p256::PublicKey {
        &self.0
    }
}

/// P-256 private key. The underlying scalar zeroizes itself on drop.
#[derive(Clone)]
pub struct EcPrivateKey(p256::SecretKey);

impl EcPrivateKey {
    /// Accepts PKCS#8 DER, or a bare 32-byte scalar.
    pub fn from_der(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() == EC_SCALAR_LEN {
            return p256::SecretKey::from_slice(bytes)
                .map(Self)
                .map_err(|_| KeyError::InvalidEcPrivateKey);
        }
        p256::SecretKey::from_pkcs8_der(bytes)
            .map(Self)
            .map_err(|_| KeyError::InvalidEcPrivateKey)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        Self::from_der(&decode_base64(encoded)?)
    }

    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        let doc = self.0.to_pkcs8_der().map_err(|_| KeyError::Encoding)?;
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }

    pub fn to_base64(&self) -> Result<Zeroizing<String>, KeyError> {
        Ok(Zeroizing::new(STANDARD.encode(self.to_pkcs8_der()?.as_slice())))
    }

    pub fn public_key(&self) -> EcPublicKey {
        EcPublicKey(self.0.public_key())
    }

    pub fn inner(&self) -> &p256::SecretKey {
        &self.0
    }
}

impl fmt::Debug for EcPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EcPrivateKey(<redacted>)")
    }
}

/// A P-256 key pair
#[derive(Clone, Debug)]
pub struct EcKeyPair {
    pub public: EcPublicKey,
    secret: EcPrivateKey,
}

impl EcKeyPair {
    pub fn generate() -> Self {
        let secret = EcPrivateKey(p256::SecretKey::random(&mut OsRng));
        Self {
            public: secret.public_key(),
            secret,
        }
    }

    pub fn public_key(&self) -> &EcPublicKey {
        &self.public
    }

    pub fn private_key(&self) -> &EcPrivateKey {
        &self.secret
    }
}

/// RSA public key (SPKI DER on the wire)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RsaPublicKey(rsa::RsaPublicKey);

impl RsaPublicKey {
    pub fn from_der(bytes: &[u8]) -> Result<Self, KeyError> {
        rsa::RsaPublicKey::from_public_key_der(bytes)
            .map(Self)
            .map_err(|_| KeyError::InvalidRsaPublicKey)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        Self::from_der(&decode_base64(encoded)?)
    }

    pub fn to_der(&self) -> Result<Vec<u8>, KeyError> {
        let doc = self.0.to_public_key_der().map_err(|_| KeyError::Encoding)?;
        Ok(doc.as_bytes().to_vec())
    }

    pub fn to_base64(&self) -> Result<String, KeyError> {
        Ok(STANDARD.encode(self.to_der()?))
    }

    pub fn inner(&self) -> &rsa::RsaPublicKey {
        &self.0
    }
}

/// RSA private key (PKCS#8 DER on the wire)
#[derive(Clone)]
pub struct RsaPrivateKey(rsa::RsaPrivateKey);

impl RsaPrivateKey {
    pub fn from_der(bytes: &[u8]) -> Result<Self, KeyError> {
        rsa::RsaPrivateKey::from_pkcs8_der(bytes)
            .map(Self)
            .map_err(|_| KeyError::InvalidRsaPrivateKey)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        Self::from_der(&decode_base64(encoded)?)
    }

    pub fn to_base64(&self) -> Result<Zeroizing<String>, KeyError> {
        let doc = self.0.to_pkcs8_der().map_err(|_| KeyError::Encoding)?;
        Ok(Zeroizing::new(STANDARD.encode(doc.as_bytes())))
    }

    pub fn public_key(&self) -> RsaPublicKey {
        RsaPublicKey(self.0.to_public_key())
    }

    pub fn inner(&self) -> &rsa::RsaPrivateKey {
        &self.0
    }
}

impl fmt::Debug for RsaPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RsaPrivateKey(<redacted>)")
    }
}

/// An RSA-2048 key pair
#[derive(Clone, Debug)]
pub struct RsaKeyPair {
    pub public: RsaPublicKey,
    secret: RsaPrivateKey,
}

impl RsaKeyPair {
    pub fn generate() -> Result<Self, KeyError> {
        let secret = rsa::RsaPrivateKey::new(&mut OsRng, RSA_BITS)
            .map_err(|e| KeyError::Generation(e.to_string()))?;
        let secret = RsaPrivateKey(secret);
        Ok(Self {
            public: secret.public_key(),
            secret,
        })
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.secret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ec_public_key_is_compressed() {
        let pair = EcKeyPair::generate();
        let bytes = pair.public_key().to_sec1_compressed();
        assert_eq!(bytes.len(), EC_PUBLIC_KEY_LEN);
        assert!(bytes[0] == 0x02 || bytes[0] == 0x03);
    }

    #[test]
    fn test_ec_keys_base64_roundtrip() {
        let pair = EcKeyPair::generate();

        let public = EcPublicKey::from_base64(&pair.public_key().to_base64()).unwrap();
        assert_eq!(&public, pair.public_key());

        let private_b64 = pair.private_key().to_base64().unwrap();
        let private = EcPrivateKey::from_base64(&private_b64).unwrap();
        assert_eq!(&private.public_key(), pair.public_key());
    }

    #[test]
    fn test_ec_private_key_accepts_raw_scalar() {
        let pair = EcKeyPair::generate();
        let scalar = pair.private_key().inner().to_bytes();
        let private = EcPrivateKey::from_der(scalar.as_slice()).unwrap();
        assert_eq!(&private.public_key(), pair.public_key());
    }

    #[test]
    fn test_invalid_keys_rejected() {
        assert!(matches!(EcPublicKey::from_base64("not base64!"), Err(KeyError::Base64)));
        assert!(matches!(
            EcPublicKey::from_sec1(&[0x02; 10]),
            Err(KeyError::InvalidEcPublicKey)
        ));
        assert!(matches!(
            EcPrivateKey::from_der(&[1, 2, 3]),
            Err(KeyError::InvalidEcPrivateKey)
        ));
        assert!(matches!(
            RsaPublicKey::from_der(&[0x30, 0x00]),
            Err(KeyError::InvalidRsaPublicKey)
        ));
    }

    #[test]
    fn test_private_key_debug_is_redacted() {
        let pair = EcKeyPair::generate();
        assert_eq!(format!("{:?}", pair.private_key()), "EcPrivateKey(<redacted>)");
    }

    #[test]
    fn test_rsa_keys_base64_roundtrip() {
        let pair = RsaKeyPair::generate().unwrap();

        let public = RsaPublicKey::from_base64(&pair.public_key().to_base64().unwrap()).unwrap();
        assert_eq!(&public, pair.public_key());

        let private_b64 = pair.private_key().to_base64().unwrap();
        let private = RsaPrivateKey::from_base64(&private_b64).unwrap();
        assert_eq!(&private.public_key(), pair.public_key());
    }
}
