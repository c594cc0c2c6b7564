//! Pickup Crypto - token protocol primitives
//!
//! This crate provides:
//! - ECIES-style hybrid encryption (P-256 ECDH + AES-256-CBC)
//! - Direct RSA-OAEP encryption for short payloads
//! - Time-based one-time codes with a skewed 60 second window
//! - Keyed integrity tags (HMAC) over canonical payload bytes
//! - Key generation and base64 key encodings

pub mod cipher;
pub mod ecies;
pub mod integrity;
pub mod keys;
pub mod rsa_oaep;
pub mod totp;

pub use cipher::{CipherError, CipherSuite, KeyDerivation, OwnerKey, RecipientKey};
pub use integrity::{IntegrityAlgorithm, IntegrityKey};
pub use keys::{EcKeyPair, EcPrivateKey, EcPublicKey, KeyError, RsaKeyPair, RsaPrivateKey, RsaPublicKey};
pub use totp::{unix_now, Totp, TotpError, TotpSecret};
