//! Keyed integrity tags over canonical payload bytes
//!
//! The tag is always recomputed by the verifier; a received tag is only ever
//! compared, never trusted.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use ring::hmac;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// MAC used for integrity tags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntegrityAlgorithm {
    #[default]
    HmacSha256,
    HmacSha384,
    HmacSha512,
}

impl IntegrityAlgorithm {
    fn ring_algorithm(self) -> hmac::Algorithm {
        match self {
            IntegrityAlgorithm::HmacSha256 => hmac::HMAC_SHA256,
            IntegrityAlgorithm::HmacSha384 => hmac::HMAC_SHA384,
            IntegrityAlgorithm::HmacSha512 => hmac::HMAC_SHA512,
        }
    }
}

/// Integrity key.
///
/// Deployed keys are handed around as text and the MAC is keyed with the
/// UTF-8 bytes of that text, so `from_text("testKey")` is a valid key.
#[derive(Clone)]
pub struct IntegrityKey(Zeroizing<Vec<u8>>);

impl IntegrityKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn from_text(text: &str) -> Self {
        Self::from_bytes(text.as_bytes().to_vec())
    }

    /// Fresh key text: base64 of 32 random bytes
    pub fn generate_text() -> Zeroizing<String> {
        let mut bytes = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut bytes[..]);
        Zeroizing::new(STANDARD.encode(&bytes[..]))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for IntegrityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IntegrityKey(<redacted>)")
    }
}

/// Base64 MAC of `data`
pub fn tag(data: &[u8], key: &IntegrityKey, algorithm: IntegrityAlgorithm) -> String {
    let key = hmac::Key::new(algorithm.ring_algorithm(), key.as_bytes());
    STANDARD.encode(hmac::sign(&key, data).as_ref())
}

/// Recompute the MAC of `data` and compare it to `expected` in constant time
pub fn verify(
    data: &[u8],
    key: &IntegrityKey,
    algorithm: IntegrityAlgorithm,
    expected: &str,
) -> bool {
    let Ok(expected) = STANDARD.decode(expected.trim()) else {
        return false;
    };
    let key = hmac::Key::new(algorithm.ring_algorithm(), key.as_bytes());
    hmac::verify(&key, data, &expected).is_ok()
}
