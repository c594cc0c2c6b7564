//! Time-based one-time codes
//!
//! HMAC-SHA256 over the big-endian time step with RFC 4226 dynamic
//! truncation. The step is `(now + skew) / period`: a 60 second window
//! shifted 30 seconds forward by default. Verification only accepts the
//! current step.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use ring::hmac;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::keys::{decode_base64, KeyError};

pub const DEFAULT_PERIOD: u64 = 60;
pub const DEFAULT_SKEW: u64 = 30;
pub const DEFAULT_DIGITS: u32 = 6;
/// 256-bit secrets
pub const SECRET_LEN: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TotpError {
    #[error("Period must be at least one second")]
    ZeroPeriod,

    #[error("Digits must be between 1 and 9, got {0}")]
    InvalidDigits(u32),
}

/// Seconds since the Unix epoch
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Symmetric one-time-code secret, base64 on the wire
#[derive(Clone)]
pub struct TotpSecret(Zeroizing<Vec<u8>>);

impl TotpSecret {
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new(vec![0u8; SECRET_LEN]);
        OsRng.fill_bytes(bytes.as_mut_slice());
        Self(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        Ok(Self(decode_base64(encoded)?))
    }

    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(self.0.as_slice()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for TotpSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TotpSecret(<redacted>)")
    }
}

/// One-time code parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Totp {
    /// Window length in seconds
    pub period: u64,
    /// Forward shift applied before bucketing
    pub skew: u64,
    pub digits: u32,
}

impl Default for Totp {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            skew: DEFAULT_SKEW,
            digits: DEFAULT_DIGITS,
        }
    }
}

impl Totp {
    pub fn validate(&self) -> Result<(), TotpError> {
        if self.period == 0 {
            return Err(TotpError::ZeroPeriod);
        }
        if !(1..=9).contains(&self.digits) {
            return Err(TotpError::InvalidDigits(self.digits));
        }
        Ok(())
    }

    pub fn time_step(&self, unix_secs: u64) -> u64 {
        unix_secs.saturating_add(self.skew) / self.period.max(1)
    }

    pub fn generate_at(&self, secret: &TotpSecret, unix_secs: u64) -> String {
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
        let tag = hmac::sign(&key, &self.time_step(unix_secs).to_be_bytes());
        let hash = tag.as_ref();

        let offset = (hash[hash.len() - 1] & 0x0f) as usize;
        let binary = u32::from_be_bytes([
            hash[offset] & 0x7f,
            hash[offset + 1],
            hash[offset + 2],
            hash[offset + 3],
        ]);

        let digits = self.digits.clamp(1, 9);
        let code = binary % 10u32.pow(digits);
        format!("{:0width$}", code, width = digits as usize)
    }

    pub fn generate(&self, secret: &TotpSecret) -> String {
        self.generate_at(secret, unix_now())
    }

    /// Exact match against the code for the current step only
    pub fn verify_at(&self, code: &str, secret: &TotpSecret, unix_secs: u64) -> bool {
        let expected = self.generate_at(secret, unix_secs);
        code.len() == expected.len() && bool::from(code.as_bytes().ct_eq(expected.as_bytes()))
    }

    pub fn verify(&self, code: &str, secret: &TotpSecret) -> bool {
        self.verify_at(code, secret, unix_now())
    }
}
