//! Pickup Core - issuing and verifying pickup tokens
//!
//! A token is a small set of identity fields plus a one-time code, serialized
//! canonically, tagged with an HMAC, encrypted for the verifier and wrapped in
//! a JSON envelope that travels as a QR code. This crate holds the shared
//! logic used by every frontend (CLI today, request handlers elsewhere).

pub mod config;
pub mod envelope;
pub mod issuer;
pub mod payload;
pub mod verifier;

pub use config::{ConfigError, IssuerConfig, PickupConfig, VerifierConfig};
pub use envelope::{DataType, Envelope, EnvelopeError, LegacyEnvelope, WireFormat, WireInput};
pub use issuer::{IssueError, Issued, Issuer, IssuerKeys};
pub use payload::{FieldName, FieldSet, FieldValue, Payload, PayloadError, CODE_FIELD, MAX_VALUE_LEN};
pub use verifier::{FailureKind, IntegrityStatus, Verification, Verified, Verifier, VerifierKeys, VerifyFailure};
