//! Token verification
//!
//! A linear pipeline that stops at the first failure:
//! parse → decrypt → re-canonicalize → required fields → one-time code →
//! integrity tag. There is no partial success.
//!
//! Anything that goes wrong between decoding the ciphertext and holding a
//! well-formed JSON payload is reported as one `DecryptionFailed`, so a
//! caller probing with modified ciphertexts learns nothing about why.

use pickup_crypto::{integrity, IntegrityKey, OwnerKey, TotpSecret};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::VerifierConfig;
use crate::envelope::{DataType, EnvelopeError, WireFormat, WireInput};
use crate::payload::{Payload, CODE_FIELD};

/// Why a token was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyFailure {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("one-time code invalid or expired")]
    CodeInvalid,

    #[error("integrity check failed")]
    IntegrityFailed,

    #[error("integrity tag required")]
    IntegrityTagRequired,
}

/// Failure classes, so callers can tell tamper evidence from a stale code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Input,
    Cryptographic,
    Freshness,
    Integrity,
}

impl VerifyFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            VerifyFailure::MalformedEnvelope(_)
            | VerifyFailure::UnsupportedDataType(_)
            | VerifyFailure::MissingField(_) => FailureKind::Input,
            VerifyFailure::DecryptionFailed => FailureKind::Cryptographic,
            VerifyFailure::CodeInvalid => FailureKind::Freshness,
            VerifyFailure::IntegrityFailed | VerifyFailure::IntegrityTagRequired => {
                FailureKind::Integrity
            }
        }
    }
}

impl From<EnvelopeError> for VerifyFailure {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::UnsupportedDataType(tag) => VerifyFailure::UnsupportedDataType(tag),
            other => VerifyFailure::MalformedEnvelope(other.to_string()),
        }
    }
}

/// Whether the integrity tag was checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityStatus {
    Verified,
    /// Input carried no tag (legacy or bare). Flagged, not failed.
    Skipped,
}

/// Key material held by the verifier
#[derive(Debug, Clone)]
pub struct VerifierKeys {
    pub owner: OwnerKey,
    pub code_secret: TotpSecret,
    pub integrity_key: IntegrityKey,
}

#[derive(Debug, Clone)]
pub struct Verified {
    pub payload: Payload,
    /// Re-canonicalized plaintext
    pub plaintext: String,
    pub integrity: IntegrityStatus,
    pub data_type: DataType,
    pub format: WireFormat,
    pub key_code: Option<String>,
}

/// Flat report for request handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plaintext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity: Option<IntegrityStatus>,
}

impl From<Result<Verified, VerifyFailure>> for Verification {
    fn from(result: Result<Verified, VerifyFailure>) -> Self {
        match result {
            Ok(verified) => Self {
                valid: true,
                reason: None,
                kind: None,
                plaintext: Some(verified.plaintext),
                integrity: Some(verified.integrity),
            },
            Err(failure) => Self {
                valid: false,
                reason: Some(failure.to_string()),
                kind: Some(failure.kind()),
                plaintext: None,
                integrity: None,
            },
        }
    }
}

pub struct Verifier {
    config: VerifierConfig,
}

impl Verifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn verify(&self, input: &str, keys: &VerifierKeys) -> Result<Verified, VerifyFailure> {
        self.verify_at(input, keys, pickup_crypto::unix_now())
    }

    /// Verify as if the clock read `now` (unix seconds)
    pub fn verify_at(
        &self,
        input: &str,
        keys: &VerifierKeys,
        now: u64,
    ) -> Result<Verified, VerifyFailure> {
        let result = self.run(input, keys, now);
        match &result {
            Ok(verified) => info!(
                data_type = verified.data_type.as_tag(),
                format = ?verified.format,
                integrity = ?verified.integrity,
                "Pickup token verified"
            ),
            Err(failure) => info!(kind = ?failure.kind(), reason = %failure, "Pickup token rejected"),
        }
        result
    }

    fn run(&self, input: &str, keys: &VerifierKeys, now: u64) -> Result<Verified, VerifyFailure> {
        let wire = WireInput::parse(input)?;
        let owner_type = DataType::for_suite(keys.owner.suite());
        let data_type = wire.data_type().unwrap_or(owner_type);

        if wire.tag().is_none() && self.config.require_integrity_tag {
            return Err(VerifyFailure::IntegrityTagRequired);
        }

        if data_type != owner_type {
            debug!(
                declared = data_type.as_tag(),
                key = owner_type.as_tag(),
                "Private key does not match declared data type"
            );
            return Err(VerifyFailure::DecryptionFailed);
        }

        let decrypted = keys
            .owner
            .open(wire.data(), self.config.key_derivation)
            .map_err(|e| {
                debug!(error = %e, "Decryption failed");
                VerifyFailure::DecryptionFailed
            })?;

        let payload = Payload::from_json(&decrypted).map_err(|e| {
            debug!(error = %e, "Decrypted bytes are not a payload");
            VerifyFailure::DecryptionFailed
        })?;
        let plaintext = payload.canonical_json();

        let required = std::iter::once(CODE_FIELD).chain(self.config.required_fields.iter().map(String::as_str));
        for field in required {
            // whitespace-only counts as absent
            match payload.get(field) {
                Some(value) if !value.trim().is_empty() => {}
                _ => return Err(VerifyFailure::MissingField(field.to_string())),
            }
        }

        let code = payload
            .code()
            .ok_or_else(|| VerifyFailure::MissingField(CODE_FIELD.to_string()))?;
        if !self.config.totp.verify_at(code, &keys.code_secret, now) {
            return Err(VerifyFailure::CodeInvalid);
        }

        let integrity = match wire.tag() {
            Some(tag) => {
                if !integrity::verify(
                    plaintext.as_bytes(),
                    &keys.integrity_key,
                    self.config.integrity,
                    tag,
                ) {
                    return Err(VerifyFailure::IntegrityFailed);
                }
                IntegrityStatus::Verified
            }
            None => {
                warn!(format = ?wire.format(), "Input carries no integrity tag, check skipped");
                IntegrityStatus::Skipped
            }
        };

        Ok(Verified {
            payload,
            plaintext,
            integrity,
            data_type,
            format: wire.format(),
            key_code: wire.key_code().map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IssuerConfig;
    use crate::issuer::{Issuer, IssuerKeys};
    use crate::payload::FieldSet;
    use pickup_crypto::{EcKeyPair, RecipientKey, Totp};

    const NOW: u64 = 1_700_000_000;

    struct Fixture {
        issuer_keys: IssuerKeys,
        verifier_keys: VerifierKeys,
    }

    fn fixture() -> Fixture {
        let pair = EcKeyPair::generate();
        let code_secret = TotpSecret::generate();
        let integrity_key = IntegrityKey::from_text("testKey");
        Fixture {
            issuer_keys: IssuerKeys {
                recipient: Some(RecipientKey::from(pair.public_key().clone())),
                code_secret: Some(code_secret.clone()),
                integrity_key: Some(integrity_key.clone()),
            },
            verifier_keys: VerifierKeys {
                owner: OwnerKey::from(pair.private_key().clone()),
                code_secret,
                integrity_key,
            },
        }
    }

    fn issue(fx: &Fixture, pairs: &[(&str, &str)]) -> String {
        let fields = FieldSet::from_pairs(pairs.iter().copied()).unwrap();
        Issuer::new(IssuerConfig::default())
            .issue_at(&fields, &fx.issuer_keys, "", DataType::Ecies, NOW)
            .unwrap()
            .envelope_json
    }

    /// Seal an arbitrary plaintext the way the issuer would
    fn seal(fx: &Fixture, plaintext: &str) -> String {
        fx.issuer_keys
            .recipient
            .as_ref()
            .unwrap()
            .seal(plaintext.as_bytes(), Default::default())
            .unwrap()
    }

    #[test]
    fn test_verify_issued_token() {
        let fx = fixture();
        let envelope = issue(&fx, &[("name", "Lee")]);

        let verified = Verifier::new(VerifierConfig::default())
            .verify_at(&envelope, &fx.verifier_keys, NOW + 5)
            .unwrap();
        assert_eq!(verified.payload.get("name"), Some("Lee"));
        assert_eq!(verified.integrity, IntegrityStatus::Verified);
        assert_eq!(verified.format, WireFormat::Current);
        assert_eq!(verified.key_code.as_deref(), Some("default"));
    }

    #[test]
    fn test_missing_required_field() {
        let fx = fixture();
        let envelope = issue(&fx, &[("name", "Lee")]);
        let verifier = Verifier::new(VerifierConfig {
            required_fields: vec!["name".to_string(), "phone".to_string()],
            ..VerifierConfig::default()
        });

        assert_eq!(
            verifier.verify_at(&envelope, &fx.verifier_keys, NOW).unwrap_err(),
            VerifyFailure::MissingField("phone".to_string())
        );
    }

    #[test]
    fn test_blank_required_field_is_missing() {
        let fx = fixture();
        let code = Totp::default().generate_at(&fx.verifier_keys.code_secret, NOW);
        let verifier = Verifier::new(VerifierConfig {
            required_fields: vec!["name".to_string()],
            ..VerifierConfig::default()
        });

        let blank_name = seal(&fx, &format!(r#"{{"name":"   ","totp":"{code}"}}"#));
        assert_eq!(
            verifier.verify_at(&blank_name, &fx.verifier_keys, NOW).unwrap_err(),
            VerifyFailure::MissingField("name".to_string())
        );

        let empty_name = seal(&fx, &format!(r#"{{"name":"","totp":"{code}"}}"#));
        assert_eq!(
            verifier.verify_at(&empty_name, &fx.verifier_keys, NOW).unwrap_err(),
            VerifyFailure::MissingField("name".to_string())
        );

        let blank_code = seal(&fx, r#"{"name":"Lee","totp":" "}"#);
        assert_eq!(
            verifier.verify_at(&blank_code, &fx.verifier_keys, NOW).unwrap_err(),
            VerifyFailure::MissingField("totp".to_string())
        );

        let filled = seal(&fx, &format!(r#"{{"name":"Lee","totp":"{code}"}}"#));
        let verified = verifier.verify_at(&filled, &fx.verifier_keys, NOW).unwrap();
        assert_eq!(verified.integrity, IntegrityStatus::Skipped);
    }

    #[test]
    fn test_payload_without_code_is_rejected() {
        let fx = fixture();
        let bare = seal(&fx, r#"{"name":"Lee"}"#);
        assert_eq!(
            Verifier::new(VerifierConfig::default())
                .verify_at(&bare, &fx.verifier_keys, NOW)
                .unwrap_err(),
            VerifyFailure::MissingField("totp".to_string())
        );
    }

    #[test]
    fn test_non_json_plaintext_is_a_decryption_failure() {
        let fx = fixture();
        let bare = seal(&fx, "not json at all");
        assert_eq!(
            Verifier::new(VerifierConfig::default())
                .verify_at(&bare, &fx.verifier_keys, NOW)
                .unwrap_err(),
            VerifyFailure::DecryptionFailed
        );
    }

    #[test]
    fn test_recanonicalizes_before_checking_tag() {
        let fx = fixture();
        let code = Totp::default().generate_at(&fx.verifier_keys.code_secret, NOW);
        let canonical = format!(r#"{{"name":"Lee","totp":"{code}"}}"#);
        let reordered = format!("{{ \"totp\": \"{code}\", \"name\": \"Lee\" }}");

        let tag = integrity::tag(
            canonical.as_bytes(),
            &fx.verifier_keys.integrity_key,
            Default::default(),
        );
        let envelope = format!(r#"{{"t":"SS","d":"{}","h":"{}"}}"#, seal(&fx, &reordered), tag);

        let verified = Verifier::new(VerifierConfig::default())
            .verify_at(&envelope, &fx.verifier_keys, NOW)
            .unwrap();
        assert_eq!(verified.plaintext, canonical);
        assert_eq!(verified.key_code, None);
    }

    #[test]
    fn test_require_integrity_tag() {
        let fx = fixture();
        let code = Totp::default().generate_at(&fx.verifier_keys.code_secret, NOW);
        let bare = seal(&fx, &format!(r#"{{"name":"Lee","totp":"{code}"}}"#));

        let lenient = Verifier::new(VerifierConfig::default());
        assert_eq!(
            lenient.verify_at(&bare, &fx.verifier_keys, NOW).unwrap().integrity,
            IntegrityStatus::Skipped
        );

        let strict = Verifier::new(VerifierConfig {
            require_integrity_tag: true,
            ..VerifierConfig::default()
        });
        assert_eq!(
            strict.verify_at(&bare, &fx.verifier_keys, NOW).unwrap_err(),
            VerifyFailure::IntegrityTagRequired
        );
    }

    #[test]
    fn test_envelope_errors() {
        let fx = fixture();
        let verifier = Verifier::new(VerifierConfig::default());

        assert!(matches!(
            verifier.verify_at("{}", &fx.verifier_keys, NOW),
            Err(VerifyFailure::MalformedEnvelope(_))
        ));
        assert_eq!(
            verifier
                .verify_at(r#"{"t":"ZZ","d":"abc"}"#, &fx.verifier_keys, NOW)
                .unwrap_err(),
            VerifyFailure::UnsupportedDataType("ZZ".to_string())
        );
    }

    #[test]
    fn test_declared_type_must_match_key() {
        let fx = fixture();
        let envelope = issue(&fx, &[("name", "Lee")]).replacen(r#""t":"SS""#, r#""t":"RS""#, 1);
        assert_eq!(
            Verifier::new(VerifierConfig::default())
                .verify_at(&envelope, &fx.verifier_keys, NOW)
                .unwrap_err(),
            VerifyFailure::DecryptionFailed
        );
    }

    #[test]
    fn test_verification_report() {
        let report = Verification::from(Err::<Verified, _>(VerifyFailure::CodeInvalid));
        assert!(!report.valid);
        assert_eq!(report.reason.as_deref(), Some("one-time code invalid or expired"));
        assert_eq!(report.kind, Some(FailureKind::Freshness));
        assert_eq!(
            serde_json::to_string(&report).unwrap(),
            r#"{"valid":false,"reason":"one-time code invalid or expired","kind":"freshness"}"#
        );
    }

    #[test]
    fn test_failure_kinds() {
        assert_eq!(VerifyFailure::DecryptionFailed.kind(), FailureKind::Cryptographic);
        assert_eq!(VerifyFailure::IntegrityFailed.kind(), FailureKind::Integrity);
        assert_eq!(VerifyFailure::MissingField("x".into()).kind(), FailureKind::Input);
    }
}
