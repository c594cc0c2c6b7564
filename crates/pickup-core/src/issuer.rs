//! Token issuance
//!
//! Gates run in a fixed order and the first failure is returned:
//! 1. key material present and matching the requested data type
//! 2. field set valid (enforced when the `FieldSet` was built)
//! 3. blank key code replaced by the configured default
//! 4. one-time code merged into the fields
//! 5. canonical payload tagged, then encrypted
//! 6. envelope serialized and rendered as a QR code
//!
//! A logo that fails to load is not an error; the code is drawn without one.

use pickup_crypto::{integrity, CipherError, IntegrityKey, RecipientKey, TotpError, TotpSecret};
use pickup_qr::{render_png_base64, LogoSource, QrError, QrOptions};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::IssuerConfig;
use crate::envelope::{DataType, Envelope, EnvelopeError};
use crate::payload::{FieldSet, Payload};

#[derive(Error, Debug)]
pub enum IssueError {
    #[error("Missing key material: {0}")]
    MissingKey(&'static str),

    #[error("Recipient key cannot be used for data type {}", .0.as_tag())]
    KeyTypeMismatch(DataType),

    #[error("Invalid one-time code settings: {0}")]
    Totp(#[from] TotpError),

    #[error("Encryption failed: {0}")]
    Encryption(#[from] CipherError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("QR rendering failed: {0}")]
    Qr(#[from] QrError),
}

/// Key material for issuing; any of it may be missing and is checked first
#[derive(Debug, Clone, Default)]
pub struct IssuerKeys {
    pub recipient: Option<RecipientKey>,
    pub code_secret: Option<TotpSecret>,
    pub integrity_key: Option<IntegrityKey>,
}

/// Everything produced for one token
#[derive(Debug, Clone)]
pub struct Issued {
    pub payload: Payload,
    /// Canonical plaintext, kept by the issuer for audit
    pub plaintext: String,
    pub envelope: Envelope,
    /// Serialized envelope, the text inside the QR code
    pub envelope_json: String,
    /// Base64 PNG
    pub qr_code: String,
    pub logo_applied: bool,
}

pub struct Issuer {
    config: IssuerConfig,
    logo: Option<Box<dyn LogoSource>>,
}

impl Issuer {
    pub fn new(config: IssuerConfig) -> Self {
        Self { config, logo: None }
    }

    /// Draw this logo in the reserved square of every code
    pub fn with_logo(mut self, logo: impl LogoSource + 'static) -> Self {
        self.logo = Some(Box::new(logo));
        self
    }

    pub fn config(&self) -> &IssuerConfig {
        &self.config
    }

    pub fn issue(
        &self,
        fields: &FieldSet,
        keys: &IssuerKeys,
        key_code: &str,
        data_type: DataType,
    ) -> Result<Issued, IssueError> {
        self.issue_at(fields, keys, key_code, data_type, pickup_crypto::unix_now())
    }

    /// Issue as if the clock read `now` (unix seconds)
    pub fn issue_at(
        &self,
        fields: &FieldSet,
        keys: &IssuerKeys,
        key_code: &str,
        data_type: DataType,
        now: u64,
    ) -> Result<Issued, IssueError> {
        let recipient = keys
            .recipient
            .as_ref()
            .ok_or(IssueError::MissingKey("recipient public key"))?;
        let code_secret = keys
            .code_secret
            .as_ref()
            .ok_or(IssueError::MissingKey("one-time code secret"))?;
        let integrity_key = keys
            .integrity_key
            .as_ref()
            .ok_or(IssueError::MissingKey("integrity key"))?;
        if recipient.suite() != data_type.suite() {
            return Err(IssueError::KeyTypeMismatch(data_type));
        }
        self.config.totp.validate()?;

        let key_code = match key_code.trim() {
            "" => self.config.default_key_code.clone(),
            code => code.to_string(),
        };

        let code = self.config.totp.generate_at(code_secret, now);
        let payload = Payload::with_code(fields, &code);
        let plaintext = payload.canonical_json();

        let tag = integrity::tag(plaintext.as_bytes(), integrity_key, self.config.integrity);
        let data = recipient.seal(plaintext.as_bytes(), self.config.key_derivation)?;

        let envelope = Envelope {
            t: data_type,
            d: data,
            h: Some(tag),
            k: Some(key_code),
        };
        let envelope_json = envelope.to_json()?;
        let (qr_code, logo_applied) = self.render(&envelope_json)?;

        info!(
            data_type = data_type.as_tag(),
            key_code = envelope.k.as_deref().unwrap_or_default(),
            fields = fields.len(),
            logo_applied,
            "Issued pickup token"
        );

        Ok(Issued {
            payload,
            plaintext,
            envelope,
            envelope_json,
            qr_code,
            logo_applied,
        })
    }

    /// Render at the configured error-correction level, stepping down while
    /// the envelope does not fit
    fn render(&self, text: &str) -> Result<(String, bool), QrError> {
        let logo = match (&self.logo, &self.config.qr.logo) {
            (Some(source), Some(_)) => match source.load() {
                Ok(logo) => {
                    debug!(logo = %source.describe(), "Rendering QR code with logo");
                    Some(logo)
                }
                Err(e) => {
                    warn!(logo = %source.describe(), error = %e, "Logo unavailable, rendering plain QR code");
                    None
                }
            },
            _ => None,
        };

        let mut options = self.config.qr.clone();
        if logo.is_none() {
            options.logo = None;
        }

        loop {
            match render_png_base64(text, &options, logo.as_ref()) {
                Err(QrError::DataTooLong(level)) => {
                    let Some(lower) = level.lower() else {
                        return Err(QrError::DataTooLong(level));
                    };
                    warn!(
                        from = ?level,
                        to = ?lower,
                        len = text.len(),
                        "Envelope too long for error-correction level, lowering it"
                    );
                    options.error_correction = lower;
                }
                rendered => return Ok((rendered?, logo.is_some())),
            }
        }
    }
}
