//! Where logo images come from

use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::DynamicImage;

use crate::QrError;

/// A brand mark to draw in the reserved square
pub trait LogoSource: Send + Sync {
    fn load(&self) -> Result<DynamicImage, QrError>;

    /// Short label for log lines
    fn describe(&self) -> String;
}

/// Logo read from disk on every load
#[derive(Debug, Clone)]
pub struct FileLogo {
    path: PathBuf,
}

impl FileLogo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LogoSource for FileLogo {
    fn load(&self) -> Result<DynamicImage, QrError> {
        image::open(&self.path).map_err(|e| QrError::Logo(format!("{}: {e}", self.path.display())))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Logo held as encoded PNG or JPEG bytes
#[derive(Debug, Clone)]
pub struct BytesLogo(pub Vec<u8>);

impl LogoSource for BytesLogo {
    fn load(&self) -> Result<DynamicImage, QrError> {
        image::load_from_memory(&self.0).map_err(|e| QrError::Logo(e.to_string()))
    }

    fn describe(&self) -> String {
        format!("{} in-memory bytes", self.0.len())
    }
}

/// Logo carried as base64 text, e.g. from a config file
#[derive(Debug, Clone)]
pub struct Base64Logo(pub String);

impl LogoSource for Base64Logo {
    fn load(&self) -> Result<DynamicImage, QrError> {
        let bytes = STANDARD
            .decode(self.0.trim())
            .map_err(|e| QrError::Logo(format!("invalid base64: {e}")))?;
        BytesLogo(bytes).load()
    }

    fn describe(&self) -> String {
        "base64 image".to_string()
    }
}
