//! Pickup QR - QR rendering with room for a brand mark
//!
//! Symbol encoding is delegated to the `qrcode` crate. This crate scales the
//! module grid into a pixel matrix, blanks a centred square for the logo
//! before rasterizing, and composites the logo afterwards.

mod logo;
mod matrix;
mod render;

pub use logo::{Base64Logo, BytesLogo, FileLogo, LogoSource};
pub use matrix::{encode_matrix, reserve_logo_space, BitMatrix, ErrorCorrection, LogoReservation, Rect, QUIET_ZONE};
pub use render::{decode_png_base64, render, render_png, render_png_base64, QrOptions};

/// Errors that can occur while producing a QR image
#[derive(Debug, thiserror::Error)]
pub enum QrError {
    #[error("QR encoding failed: {0}")]
    Encode(String),

    #[error("QR encoding failed: data too long for error-correction level {0:?}")]
    DataTooLong(ErrorCorrection),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Image encoding failed: {0}")]
    Image(String),

    #[error("Logo unavailable: {0}")]
    Logo(String),
}

pub type Result<T> = std::result::Result<T, QrError>;
