//! Pixel-level QR matrix and logo reservation

use qrcode::types::QrError as SymbolError;
use qrcode::{Color, EcLevel, QrCode};
use serde::{Deserialize, Serialize};

use crate::{QrError, Result};

/// Light modules around the symbol, in modules
pub const QUIET_ZONE: usize = 4;

pub const DEFAULT_LOGO_SIZE: u32 = 60;
pub const DEFAULT_LOGO_MARGIN: u32 = 5;

/// Share of the image area past which a reserved square risks an unreadable code
const LOGO_AREA_WARN_RATIO: f64 = 0.15;

/// Error-correction level handed to the symbol encoder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCorrection {
    Low,
    Medium,
    Quartile,
    #[default]
    High,
}

impl ErrorCorrection {
    /// Next level down, `None` at `Low`
    pub fn lower(self) -> Option<Self> {
        match self {
            Self::High => Some(Self::Quartile),
            Self::Quartile => Some(Self::Medium),
            Self::Medium => Some(Self::Low),
            Self::Low => None,
        }
    }
}

impl From<ErrorCorrection> for EcLevel {
    fn from(level: ErrorCorrection) -> Self {
        match level {
            ErrorCorrection::Low => EcLevel::L,
            ErrorCorrection::Medium => EcLevel::M,
            ErrorCorrection::Quartile => EcLevel::Q,
            ErrorCorrection::High => EcLevel::H,
        }
    }
}

/// Axis-aligned pixel rectangle, `[x, x + width) x [y, y + height)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Dark/light grid at pixel resolution. `true` is dark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMatrix {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl BitMatrix {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Out-of-range coordinates read as light
    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, dark: bool) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.bits[i] = dark;
        }
    }

    /// Set every pixel of `rect` (clipped to the matrix) to `dark`
    pub fn fill(&mut self, rect: Rect, dark: bool) {
        let x_end = rect.x.saturating_add(rect.width).min(self.width);
        let y_end = rect.y.saturating_add(rect.height).min(self.height);
        for y in rect.y..y_end {
            for x in rect.x..x_end {
                let i = self.index(x, y);
                self.bits[i] = dark;
            }
        }
    }

    pub fn count_dark(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }
}

/// Centred square kept free for a brand mark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogoReservation {
    /// Logo side in pixels
    pub size: u32,
    /// Light border around the logo in pixels
    pub margin: u32,
}

impl Default for LogoReservation {
    fn default() -> Self {
        Self {
            size: DEFAULT_LOGO_SIZE,
            margin: DEFAULT_LOGO_MARGIN,
        }
    }
}

impl LogoReservation {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// Top-left corner of the logo itself; negative when the logo is wider than the image
    pub fn logo_origin(&self, width: u32, height: u32) -> (i64, i64) {
        (
            (i64::from(width) - i64::from(self.size)) / 2,
            (i64::from(height) - i64::from(self.size)) / 2,
        )
    }

    /// The blanked square (logo plus margin), clipped to the image
    pub fn reserved_rect(&self, width: u32, height: u32) -> Rect {
        let (logo_x, logo_y) = self.logo_origin(width, height);
        let margin = i64::from(self.margin);
        let side = i64::from(self.size) + 2 * margin;

        let clip = |start: i64, limit: u32| -> (u32, u32) {
            let lo = start.clamp(0, i64::from(limit));
            let hi = (start + side).clamp(0, i64::from(limit));
            (lo as u32, (hi - lo) as u32)
        };
        let (x, w) = clip(logo_x - margin, width);
        let (y, h) = clip(logo_y - margin, height);
        Rect {
            x,
            y,
            width: w,
            height: h,
        }
    }

    /// Fraction of the image the reserved square covers
    pub fn area_ratio(&self, width: u32, height: u32) -> f64 {
        let rect = self.reserved_rect(width, height);
        let total = f64::from(width) * f64::from(height);
        if total == 0.0 {
            return 0.0;
        }
        f64::from(rect.width) * f64::from(rect.height) / total
    }
}

/// Encode `text` and scale it into a `width` x `height` pixel matrix.
///
/// Each module becomes a solid block of the largest integer size that fits
/// with a four-module quiet zone; the symbol is centred. The output grows
/// past the requested size when the symbol would not otherwise fit.
/// Text beyond the capacity of `error_correction` is `QrError::DataTooLong`.
pub fn encode_matrix(
    text: &str,
    width: u32,
    height: u32,
    error_correction: ErrorCorrection,
) -> Result<BitMatrix> {
    if width == 0 || height == 0 {
        return Err(QrError::InvalidDimensions { width, height });
    }

    let code = QrCode::with_error_correction_level(text.as_bytes(), error_correction.into())
        .map_err(|e| match e {
            SymbolError::DataTooLong => QrError::DataTooLong(error_correction),
            other => QrError::Encode(other.to_string()),
        })?;
    let modules = code.width();
    let colors = code.to_colors();

    let padded = modules + 2 * QUIET_ZONE;
    let out_width = (width as usize).max(padded);
    let out_height = (height as usize).max(padded);
    let multiple = (out_width / padded).min(out_height / padded);
    let left = (out_width - modules * multiple) / 2;
    let top = (out_height - modules * multiple) / 2;

    let mut matrix = BitMatrix::new(out_width as u32, out_height as u32);
    for my in 0..modules {
        for mx in 0..modules {
            if colors[my * modules + mx] == Color::Dark {
                matrix.fill(
                    Rect {
                        x: (left + mx * multiple) as u32,
                        y: (top + my * multiple) as u32,
                        width: multiple as u32,
                        height: multiple as u32,
                    },
                    true,
                );
            }
        }
    }
    Ok(matrix)
}

/// Blank the reserved square so error correction absorbs it, and return it.
pub fn reserve_logo_space(matrix: &mut BitMatrix, reservation: &LogoReservation) -> Rect {
    let ratio = reservation.area_ratio(matrix.width(), matrix.height());
    if ratio > LOGO_AREA_WARN_RATIO {
        tracing::warn!(
            ratio,
            size = reservation.size,
            "logo reservation covers a large share of the code; it may not scan"
        );
    }
    let rect = reservation.reserved_rect(matrix.width(), matrix.height());
    matrix.fill(rect, false);
    rect
}
