//! Rasterization, logo compositing and PNG output

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::matrix::{encode_matrix, reserve_logo_space, ErrorCorrection, LogoReservation};
use crate::{QrError, Result};

pub const DEFAULT_SIZE: u32 = 400;

const DARK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const LIGHT: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// How a code is drawn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrOptions {
    pub width: u32,
    pub height: u32,
    pub error_correction: ErrorCorrection,
    /// Centred square to blank before rasterizing; `None` draws a plain code
    pub logo: Option<LogoReservation>,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_SIZE,
            height: DEFAULT_SIZE,
            error_correction: ErrorCorrection::default(),
            logo: Some(LogoReservation::default()),
        }
    }
}

impl QrOptions {
    pub fn plain(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            logo: None,
            ..Self::default()
        }
    }
}

/// Draw `text` as a QR image.
///
/// With a reservation the centred square is blanked at matrix level first.
/// A logo image, if given, is resized to the reservation size and drawn
/// over the blank square after rasterization. Without a reservation the
/// logo is ignored.
pub fn render(text: &str, options: &QrOptions, logo: Option<&DynamicImage>) -> Result<RgbaImage> {
    let mut matrix = encode_matrix(text, options.width, options.height, options.error_correction)?;

    if let Some(reservation) = &options.logo {
        reserve_logo_space(&mut matrix, reservation);
    }

    let mut canvas = RgbaImage::from_fn(matrix.width(), matrix.height(), |x, y| {
        if matrix.get(x, y) {
            DARK
        } else {
            LIGHT
        }
    });

    if let (Some(reservation), Some(logo)) = (&options.logo, logo) {
        if reservation.size > 0 {
            let resized = imageops::resize(
                &logo.to_rgba8(),
                reservation.size,
                reservation.size,
                FilterType::CatmullRom,
            );
            let (x, y) = reservation.logo_origin(canvas.width(), canvas.height());
            imageops::overlay(&mut canvas, &resized, x, y);
        }
    }

    Ok(canvas)
}

/// Render and encode as PNG bytes
pub fn render_png(text: &str, options: &QrOptions, logo: Option<&DynamicImage>) -> Result<Vec<u8>> {
    let image = DynamicImage::ImageRgba8(render(text, options, logo)?).into_rgb8();
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| QrError::Image(e.to_string()))?;
    Ok(bytes)
}

/// Render and encode as base64 PNG
pub fn render_png_base64(text: &str, options: &QrOptions, logo: Option<&DynamicImage>) -> Result<String> {
    Ok(STANDARD.encode(render_png(text, options, logo)?))
}

/// Decode a base64 PNG, as produced by [`render_png_base64`]
pub fn decode_png_base64(encoded: &str) -> Result<DynamicImage> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| QrError::Image(e.to_string()))?;
    image::load_from_memory_with_format(&bytes, ImageFormat::Png).map_err(|e| QrError::Image(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = r#"{"t":"SS","d":"QUJDREVGR0hJSktMTU5PUFFSU1RVVldYWVo=","h":"aGFzaA==","k":"default"}"#;

    fn red_logo() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 16, Rgba([220, 20, 60, 255])))
    }

    #[test]
    fn test_plain_render_has_no_blank_square() {
        let plain = render(TEXT, &QrOptions::plain(400, 400), None).unwrap();
        let reserved = render(TEXT, &QrOptions::default(), None).unwrap();
        let rect = LogoReservation::default().reserved_rect(400, 400);

        let mut differs_inside = false;
        for (x, y, pixel) in plain.enumerate_pixels() {
            let other = reserved.get_pixel(x, y);
            if rect.contains(x, y) {
                assert_eq!(*other, LIGHT);
                differs_inside |= pixel != other;
            } else {
                assert_eq!(pixel, other);
            }
        }
        assert!(differs_inside, "the centre of a plain code should contain dark modules");
    }

    #[test]
    fn test_logo_differences_confined_to_reserved_square() {
        let options = QrOptions::default();
        let without_logo = render(TEXT, &options, None).unwrap();
        let with_logo = render(TEXT, &options, Some(&red_logo())).unwrap();
        let rect = LogoReservation::default().reserved_rect(400, 400);

        let mut changed = 0;
        for (x, y, pixel) in with_logo.enumerate_pixels() {
            let other = without_logo.get_pixel(x, y);
            if pixel != other {
                assert!(rect.contains(x, y), "pixel ({x},{y}) changed outside the reservation");
                changed += 1;
            }
        }
        assert_eq!(changed, 60 * 60);
    }

    #[test]
    fn test_blank_region_identical_with_or_without_logo() {
        let options = QrOptions::default();
        let rect = LogoReservation::default().reserved_rect(400, 400);
        let (logo_x, logo_y) = LogoReservation::default().logo_origin(400, 400);

        let without_logo = render(TEXT, &options, None).unwrap();
        let with_logo = render(TEXT, &options, Some(&red_logo())).unwrap();

        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                assert_eq!(*without_logo.get_pixel(x, y), LIGHT);
                let in_logo = i64::from(x) >= logo_x
                    && i64::from(x) < logo_x + 60
                    && i64::from(y) >= logo_y
                    && i64::from(y) < logo_y + 60;
                if !in_logo {
                    assert_eq!(*with_logo.get_pixel(x, y), LIGHT);
                }
            }
        }
    }

    #[test]
    fn test_logo_ignored_without_reservation() {
        let options = QrOptions::plain(300, 300);
        let a = render(TEXT, &options, None).unwrap();
        let b = render(TEXT, &options, Some(&red_logo())).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_png_base64_roundtrip() {
        let encoded = render_png_base64(TEXT, &QrOptions::default(), Some(&red_logo())).unwrap();
        let decoded = decode_png_base64(&encoded).unwrap();
        assert_eq!(decoded.width(), 400);
        assert_eq!(decoded.height(), 400);
    }

    #[test]
    fn test_custom_size() {
        let options = QrOptions {
            width: 500,
            height: 500,
            logo: Some(LogoReservation::new(100)),
            ..QrOptions::default()
        };
        let image = render(TEXT, &options, None).unwrap();
        assert_eq!(image.dimensions(), (500, 500));
    }
}
