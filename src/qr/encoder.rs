//! QR encoder: builds the symbol, paints it onto a grayscale raster and
//! serializes the raster as PNG.

use super::QrError;
use image::{GrayImage, ImageFormat, Luma};
use qrcode::{Color, EcLevel, QrCode, Version};
use std::io::Cursor;

/// Dark module color.
pub const FOREGROUND: Luma<u8> = Luma([0u8]);

/// Light module and quiet zone color.
pub const BACKGROUND: Luma<u8> = Luma([255u8]);

/// Parameters for building and rendering a QR symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrSettings {
    /// Symbol version (1-40), used as-is when `fit` is off.
    pub version: i16,
    /// Pick the smallest version that holds the data.
    pub fit: bool,
    /// Error correction level.
    pub ec_level: EcLevel,
    /// Pixels per module side.
    pub box_size: u32,
    /// Quiet zone width in modules.
    pub border: u32,
}

impl Default for QrSettings {
    fn default() -> Self {
        Self {
            version: 1,
            fit: true,
            ec_level: EcLevel::M,
            box_size: 10,
            border: 4,
        }
    }
}

impl QrSettings {
    /// Create settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fixed version.
    pub fn version(mut self, version: i16) -> Self {
        self.version = version;
        self
    }

    /// Enable or disable version fitting.
    pub fn fit(mut self, fit: bool) -> Self {
        self.fit = fit;
        self
    }

    /// Set the module size in pixels.
    pub fn box_size(mut self, box_size: u32) -> Self {
        self.box_size = box_size;
        self
    }

    /// Set the quiet zone width in modules.
    pub fn border(mut self, border: u32) -> Self {
        self.border = border;
        self
    }
}

/// Something that turns text into PNG bytes.
pub trait QrEncoder: Send + Sync {
    /// Encode `text` and return the PNG file contents.
    fn encode_png(&self, text: &str, settings: &QrSettings) -> Result<Vec<u8>, QrError>;
}

/// Default encoder backed by the `qrcode` and `image` crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngQrEncoder;

impl QrEncoder for PngQrEncoder {
    fn encode_png(&self, text: &str, settings: &QrSettings) -> Result<Vec<u8>, QrError> {
        let code = build_symbol(text, settings)?;
        let img = rasterize(&code, settings)?;
        to_png(&img)
    }
}

/// Build the QR symbol for `text`.
///
/// With `fit` set the smallest version that holds the data is used;
/// otherwise the symbol is built at exactly `settings.version`.
pub fn build_symbol(text: &str, settings: &QrSettings) -> Result<QrCode, QrError> {
    let code = if settings.fit {
        QrCode::with_error_correction_level(text.as_bytes(), settings.ec_level)?
    } else {
        QrCode::with_version(text.as_bytes(), Version::Normal(settings.version), settings.ec_level)?
    };
    Ok(code)
}

/// Paint the symbol onto a grayscale image with the configured module size
/// and quiet zone.
pub fn rasterize(code: &QrCode, settings: &QrSettings) -> Result<GrayImage, QrError> {
    if settings.box_size == 0 {
        return Err(QrError::InvalidSettings("box size must be positive".to_string()));
    }

    let width = code.width() as u32;
    let size = settings
        .border
        .checked_mul(2)
        .and_then(|quiet| quiet.checked_add(width))
        .and_then(|modules| modules.checked_mul(settings.box_size))
        .ok_or_else(|| QrError::InvalidSettings("image dimensions overflow".to_string()))?;

    let colors = code.to_colors();
    let border = settings.border as i64;
    let mut img = GrayImage::new(size, size);

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let module_x = (x / settings.box_size) as i64 - border;
        let module_y = (y / settings.box_size) as i64 - border;
        let inside = (0..width as i64).contains(&module_x) && (0..width as i64).contains(&module_y);
        let dark = inside && colors[(module_y * width as i64 + module_x) as usize] == Color::Dark;

        *pixel = if dark { FOREGROUND } else { BACKGROUND };
    }

    Ok(img)
}

/// Serialize the raster into an in-memory PNG file.
pub fn to_png(img: &GrayImage) -> Result<Vec<u8>, QrError> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}
