//! Errors raised while encoding or rendering a QR code.

/// Failure anywhere in the encode, render or save path.
#[derive(Debug)]
pub enum QrError {
    /// The symbol could not be built (data too long, bad version, ...).
    Encode(qrcode::types::QrError),
    /// The raster could not be written as PNG.
    Image(image::ImageError),
    /// The render settings cannot produce an image.
    InvalidSettings(String),
}

impl std::fmt::Display for QrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QrError::Encode(err) => write!(f, "{}", err),
            QrError::Image(err) => write!(f, "{}", err),
            QrError::InvalidSettings(message) => write!(f, "invalid settings: {}", message),
        }
    }
}

impl std::error::Error for QrError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QrError::Encode(err) => Some(err),
            QrError::Image(err) => Some(err),
            QrError::InvalidSettings(_) => None,
        }
    }
}

impl From<qrcode::types::QrError> for QrError {
    fn from(err: qrcode::types::QrError) -> Self {
        QrError::Encode(err)
    }
}

impl From<image::ImageError> for QrError {
    fn from(err: image::ImageError) -> Self {
        QrError::Image(err)
    }
}
