//! QR symbol encoding and PNG rasterization.

mod encoder;
mod error;

pub use encoder::{build_symbol, rasterize, to_png, PngQrEncoder, QrEncoder, QrSettings};
pub use error::QrError;
