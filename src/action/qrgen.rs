//! The QR generation action: validate, encode, serialize.

use crate::action::{Action, ActionContext};
use crate::envelope::{ActionResponse, Params};
use crate::http::StatusCode;
use crate::qr::{PngQrEncoder, QrEncoder, QrError, QrSettings};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Longest accepted input, in characters.
pub const MAX_TEXT_CHARS: usize = 2048;

/// Why a request did not produce an image.
#[derive(Debug)]
pub enum Rejection {
    /// `text` absent or empty.
    MissingText,
    /// `text` longer than [`MAX_TEXT_CHARS`].
    TooLong,
    /// The encoder failed.
    Encoding(QrError),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::MissingText => write!(f, "Missing 'text' parameter."),
            Rejection::TooLong => write!(
                f,
                "Input too long. Maximum {} characters allowed.",
                MAX_TEXT_CHARS
            ),
            Rejection::Encoding(err) => write!(f, "Error generating QR code: {}", err),
        }
    }
}

impl std::error::Error for Rejection {}

impl Rejection {
    /// Status code reported for this rejection.
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::MissingText => StatusCode::BAD_REQUEST,
            Rejection::TooLong => StatusCode::PAYLOAD_TOO_LARGE,
            Rejection::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<QrError> for Rejection {
    fn from(err: QrError) -> Self {
        Rejection::Encoding(err)
    }
}

impl From<Rejection> for ActionResponse {
    fn from(rejection: Rejection) -> Self {
        ActionResponse::error(rejection.status(), rejection.to_string())
    }
}

/// Turns `{"text": ...}` into a base64 PNG QR code envelope.
pub struct QrGenAction<E = PngQrEncoder> {
    encoder: E,
    settings: QrSettings,
}

impl QrGenAction<PngQrEncoder> {
    /// Create the action with the PNG encoder and default settings.
    pub fn new() -> Self {
        Self::with_encoder(PngQrEncoder)
    }
}

impl Default for QrGenAction<PngQrEncoder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: QrEncoder> QrGenAction<E> {
    /// Create the action around a custom encoder.
    pub fn with_encoder(encoder: E) -> Self {
        Self {
            encoder,
            settings: QrSettings::default(),
        }
    }

    /// Get the render settings.
    pub fn settings(&self) -> &QrSettings {
        &self.settings
    }

    /// Produce exactly one envelope for the given params.
    pub fn handle(&self, params: &Params) -> ActionResponse {
        match self.generate(params.text()) {
            Ok(png) => {
                debug!("Generated QR code ({} bytes PNG)", png.len());
                ActionResponse::binary("image/png", &png)
            }
            Err(rejection) => {
                warn!("QR request rejected: {}", rejection);
                rejection.into()
            }
        }
    }

    /// Validate the text and encode it as PNG bytes.
    pub fn generate(&self, text: &str) -> Result<Vec<u8>, Rejection> {
        if text.is_empty() {
            return Err(Rejection::MissingText);
        }

        let chars = text.chars().count();
        if chars > MAX_TEXT_CHARS {
            return Err(Rejection::TooLong);
        }

        debug!("Encoding {} characters", chars);
        Ok(self.encoder.encode_png(text, &self.settings)?)
    }
}

#[async_trait]
impl<E: QrEncoder> Action for QrGenAction<E> {
    async fn invoke(&self, params: Params, ctx: &ActionContext) -> ActionResponse {
        debug!("Invoking '{}' [{}]", ctx.action_name, ctx.request_id);
        self.handle(&params)
    }

    fn name(&self) -> &str {
        "qrgen"
    }
}
