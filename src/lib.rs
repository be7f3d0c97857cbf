//! # qrgen - QR code generation action
//!
//! `qrgen` turns a text string into a QR code PNG and hands it back inside a
//! JSON envelope, the way serverless web actions return binary payloads:
//!
//! ```text
//! POST /qrgen  {"text": "hello"}
//!
//! {"statusCode":200,"headers":{"Content-Type":"image/png"},"body":"iVBORw0...","isBase64Encoded":true}
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 ActionServer (hyper)                     │
//! │   /_health   /_actions   /{action}                       │
//! │                     │                                    │
//! │              ActionRegistry                              │
//! │                     │                                    │
//! │   ┌─────────────────▼──────────────────────────────┐    │
//! │   │ QrGenAction: validate → encode → serialize     │    │
//! │   │                    │                           │    │
//! │   │          QrEncoder (qrcode + image/png)        │    │
//! │   └────────────────────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use qrgen::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let server = ActionServer::with_defaults();
//!     server.register_action("qrgen", Box::new(QrGenAction::new())).await?;
//!     server.run().await
//! }
//! ```
//!
//! The action can also be called directly, without the HTTP host:
//!
//! ```rust
//! use qrgen::prelude::*;
//!
//! let response = QrGenAction::new().handle(&Params::with_text("hello"));
//! assert_eq!(response.status_code, 200);
//! assert!(response.is_base64_encoded);
//! ```

pub mod action;
pub mod envelope;
pub mod http;
pub mod qr;
pub mod runtime;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::action::{Action, ActionContext, ActionError, ActionRegistry, QrGenAction};
    pub use crate::envelope::{ActionResponse, Params};
    pub use crate::http::{HttpRequest, HttpResponse, Method, StatusCode};
    pub use crate::qr::{PngQrEncoder, QrEncoder, QrError, QrSettings};
    pub use crate::runtime::{ActionServer, ServerConfig};
    pub use async_trait::async_trait;
}

pub use action::{Action, ActionContext, ActionError, ActionRegistry, QrGenAction};
pub use envelope::{ActionResponse, Params};
pub use runtime::{ActionServer, ServerConfig};
