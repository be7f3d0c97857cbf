//! Action params and the response envelope returned to the host.

use crate::action::ActionError;
use crate::http::{HttpRequest, HttpResponse, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Parameters passed to an action. Only `text` is consumed; any other field
/// in the request object is accepted and ignored. A `text` that is not a
/// JSON string counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    #[serde(
        default,
        deserialize_with = "string_or_absent",
        skip_serializing_if = "Option::is_none"
    )]
    pub text: Option<String>,
}

fn string_or_absent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(text) => Ok(Some(text)),
        _ => Ok(None),
    }
}

impl Params {
    /// Params carrying the given text.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    /// The text field, empty when absent.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    /// Read params from a request body. An empty body yields empty params;
    /// anything else must be a JSON object.
    pub fn from_request(request: &HttpRequest) -> Result<Self, ActionError> {
        match request.json::<serde_json::Value>() {
            None => Ok(Self::default()),
            Some(Ok(value @ serde_json::Value::Object(_))) => Ok(serde_json::from_value(value)?),
            Some(Ok(_)) => Err(ActionError::bad_request("Request body must be a JSON object")),
            Some(Err(e)) => Err(e.into()),
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Response envelope: `{statusCode, headers, body, isBase64Encoded}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    pub body: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_base64_encoded: bool,
}

impl ActionResponse {
    /// A successful response carrying binary content as base64.
    pub fn binary(content_type: impl Into<String>, content: &[u8]) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), content_type.into());

        Self {
            status_code: StatusCode::OK.0,
            headers: Some(headers),
            body: STANDARD.encode(content),
            is_base64_encoded: true,
        }
    }

    /// An error response with a plain message body and no headers.
    pub fn error(status: impl Into<StatusCode>, message: impl Into<String>) -> Self {
        Self {
            status_code: status.into().0,
            headers: None,
            body: message.into(),
            is_base64_encoded: false,
        }
    }

    /// Get a header value.
    pub fn get_header(&self, key: &str) -> Option<&String> {
        self.headers.as_ref().and_then(|h| h.get(key))
    }

    /// Decode the body, undoing base64 when flagged.
    pub fn decoded_body(&self) -> Result<Vec<u8>, base64::DecodeError> {
        if self.is_base64_encoded {
            STANDARD.decode(&self.body)
        } else {
            Ok(self.body.clone().into_bytes())
        }
    }

    /// Map the envelope onto an HTTP response.
    ///
    /// Without `web_mode` the envelope itself is the JSON body and the HTTP
    /// status mirrors `statusCode`. With `web_mode` the host unwraps it: the
    /// decoded body becomes the payload and the envelope headers are applied.
    pub fn into_http(self, web_mode: bool) -> HttpResponse {
        let status = StatusCode(self.status_code);

        if !web_mode {
            return match HttpResponse::json(&self) {
                Ok(response) => response.status(status),
                Err(e) => HttpResponse::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            };
        }

        let body = match self.decoded_body() {
            Ok(body) => body,
            Err(e) => {
                return HttpResponse::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Invalid base64 body: {}", e),
                )
            }
        };

        let mut response = HttpResponse::new(status)
            .header("Content-Type", "text/plain")
            .body(body);
        for (key, value) in self.headers.unwrap_or_default() {
            response = response.header(key, value);
        }
        response
    }
}
