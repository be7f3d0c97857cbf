//! Action trait, invocation context and host error type.

use crate::envelope::{ActionResponse, Params};
use crate::http::{HttpResponse, StatusCode};
use async_trait::async_trait;
use std::collections::HashMap;

/// Execution context for an action invocation.
#[derive(Debug, Clone, Default)]
pub struct ActionContext {
    /// Environment variables available to the action.
    pub env: HashMap<String, String>,
    /// Action name.
    pub action_name: String,
    /// Request ID for tracing.
    pub request_id: String,
}

impl ActionContext {
    /// Create a new action context.
    pub fn new(action_name: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            env: HashMap::new(),
            action_name: action_name.into(),
            request_id: request_id.into(),
        }
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Get an environment variable.
    pub fn get_env(&self, key: &str) -> Option<&String> {
        self.env.get(key)
    }
}

/// A hosted action.
///
/// `invoke` always yields an envelope: failures inside the action are
/// reported through the envelope's status code, never as an `Err`.
#[async_trait]
pub trait Action: Send + Sync {
    /// Called once before the first invocation.
    async fn on_load(&mut self, ctx: &ActionContext) -> Result<(), ActionError> {
        let _ = ctx;
        Ok(())
    }

    /// Handle one invocation.
    async fn invoke(&self, params: Params, ctx: &ActionContext) -> ActionResponse;

    /// Called when the action is unloaded.
    async fn on_unload(&mut self, ctx: &ActionContext) -> Result<(), ActionError> {
        let _ = ctx;
        Ok(())
    }

    /// Get the action name.
    fn name(&self) -> &str;
}

/// Host-level error: raised before an action is reached (routing, body
/// parsing, lifecycle) and turned into a plain HTTP response.
#[derive(Debug, Clone)]
pub struct ActionError {
    /// Error message.
    pub message: String,
    /// HTTP status code.
    pub code: u16,
}

impl ActionError {
    /// Create a new internal error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: StatusCode::INTERNAL_SERVER_ERROR.0,
        }
    }

    /// Create an error with a specific code.
    pub fn with_code(code: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::NOT_FOUND.0, message)
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::BAD_REQUEST.0, message)
    }

    /// Create a method not allowed error.
    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::METHOD_NOT_ALLOWED.0, message)
    }

    /// Create a payload too large error.
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::PAYLOAD_TOO_LARGE.0, message)
    }
}

impl std::fmt::Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ActionError {}

impl From<ActionError> for HttpResponse {
    fn from(err: ActionError) -> Self {
        HttpResponse::error(err.code, err.message)
    }
}

impl From<std::io::Error> for ActionError {
    fn from(err: std::io::Error) -> Self {
        ActionError::new(err.to_string())
    }
}

impl From<serde_json::Error> for ActionError {
    fn from(err: serde_json::Error) -> Self {
        ActionError::bad_request(err.to_string())
    }
}
