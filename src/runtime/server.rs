//! Action server: accepts HTTP connections and routes requests to actions.

use crate::action::{Action, ActionError, ActionRegistry};
use crate::envelope::Params;
use crate::http::{HttpRequest, HttpResponse, Method, StatusCode};
use crate::runtime::ServerConfig;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// HTTP host for actions.
///
/// `POST /{action}` with a JSON object body invokes the named action and
/// returns its envelope.
pub struct ActionServer {
    config: ServerConfig,
    registry: Arc<ActionRegistry>,
}

impl ActionServer {
    /// Create a new server.
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(ActionRegistry::with_env(config.env.clone()));
        Self { config, registry }
    }

    /// Create a new server with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default())
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Register an action with the server.
    pub async fn register_action(
        &self,
        name: impl Into<String>,
        action: Box<dyn Action>,
    ) -> Result<(), ActionError> {
        self.registry.register(name, action).await
    }

    /// Bind the configured address and serve forever.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr: SocketAddr = self.config.bind_addr().parse()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(
        self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Action server listening on {}", listener.local_addr()?);

        let registry = self.registry.clone();
        let config = Arc::new(self.config);

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);

            let registry = registry.clone();
            let config = config.clone();

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let registry = registry.clone();
                    let config = config.clone();
                    async move { handle_request(req, registry, config, remote_addr).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection: {:?}", err);
                }
            });
        }
    }
}

async fn handle_request(
    req: Request<Incoming>,
    registry: Arc<ActionRegistry>,
    config: Arc<ServerConfig>,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let path = req.uri().path().to_string();
    let method = Method::from(req.method());
    let request_id = generate_request_id();

    debug!(
        "Handling request: {} {} from {} [{}]",
        method, path, remote_addr, request_id
    );

    if config.enable_health && path == "/_health" {
        return Ok(build_response(HttpResponse::text("OK")));
    }

    if config.enable_listing && path == "/_actions" {
        let mut actions = Vec::new();
        for (name, state) in registry.list().await {
            let active = registry.active_invocations(&name).await.unwrap_or_default();
            actions.push(serde_json::json!({
                "name": name,
                "state": format!("{:?}", state),
                "active": active,
            }));
        }
        let listing = serde_json::json!({ "actions": actions });
        return Ok(build_response(
            HttpResponse::json(&listing).unwrap_or_else(|_| HttpResponse::text("{}")),
        ));
    }

    // Expected format: /{action_name}[/...]
    let action_name = path
        .trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string();

    if action_name.is_empty() {
        return Ok(build_response(HttpResponse::error(
            StatusCode::NOT_FOUND,
            "No action specified",
        )));
    }

    if registry.get_state(&action_name).await.is_none() {
        return Ok(build_response(
            ActionError::not_found(format!("Action '{}' not found", action_name)).into(),
        ));
    }

    if method != Method::Post {
        let response: HttpResponse = ActionError::method_not_allowed(format!(
            "Method {} not allowed, use POST",
            method
        ))
        .into();
        return Ok(build_response(response.header("Allow", "POST")));
    }

    let result = match convert_request(req, method, config.max_body_size).await {
        Ok(request) => Params::from_request(&request),
        Err(e) => Err(e),
    };
    let params = match result {
        Ok(params) => params,
        Err(e) => {
            warn!("Rejected request to '{}': {} [{}]", action_name, e, request_id);
            return Ok(build_response(e.into()));
        }
    };

    match registry.execute(&action_name, params, &request_id).await {
        Ok(envelope) => {
            info!(
                "Action '{}' returned {} [{}]",
                action_name, envelope.status_code, request_id
            );
            Ok(build_response(envelope.into_http(config.web_mode)))
        }
        Err(e) => {
            error!("Action '{}' error: {} [{}]", action_name, e, request_id);
            Ok(build_response(e.into()))
        }
    }
}

/// Read the body of a hyper request, enforcing the size limit.
async fn convert_request(
    req: Request<Incoming>,
    method: Method,
    max_body_size: usize,
) -> Result<HttpRequest, ActionError> {
    let body = Limited::new(req.into_body(), max_body_size)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                ActionError::payload_too_large("Request body too large")
            } else {
                ActionError::bad_request(format!("Failed to read request body: {}", e))
            }
        })?
        .to_bytes();

    Ok(HttpRequest::new(method).body(body))
}

/// Build a hyper response from an `HttpResponse`.
fn build_response(response: HttpResponse) -> Response<Full<Bytes>> {
    let status = hyper::StatusCode::from_u16(response.status.0).unwrap_or_else(|_| {
        warn!(
            "Invalid status code {}, falling back to 500 Internal Server Error",
            response.status.0
        );
        hyper::StatusCode::INTERNAL_SERVER_ERROR
    });

    let mut builder = Response::builder().status(status);
    for (name, value) in response.headers {
        builder = builder.header(name, value);
    }

    builder
        .body(Full::new(response.body.unwrap_or_default()))
        .unwrap_or_else(|e| {
            error!("Failed to build response: {}", e);
            let mut fallback = Response::new(Full::new(Bytes::from_static(b"Internal Server Error")));
            *fallback.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
}

/// Generate a request ID from the current timestamp.
fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("{:x}", timestamp)
}
