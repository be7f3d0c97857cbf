//! Integration tests for the qrgen action and its host.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use qrgen::action::qrgen::MAX_TEXT_CHARS;
use qrgen::action::ActionState;
use qrgen::prelude::*;
use qrgen::qr::build_symbol;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A simple action that echoes the text back.
struct EchoAction;

#[async_trait]
impl Action for EchoAction {
    async fn invoke(&self, params: Params, ctx: &ActionContext) -> ActionResponse {
        let region = ctx.get_env("REGION").cloned().unwrap_or_default();
        ActionResponse {
            status_code: 200,
            headers: None,
            body: format!("{}{}", params.text(), region),
            is_base64_encoded: false,
        }
    }

    fn name(&self) -> &str {
        "echo"
    }
}

/// Encoder that always fails.
struct BrokenEncoder;

impl QrEncoder for BrokenEncoder {
    fn encode_png(&self, _text: &str, _settings: &QrSettings) -> Result<Vec<u8>, QrError> {
        Err(QrError::InvalidSettings("encoder unavailable".to_string()))
    }
}

fn decode_png(response: &ActionResponse) -> image::GrayImage {
    let bytes = STANDARD.decode(&response.body).unwrap();
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    image::load_from_memory(&bytes).unwrap().to_luma8()
}

#[tokio::test]
async fn test_qr_success_envelope() {
    let response = QrGenAction::new().handle(&Params::with_text("https://example.com"));

    assert_eq!(response.status_code, 200);
    assert!(response.is_base64_encoded);
    assert_eq!(
        response.get_header("Content-Type"),
        Some(&"image/png".to_string())
    );
    assert!(!response.body.is_empty());
    decode_png(&response);
}

#[tokio::test]
async fn test_qr_missing_text() {
    for params in [Params::default(), Params::with_text("")] {
        let response = QrGenAction::new().handle(&params);
        assert_eq!(response.status_code, 400);
        assert_eq!(response.body, "Missing 'text' parameter.");
    }
}

#[tokio::test]
async fn test_qr_length_boundary() {
    let action = QrGenAction::new();

    let response = action.handle(&Params::with_text("a".repeat(MAX_TEXT_CHARS)));
    assert_eq!(response.status_code, 200);

    let response = action.handle(&Params::with_text("a".repeat(MAX_TEXT_CHARS + 1)));
    assert_eq!(response.status_code, 413);
    assert_eq!(
        response.body,
        "Input too long. Maximum 2048 characters allowed."
    );
}

/// Scan the PNG with an independent QR reader.
fn scan(response: &ActionResponse) -> String {
    let img = decode_png(response);
    let (width, height) = img.dimensions();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        width as usize,
        height as usize,
        |x, y| img.get_pixel(x as u32, y as u32).0[0],
    );
    let grids = prepared.detect_grids();
    assert_eq!(grids.len(), 1, "expected exactly one QR code");
    let (_meta, content) = grids[0].decode().unwrap();
    content
}

#[tokio::test]
async fn test_qr_scans_back_to_text() {
    let action = QrGenAction::new();
    let inputs = [
        "hello".to_string(),
        "a".repeat(MAX_TEXT_CHARS),
        "héllo wörld ñ αβ дж 42".to_string(),
        "https://example.com/path?q=1&r=two".to_string(),
    ];

    for text in inputs {
        let response = action.handle(&Params::with_text(text.clone()));
        assert_eq!(response.status_code, 200);
        assert_eq!(scan(&response), text);
    }
}

#[tokio::test]
async fn test_qr_image_matches_symbol() {
    let text = "Hello, QR! 1234";
    let response = QrGenAction::new().handle(&Params::with_text(text));
    let img = decode_png(&response);

    let settings = QrSettings::default();
    let code = build_symbol(text, &settings).unwrap();
    let width = code.width() as u32;
    let side = (width + 2 * settings.border) * settings.box_size;
    assert_eq!(img.dimensions(), (side, side));

    // Sample each module at its centre.
    let colors = code.to_colors();
    for my in 0..width {
        for mx in 0..width {
            let px = (mx + settings.border) * settings.box_size + settings.box_size / 2;
            let py = (my + settings.border) * settings.box_size + settings.box_size / 2;
            let dark = img.get_pixel(px, py).0[0] == 0;
            let expected = colors[(my * width + mx) as usize] == qrcode::Color::Dark;
            assert_eq!(dark, expected, "module ({}, {})", mx, my);
        }
    }

    // Quiet zone is all white.
    let quiet = settings.border * settings.box_size;
    for i in 0..side {
        for j in 0..quiet {
            assert_eq!(img.get_pixel(i, j).0[0], 255);
            assert_eq!(img.get_pixel(j, i).0[0], 255);
        }
    }
}

#[tokio::test]
async fn test_qr_deterministic() {
    let action = QrGenAction::new();
    let first = action.handle(&Params::with_text("repeatable"));
    let second = action.handle(&Params::with_text("repeatable"));
    assert_eq!(first.body, second.body);
}

#[tokio::test]
async fn test_qr_encoder_failure() {
    let action = QrGenAction::with_encoder(BrokenEncoder);
    let response = action.handle(&Params::with_text("hello"));

    assert_eq!(response.status_code, 500);
    assert!(response.body.starts_with("Error generating QR code: "));
    assert!(response.body.ends_with("encoder unavailable"));
    assert_eq!(response.headers, None);
}

#[tokio::test]
async fn test_action_registry_register() {
    let registry = ActionRegistry::new();

    let result = registry.register("qrgen", Box::new(QrGenAction::new())).await;
    assert!(result.is_ok());

    let actions = registry.list().await;
    assert_eq!(actions, vec![("qrgen".to_string(), ActionState::Unloaded)]);
}

#[tokio::test]
async fn test_action_registry_duplicate_register() {
    let registry = ActionRegistry::new();

    registry
        .register("qrgen", Box::new(QrGenAction::new()))
        .await
        .unwrap();

    let result = registry.register("qrgen", Box::new(EchoAction)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_action_registry_execute() {
    let registry = ActionRegistry::new();
    registry
        .register("qrgen", Box::new(QrGenAction::new()))
        .await
        .unwrap();

    let response = registry
        .execute("qrgen", Params::with_text("hi"), "req-123")
        .await
        .unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(registry.get_state("qrgen").await, Some(ActionState::Ready));
}

#[tokio::test]
async fn test_action_registry_execute_not_found() {
    let registry = ActionRegistry::new();

    let result = registry
        .execute("nonexistent", Params::default(), "req-123")
        .await;

    assert_eq!(result.unwrap_err().code, 404);
}

#[tokio::test]
async fn test_action_registry_global_env() {
    let mut env = std::collections::HashMap::new();
    env.insert("REGION".to_string(), "-eu".to_string());
    let registry = ActionRegistry::with_env(env);
    registry.register("echo", Box::new(EchoAction)).await.unwrap();

    let response = registry
        .execute("echo", Params::with_text("hi"), "req-1")
        .await
        .unwrap();
    assert_eq!(response.body, "hi-eu");
}

/// Tracks on_load / on_unload calls.
struct LifecycleAction {
    loaded: Arc<AtomicBool>,
}

#[async_trait]
impl Action for LifecycleAction {
    async fn on_load(&mut self, _ctx: &ActionContext) -> Result<(), ActionError> {
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn invoke(&self, _params: Params, _ctx: &ActionContext) -> ActionResponse {
        ActionResponse::error(204, "")
    }

    async fn on_unload(&mut self, _ctx: &ActionContext) -> Result<(), ActionError> {
        self.loaded.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "lifecycle"
    }
}

#[tokio::test]
async fn test_action_load_unload_lifecycle() {
    let loaded = Arc::new(AtomicBool::new(false));
    let registry = ActionRegistry::new();

    registry
        .register(
            "lifecycle",
            Box::new(LifecycleAction {
                loaded: loaded.clone(),
            }),
        )
        .await
        .unwrap();

    assert_eq!(
        registry.get_state("lifecycle").await,
        Some(ActionState::Unloaded)
    );
    assert!(!loaded.load(Ordering::SeqCst));

    registry.load("lifecycle").await.unwrap();
    assert_eq!(registry.get_state("lifecycle").await, Some(ActionState::Ready));
    assert!(loaded.load(Ordering::SeqCst));

    registry.remove("lifecycle").await.unwrap();
    assert_eq!(registry.get_state("lifecycle").await, None);
    assert!(!loaded.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_action_context() {
    let ctx = ActionContext::new("qrgen", "req-456").with_env("ENV", "test");

    assert_eq!(ctx.action_name, "qrgen");
    assert_eq!(ctx.request_id, "req-456");
    assert_eq!(ctx.get_env("ENV"), Some(&"test".to_string()));
    assert_eq!(ctx.get_env("NONEXISTENT"), None);
}

#[tokio::test]
async fn test_action_error_conversion() {
    let response: HttpResponse = ActionError::not_found("Action 'x' not found").into();
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.text_body(), Some("Action 'x' not found".to_string()));
}

/// Action whose `on_load` takes a while, counting how often it runs.
struct SlowLoadAction {
    loads: Arc<AtomicUsize>,
}

#[async_trait]
impl Action for SlowLoadAction {
    async fn on_load(&mut self, _ctx: &ActionContext) -> Result<(), ActionError> {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn invoke(&self, params: Params, _ctx: &ActionContext) -> ActionResponse {
        QrGenAction::new().handle(&params)
    }

    fn name(&self) -> &str {
        "slow"
    }
}

#[tokio::test]
async fn test_concurrent_first_requests_wait_for_load() {
    let loads = Arc::new(AtomicUsize::new(0));
    let registry = ActionRegistry::new();
    registry
        .register(
            "slow",
            Box::new(SlowLoadAction {
                loads: loads.clone(),
            }),
        )
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        registry.execute("slow", Params::with_text("one"), "r1"),
        registry.execute("slow", Params::with_text("two"), "r2"),
    );

    assert_eq!(first.unwrap().status_code, 200);
    assert_eq!(second.unwrap().status_code, 200);
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(registry.get_state("slow").await, Some(ActionState::Ready));
    assert_eq!(registry.active_invocations("slow").await, Some(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_executes_share_the_registry() {
    let registry = Arc::new(ActionRegistry::new());
    registry
        .register("qrgen", Box::new(QrGenAction::new()))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..16 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            registry
                .execute("qrgen", Params::with_text(format!("item-{}", i)), "req")
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().status_code, 200);
    }
    assert_eq!(registry.active_invocations("qrgen").await, Some(0));
}

// End-to-end over a real socket.

async fn spawn_server(config: ServerConfig) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = ActionServer::new(config);
    server
        .register_action("qrgen", Box::new(QrGenAction::new()))
        .await
        .unwrap();
    tokio::spawn(server.serve(listener));

    addr
}

/// Send a raw HTTP/1.1 request and return (status, headers, body).
async fn send(
    addr: std::net::SocketAddr,
    method: &str,
    path: &str,
    body: &str,
) -> (u16, String, Vec<u8>) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "{} {} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        method,
        path,
        body.len(),
        body
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();

    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has a header terminator");
    let head = String::from_utf8_lossy(&raw[..split]).to_string();
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap();

    (status, head.to_ascii_lowercase(), raw[split + 4..].to_vec())
}

#[tokio::test]
async fn test_server_envelope_mode() {
    let addr = spawn_server(ServerConfig::new()).await;

    let (status, head, body) = send(addr, "POST", "/qrgen", r#"{"text":"hello"}"#).await;
    assert_eq!(status, 200);
    assert!(head.contains("content-type: application/json"));

    let envelope: ActionResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(envelope.status_code, 200);
    assert!(envelope.is_base64_encoded);
    decode_png(&envelope);

    let (status, _, body) = send(addr, "POST", "/qrgen", "{}").await;
    assert_eq!(status, 400);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"statusCode": 400, "body": "Missing 'text' parameter."})
    );

    let long = format!(r#"{{"text":"{}"}}"#, "a".repeat(MAX_TEXT_CHARS + 1));
    let (status, _, body) = send(addr, "POST", "/qrgen", &long).await;
    assert_eq!(status, 413);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        json["body"],
        "Input too long. Maximum 2048 characters allowed."
    );
}

#[tokio::test]
async fn test_server_web_mode() {
    let addr = spawn_server(ServerConfig::new().web_mode(true)).await;

    let (status, head, body) = send(addr, "POST", "/qrgen", r#"{"text":"hello"}"#).await;
    assert_eq!(status, 200);
    assert!(head.contains("content-type: image/png"));
    assert_eq!(&body[..8], b"\x89PNG\r\n\x1a\n");

    let (status, head, body) = send(addr, "POST", "/qrgen", "").await;
    assert_eq!(status, 400);
    assert!(head.contains("content-type: text/plain"));
    assert_eq!(body, b"Missing 'text' parameter.");
}

#[tokio::test]
async fn test_server_routing_and_limits() {
    let addr = spawn_server(ServerConfig::new().max_body_size(64)).await;

    let (status, _, body) = send(addr, "GET", "/_health", "").await;
    assert_eq!(status, 200);
    assert_eq!(body, b"OK");

    let (status, _, body) = send(addr, "GET", "/_actions", "").await;
    assert_eq!(status, 200);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["actions"][0]["name"], "qrgen");
    assert_eq!(json["actions"][0]["active"], 0);

    let (status, head, _) = send(addr, "GET", "/qrgen", "").await;
    assert_eq!(status, 405);
    assert!(head.contains("allow: post"));

    let (status, _, _) = send(addr, "POST", "/missing", "{}").await;
    assert_eq!(status, 404);

    let (status, _, _) = send(addr, "POST", "/", "{}").await;
    assert_eq!(status, 404);

    let (status, _, body) = send(addr, "POST", "/qrgen", r#"{"text":5}"#).await;
    assert_eq!(status, 400);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"statusCode": 400, "body": "Missing 'text' parameter."})
    );

    let (status, _, _) = send(addr, "POST", "/qrgen", "not json").await;
    assert_eq!(status, 400);

    let oversized = format!(r#"{{"text":"{}"}}"#, "a".repeat(100));
    let (status, _, _) = send(addr, "POST", "/qrgen", &oversized).await;
    assert_eq!(status, 413);
}
