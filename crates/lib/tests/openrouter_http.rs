//! Integration test: run a stand-in completion service on a free local port and drive the
//! OpenRouter client (and a full chat turn) against it. No network access or API key needed.
//! Server tasks are left running when each test ends.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use lib::chat::{ChatController, ChatError, SubmitOutcome};
use lib::llm::{CompletionError, CompletionRequest, OpenRouterClient, ProviderSettings};
use lib::session::{Role, SessionStore};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
struct Received {
    authorization: Option<String>,
    referer: Option<String>,
    title: Option<String>,
    body: CompletionRequest,
}

#[derive(Clone, Default)]
struct Seen(Arc<Mutex<Vec<Received>>>);

impl Seen {
    fn all(&self) -> Vec<Received> {
        self.0.lock().unwrap().clone()
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

async fn reply_ok(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Json(body): Json<CompletionRequest>,
) -> Json<serde_json::Value> {
    let last = body
        .messages
        .last()
        .map(|m| m.content.clone())
        .unwrap_or_default();
    seen.0.lock().unwrap().push(Received {
        authorization: header(&headers, "authorization"),
        referer: header(&headers, "http-referer"),
        title: header(&headers, "x-title"),
        body,
    });
    Json(serde_json::json!({
        "id": "gen-test",
        "model": "stand-in",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": format!("echo: {}", last)}}
        ]
    }))
}

async fn reply_unauthorized() -> (StatusCode, &'static str) {
    (
        StatusCode::UNAUTHORIZED,
        r#"{"error":{"message":"No auth credentials found","code":401}}"#,
    )
}

async fn reply_server_error() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded")
}

async fn reply_malformed() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "output": "not the expected shape" }))
}

async fn reply_slowly() -> Json<serde_json::Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(serde_json::json!({ "choices": [] }))
}

async fn start_server(seen: Seen) -> SocketAddr {
    let app = Router::new()
        .route("/ok", post(reply_ok))
        .route("/unauthorized", post(reply_unauthorized))
        .route("/broken", post(reply_server_error))
        .route("/malformed", post(reply_malformed))
        .route("/slow", post(reply_slowly))
        .with_state(seen);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind free port");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn client(addr: SocketAddr, path: &str, api_key: Option<&str>) -> OpenRouterClient {
    OpenRouterClient::new(ProviderSettings {
        api_key: api_key.map(String::from),
        endpoint: format!("http://{}{}", addr, path),
        referer: "http://localhost".to_string(),
        title: "Routechat".to_string(),
        timeout: Duration::from_secs(1),
    })
    .expect("build client")
}

#[tokio::test]
async fn chat_turn_round_trips_through_http() {
    let seen = Seen::default();
    let addr = start_server(seen.clone()).await;
    let mut store = SessionStore::new();
    let mut controller = ChatController::new(client(addr, "/ok", Some("test-key")));

    let outcome = controller.submit(&mut store, "Hello there").await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Replied("echo: Hello there".to_string()));

    let received = seen.all();
    assert_eq!(received.len(), 1);
    let req = &received[0];
    assert_eq!(req.authorization.as_deref(), Some("Bearer test-key"));
    assert_eq!(req.referer.as_deref(), Some("http://localhost"));
    assert_eq!(req.title.as_deref(), Some("Routechat"));
    assert_eq!(req.body.model, "deepseek/deepseek-chat-v3-0324");
    let roles: Vec<Role> = req.body.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User]);

    let thread = store.active();
    assert_eq!(thread.title, "Hello there");
    assert_eq!(thread.messages.len(), 2);
    assert_eq!(thread.messages[1].content, "echo: Hello there");
}

#[tokio::test]
async fn missing_key_sends_no_authorization_header() {
    let seen = Seen::default();
    let addr = start_server(seen.clone()).await;
    let c = client(addr, "/ok", None);
    let request = CompletionRequest {
        model: "deepseek/deepseek-r1".to_string(),
        messages: vec![],
    };
    c.chat(&request).await.unwrap();
    assert_eq!(seen.all()[0].authorization, None);
}

#[tokio::test]
async fn rejected_credentials_are_unauthorized() {
    let addr = start_server(Seen::default()).await;
    let c = client(addr, "/unauthorized", None);
    let request = CompletionRequest {
        model: "deepseek/deepseek-r1".to_string(),
        messages: vec![],
    };
    match c.chat(&request).await.unwrap_err() {
        CompletionError::Unauthorized { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("No auth credentials"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn server_error_keeps_user_message() {
    let addr = start_server(Seen::default()).await;
    let mut store = SessionStore::new();
    let mut controller = ChatController::new(client(addr, "/broken", Some("test-key")));

    let err = controller.submit(&mut store, "still there?").await.unwrap_err();
    match err {
        ChatError::CompletionFailed(CompletionError::Api { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    let thread = store.active();
    assert_eq!(thread.messages.len(), 1);
    assert_eq!(thread.messages[0].role, Role::User);
}

#[tokio::test]
async fn unexpected_body_is_parse_error() {
    let addr = start_server(Seen::default()).await;
    let c = client(addr, "/malformed", Some("test-key"));
    let request = CompletionRequest {
        model: "deepseek/deepseek-r1".to_string(),
        messages: vec![],
    };
    assert!(matches!(
        c.chat(&request).await.unwrap_err(),
        CompletionError::Parse(_)
    ));
}

#[tokio::test]
async fn slow_service_times_out() {
    let addr = start_server(Seen::default()).await;
    let c = client(addr, "/slow", Some("test-key"));
    let request = CompletionRequest {
        model: "deepseek/deepseek-r1".to_string(),
        messages: vec![],
    };
    match c.chat(&request).await.unwrap_err() {
        CompletionError::Timeout(limit) => assert_eq!(limit, Duration::from_secs(1)),
        other => panic!("unexpected error: {:?}", other),
    }
}
