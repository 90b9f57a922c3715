#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use scriptrun_api::config::ServerConfig;
use scriptrun_api::router::build_app_router;
use scriptrun_api::state::AppState;
use scriptrun_store::ScriptStore;
use tower::ServiceExt;

/// Upper bound for reading a full SSE body in tests.
pub const STREAM_DEADLINE: Duration = Duration::from_secs(20);

/// Build a test `ServerConfig` rooted at `scripts_dir`.
///
/// Keep-alives fire after 200ms so idle streams can be observed quickly.
pub fn test_config(scripts_dir: PathBuf) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        scripts_dir,
        script_interpreter: PathBuf::from("/bin/bash"),
        stream_keepalive: Duration::from_millis(200),
        run_retention: None,
        stop_escalation: Some(Duration::from_secs(2)),
        container: false,
    }
}

/// A router over a temporary script store. The store is removed when the
/// `TestApp` is dropped.
pub struct TestApp {
    _dir: tempfile::TempDir,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = test_config(dir.path().join("scripts"));
        let scripts = ScriptStore::open(&config.scripts_dir)
            .await
            .expect("open store");
        Self {
            _dir: dir,
            state: AppState::new(config, scripts),
        }
    }

    /// A fresh router sharing this app's state (`oneshot` consumes it).
    pub fn router(&self) -> Router {
        build_app_router(self.state.clone())
    }

    /// Create a script through the API and return its id.
    pub async fn create_script(&self, name: &str, source: &str) -> String {
        let response = post_json(
            self.router(),
            "/api/v1/scripts",
            serde_json::json!({ "name": name, "script": source }),
        )
        .await;
        assert_eq!(response.status(), axum::http::StatusCode::CREATED);
        let json = body_json(response).await;
        json["data"]["id"].as_str().expect("script id").to_string()
    }

    /// Start a run of `script_id` with the given JSON body and return its id.
    pub async fn start_run(&self, script_id: &str, body: serde_json::Value) -> String {
        let response = post_json(
            self.router(),
            &format!("/api/v1/scripts/{script_id}/run"),
            body,
        )
        .await;
        assert_eq!(response.status(), axum::http::StatusCode::ACCEPTED);
        let json = body_json(response).await;
        json["data"]["run_id"].as_str().expect("run id").to_string()
    }

    /// Attach to a run's stream and read it to completion.
    pub async fn stream(&self, run_id: &str) -> Vec<SseEvent> {
        parse_sse(&self.stream_text(run_id).await)
    }

    /// Raw `text/event-stream` body of a run, read to completion.
    pub async fn stream_text(&self, run_id: &str) -> String {
        let response = get(self.router(), &format!("/api/v1/runs/{run_id}/stream")).await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );
        tokio::time::timeout(STREAM_DEADLINE, body_text(response))
            .await
            .expect("stream did not finish in time")
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, Body::empty(), None).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Body::empty(), None).await
}

pub async fn post_empty(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::POST, uri, Body::empty(), None).await
}

pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    post_raw(app, uri, json.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: impl Into<String>) -> Response<Body> {
    send(
        app,
        Method::POST,
        uri,
        Body::from(body.into()),
        Some("application/json"),
    )
    .await
}

pub async fn put_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    send(
        app,
        Method::PUT,
        uri,
        Body::from(json.to_string()),
        Some("application/json"),
    )
    .await
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    body: Body,
    content_type: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

// ---------------------------------------------------------------------------
// Body helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// One parsed Server-Sent Event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

impl SseEvent {
    pub fn is_keepalive(&self) -> bool {
        self.event.is_none() && self.data.is_empty()
    }

    pub fn is_done(&self) -> bool {
        self.event.as_deref() == Some("done")
    }

    /// Decode the JSON string carried by an output event.
    pub fn line(&self) -> Option<String> {
        if self.event.is_some() || self.data.is_empty() {
            return None;
        }
        serde_json::from_str(&self.data).ok()
    }
}

pub fn parse_sse(text: &str) -> Vec<SseEvent> {
    text.split("\n\n")
        .filter(|block| !block.is_empty())
        .map(|block| {
            let mut event = None;
            let mut data = Vec::new();
            for field in block.lines() {
                if let Some(value) = field.strip_prefix("event:") {
                    event = Some(strip_space(value).to_string());
                } else if let Some(value) = field.strip_prefix("data:") {
                    data.push(strip_space(value));
                }
            }
            SseEvent {
                event,
                data: data.join("\n"),
            }
        })
        .collect()
}

fn strip_space(value: &str) -> &str {
    value.strip_prefix(' ').unwrap_or(value)
}

/// Output lines of a stream in order, skipping keep-alives.
pub fn lines(events: &[SseEvent]) -> Vec<String> {
    events.iter().filter_map(SseEvent::line).collect()
}
