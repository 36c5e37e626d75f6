//! Shared helpers: an in-process processing API and scratch directories

#![allow(dead_code)]

use axum::{
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use bgremove_watch::{DirectoryLayout, SettlePolicy, WatchConfig};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One part of a received multipart body
#[derive(Debug, Clone)]
pub struct RecordedPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// One request received by the mock API
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub headers: HeaderMap,
    pub parts: Vec<RecordedPart>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn file_parts(&self) -> Vec<&RecordedPart> {
        self.parts.iter().filter(|p| p.file_name.is_some()).collect()
    }

    pub fn text_field(&self, name: &str) -> Option<String> {
        self.parts
            .iter()
            .find(|p| p.name == name && p.file_name.is_none())
            .map(|p| String::from_utf8_lossy(&p.data).into_owned())
    }
}

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    body: Vec<u8>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Processing API stand-in answering every POST with a fixed status and body
pub struct MockApi {
    pub url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockApi {
    pub async fn start(status: u16, body: &[u8]) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_vec(),
            requests: Arc::clone(&requests),
        };

        let app = Router::new().route("/edit", post(handle)).with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/edit"),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn handle(
    State(state): State<MockState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> (StatusCode, Vec<u8>) {
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.unwrap().to_vec();
        parts.push(RecordedPart {
            name,
            file_name,
            content_type,
            data,
        });
    }

    state
        .requests
        .lock()
        .unwrap()
        .push(RecordedRequest { headers, parts });

    (state.status, state.body.clone())
}

/// Config pointing at `api_url` with all directories under `root`
pub fn test_config(api_url: &str, root: &Path) -> WatchConfig {
    WatchConfig::builder(api_url, "test-key")
        .directories(DirectoryLayout::under(root))
        .settle(SettlePolicy::StableSize {
            poll_interval_ms: 50,
            max_wait_ms: 2_000,
        })
        .build()
        .unwrap()
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    condition()
}
