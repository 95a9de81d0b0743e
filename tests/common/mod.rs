#![allow(dead_code)]

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Captured webhook bodies
#[derive(Clone, Default)]
pub struct Received(pub Arc<Mutex<Vec<Value>>>);

impl Received {
    pub fn bodies(&self) -> Vec<Value> {
        self.0.lock().unwrap().clone()
    }

    /// Wait until at least `count` bodies arrived, or give up after `timeout`
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.0.lock().unwrap().len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.0.lock().unwrap().len() >= count
    }
}

async fn capture(State(received): State<Received>, Json(body): Json<Value>) -> StatusCode {
    received.0.lock().unwrap().push(body);
    StatusCode::OK
}

async fn fail() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

async fn reject(
    State(received): State<Received>,
    Json(body): Json<Value>,
) -> (StatusCode, &'static str) {
    received.0.lock().unwrap().push(body);
    (
        StatusCode::BAD_REQUEST,
        "invalid_payload: connection field missing, retry after timeout",
    )
}

/// Start a local webhook endpoint
///
/// `POST /hook` records the body, `POST /broken` always answers 503,
/// `POST /rejected` records the body and answers 400.
pub async fn spawn_webhook_server() -> (SocketAddr, Received) {
    let received = Received::default();
    let app = Router::new()
        .route("/hook", post(capture))
        .route("/broken", post(fail))
        .route("/rejected", post(reject))
        .with_state(received.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind webhook server");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, received)
}

pub fn temp_log_path() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("test_watcher_{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("Failed to create temp dir");
    dir.join("access.log")
}

pub fn json_line(status: u16, pool: &str) -> String {
    format!(r#"{{"status":{status},"x_app_pool":"{pool}"}}"#)
}
