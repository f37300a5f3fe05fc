#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use attendify::config::Config;
use attendify::database::{MemoryStore, Store};
use attendify::server::{AppState, open_store, router};
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tower::ServiceExt;

pub const STUDENT: &str = "student@attendify.com";
pub const FACULTY: &str = "faculty@attendify.com";
pub const ADMIN: &str = "admin@attendify.com";

/// Router over a seeded in-memory store. Keep the `TempDir` alive for the
/// duration of the test; face captures are written there.
pub struct TestApp {
    pub router: Router,
    pub uploads: TempDir,
}

pub fn test_config(uploads: &TempDir) -> Config {
    let mut config = Config::default();
    config.auth.allow_passwordless_login = true;
    config.uploads.dir = uploads.path().to_path_buf();
    config
}

pub fn app_with(config: Config, store: MemoryStore, uploads: TempDir) -> TestApp {
    let store: Arc<dyn Store> = Arc::new(store);
    TestApp {
        router: router(AppState::new(config, store)),
        uploads,
    }
}

/// Router over the store the server itself would open for `config`.
pub async fn app_from(mut config: Config, uploads: TempDir) -> TestApp {
    config.uploads.dir = uploads.path().to_path_buf();
    let store = open_store(&config).await.unwrap();
    TestApp {
        router: router(AppState::new(config, store)),
        uploads,
    }
}

pub fn app() -> TestApp {
    let uploads = tempfile::tempdir().unwrap();
    let config = test_config(&uploads);
    app_with(config, MemoryStore::with_demo_data(None), uploads)
}

impl TestApp {
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => Body::from(serde_json::to_vec(&value).unwrap()),
            None => Body::empty(),
        };
        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, token, Some(body)).await
    }

    /// Signs in a seeded account and returns its token.
    pub async fn login(&self, email: &str, role: &str) -> String {
        let (status, body) = self
            .post(
                "/api/auth/login",
                None,
                serde_json::json!({ "email": email, "role": role }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["data"]["access_token"].as_str().unwrap().to_string()
    }
}

/// A PNG data URL whose byte profile the face encoder accepts.
pub fn face_image(seed: u8) -> String {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend((0..4096_usize).map(|i| ((i / 32) as u8).wrapping_mul(2).wrapping_add(seed)));
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

/// A PNG data URL with a shallow ramp sitting at `level`. Two of these
/// encode roughly `|a - b| / 255` apart.
pub fn face_at_level(level: u8) -> String {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend((0..4096_usize).map(|i| level.saturating_add(((i / 32) % 8) as u8)));
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

/// Serves `router` on an ephemeral port and returns its origin.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    format!("http://{addr}")
}
