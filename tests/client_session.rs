mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use attendify::client::storage::{TOKEN_KEY, USER_KEY};
use attendify::client::{
    ApiClient, ApiError, DurableStorage, MemoryStorage, RequestOptions, SessionContext,
    SessionState, classes_resource, dashboard_resource,
};
use attendify::types::{Dashboard, Role, UserView};
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::{Value, json};

use common::{STUDENT, app, face_image, serve};

fn stub_user() -> Value {
    json!({
        "id": 7,
        "email": STUDENT,
        "name": "John Doe",
        "role": "student",
        "is_active": true,
        "face_enrolled": false,
        "created_at": "2025-01-01T00:00:00Z",
        "updated_at": "2025-01-01T00:00:00Z",
    })
}

async fn echo_auth(headers: HeaderMap) -> Json<Value> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Json(json!({ "authorization": auth }))
}

async fn stub_login() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": { "user": stub_user(), "access_token": "T" },
    }))
}

async fn expired_qr() -> impl IntoResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "error": "QR_CODE_EXPIRED" })),
    )
}

async fn bad_gateway() -> impl IntoResponse {
    (StatusCode::BAD_GATEWAY, "<html>upstream down</html>")
}

async fn soft_failure() -> Json<Value> {
    Json(json!({
        "success": false,
        "error": "Class is not currently active",
        "code": "CLASS_NOT_ACTIVE",
    }))
}

/// First call answers slowly, later calls immediately; each reports its
/// call number in `total_attendance`.
async fn numbered_dashboard(State(calls): State<Arc<AtomicUsize>>) -> Json<Value> {
    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
    if n == 1 {
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    Json(json!({
        "success": true,
        "data": {
            "role": "student",
            "user": stub_user(),
            "recent_attendance": [],
            "upcoming_classes": [],
            "active_classes": [],
            "stats": {
                "total_attendance": n,
                "recent_attendance": 0,
                "attendance_rate": 0.0,
                "face_enrolled": false,
            },
        },
    }))
}

async fn stub_server() -> String {
    let router = Router::new()
        .route("/echo", get(echo_auth))
        .route("/api/auth/login", post(stub_login))
        .route("/api/attendance/mark-qr", post(expired_qr))
        .route("/gateway", get(bad_gateway))
        .route("/soft-failure", get(soft_failure))
        .route("/api/dashboard/student/7", get(numbered_dashboard))
        .with_state(Arc::new(AtomicUsize::new(0)));
    serve(router).await
}

fn session_for(base: &str, storage: Arc<MemoryStorage>) -> Arc<SessionContext> {
    let api = Arc::new(ApiClient::configure(base).unwrap());
    SessionContext::new(api, storage)
}

#[tokio::test]
async fn bearer_header_follows_the_token() {
    let base = stub_server().await;
    let client = ApiClient::configure(&base).unwrap();

    client.set_token(Some("abc".into()));
    let body = client.request("/echo", RequestOptions::get()).await.unwrap();
    assert_eq!(body["authorization"], "Bearer abc");

    client.set_token(None);
    let body = client.request("/echo", RequestOptions::get()).await.unwrap();
    assert!(body["authorization"].is_null());
}

#[tokio::test]
async fn login_persists_user_and_token() {
    let base = stub_server().await;
    let storage = Arc::new(MemoryStorage::new());
    let session = session_for(&base, storage.clone());
    assert!(session.initialize().is_none());

    let user = session.login(STUDENT, None, Role::Student).await.unwrap();
    assert_eq!(user.role, Role::Student);
    assert_eq!(session.token().as_deref(), Some("T"));
    assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("T"));
    let saved: UserView = serde_json::from_str(&storage.get(USER_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(saved.email, STUDENT);

    let body = session.api().request("/echo", RequestOptions::get()).await.unwrap();
    assert_eq!(body["authorization"], "Bearer T");
}

#[tokio::test]
async fn expired_qr_message_reaches_the_caller() {
    let base = stub_server().await;
    let client = ApiClient::configure(&base).unwrap();
    let err = client.mark_attendance_qr(1, "expired").await.unwrap_err();
    assert_eq!(err.to_string(), "QR_CODE_EXPIRED");
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
}

#[tokio::test]
async fn unreadable_error_body_gets_generic_message() {
    let base = stub_server().await;
    let client = ApiClient::configure(&base).unwrap();
    let err = client.request("/gateway", RequestOptions::get()).await.unwrap_err();
    assert_eq!(err.to_string(), "API Error: 502");
}

#[tokio::test]
async fn success_false_on_200_is_not_swallowed() {
    let base = stub_server().await;
    let client = ApiClient::configure(&base).unwrap();
    let err = client
        .request_data::<Value>("/soft-failure", RequestOptions::get())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Application { .. }));
    assert_eq!(err.code(), Some("CLASS_NOT_ACTIVE"));
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = ApiClient::configure(&format!("http://{addr}")).unwrap();
    let err = client.verify().await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)), "{err:?}");
}

#[tokio::test]
async fn racing_dashboard_fetches_keep_the_last_arrival() {
    let base = stub_server().await;
    let session = session_for(&base, Arc::new(MemoryStorage::new()));
    session.login(STUDENT, None, Role::Student).await.unwrap();

    let dashboard = dashboard_resource(&session);
    let slow = dashboard.refetch();
    let fast = dashboard.refetch();
    assert!(dashboard.loading());
    futures::join!(slow, fast);

    let state = dashboard.snapshot();
    assert!(!state.loading);
    assert_eq!(state.error, None);
    match state.data {
        Some(Dashboard::Student(d)) => assert_eq!(d.stats.total_attendance, 1),
        other => panic!("expected the slow student dashboard, got {other:?}"),
    }
}

#[tokio::test]
async fn restore_is_optimistic_and_reverts_on_rejection() {
    let base = serve(app().router).await;
    let storage = Arc::new(MemoryStorage::new());
    storage.set(USER_KEY, &stub_user().to_string()).unwrap();
    storage.set(TOKEN_KEY, "stale-token").unwrap();

    let session = session_for(&base, storage.clone());
    let verification = session.initialize().expect("session should be restored");
    assert!(session.is_authenticated());
    assert_eq!(session.api().token().as_deref(), Some("stale-token"));

    verification.await.unwrap();
    assert_eq!(session.state(), SessionState::Anonymous);
    assert!(storage.is_empty());
    assert_eq!(session.api().token(), None);
}

#[tokio::test]
async fn valid_saved_session_survives_verification() {
    let base = serve(app().router).await;
    let storage = Arc::new(MemoryStorage::new());

    let first = session_for(&base, storage.clone());
    first.initialize();
    first.login(STUDENT, None, Role::Student).await.unwrap();

    let second = session_for(&base, storage.clone());
    second.initialize().unwrap().await.unwrap();
    assert!(second.is_authenticated());
    assert_eq!(second.user().unwrap().email, STUDENT);
}

#[tokio::test]
async fn logout_is_idempotent() {
    let base = serve(app().router).await;
    let storage = Arc::new(MemoryStorage::new());
    let session = session_for(&base, storage.clone());
    session.initialize();
    session.login(STUDENT, None, Role::Student).await.unwrap();
    assert_eq!(storage.len(), 2);

    session.sign_out().await;
    assert_eq!(session.state(), SessionState::Anonymous);
    assert!(storage.is_empty());

    session.logout();
    assert_eq!(session.state(), SessionState::Anonymous);
    assert!(storage.is_empty());
}

#[tokio::test]
async fn failed_login_leaves_session_anonymous() {
    let base = serve(app().router).await;
    let storage = Arc::new(MemoryStorage::new());
    let session = session_for(&base, storage.clone());
    session.initialize();

    let err = session.login(STUDENT, None, Role::Admin).await.unwrap_err();
    assert_eq!(err.code(), Some("ROLE_MISMATCH"));
    assert_eq!(session.state(), SessionState::Anonymous);
    assert!(storage.is_empty());
}

#[tokio::test]
async fn failed_login_replaces_an_existing_session() {
    let base = serve(app().router).await;
    let storage = Arc::new(MemoryStorage::new());
    let session = session_for(&base, storage.clone());
    session.initialize();
    session.login(STUDENT, None, Role::Student).await.unwrap();
    assert!(session.is_authenticated());

    let err = session.login(STUDENT, None, Role::Faculty).await.unwrap_err();
    assert_eq!(err.code(), Some("ROLE_MISMATCH"));
    assert_eq!(session.state(), SessionState::Anonymous);
    assert_eq!(session.api().token(), None);
    assert!(storage.is_empty());
}

#[tokio::test]
async fn enrollment_refreshes_cached_user() {
    let base = serve(app().router).await;
    let storage = Arc::new(MemoryStorage::new());
    let session = session_for(&base, storage.clone());
    session.initialize();
    session.login(STUDENT, None, Role::Student).await.unwrap();
    assert!(!session.user().unwrap().face_enrolled);

    assert!(session.enroll_face(&face_image(9)).await);
    assert!(session.user().unwrap().face_enrolled);
    let saved: UserView = serde_json::from_str(&storage.get(USER_KEY).unwrap().unwrap()).unwrap();
    assert!(saved.face_enrolled);

    assert!(!session.enroll_face("not an image").await);
}

#[tokio::test]
async fn bound_resource_follows_the_session() {
    let base = serve(app().router).await;
    let session = session_for(&base, Arc::new(MemoryStorage::new()));
    session.initialize();

    let classes = classes_resource(&session);
    let task = classes.bind_to_session(&session);
    session.login(STUDENT, None, Role::Student).await.unwrap();

    let mut changes = classes.subscribe();
    let loaded = tokio::time::timeout(
        Duration::from_secs(5),
        changes.wait_for(|s| s.data.is_some() && !s.loading),
    )
    .await
    .expect("classes never loaded")
    .unwrap()
    .clone();
    assert_eq!(loaded.data.unwrap().classes[0].name, "Data Structures");

    session.logout();
    tokio::time::timeout(Duration::from_secs(5), changes.wait_for(|s| s.data.is_none()))
        .await
        .expect("resource was not reset")
        .unwrap();

    drop(classes);
    task.abort();
}
