//! # Server Module
//!
//! Router assembly and startup for the Attendify API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, Request, header},
    middleware,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::auth::{AuthMiddleware, JwtService, RevokedTokens, password};
use crate::config::{Config, StorageBackend};
use crate::database::{DatabaseConnection, MemoryStore, PgStore, PoolConfig, Store};
use crate::error::AppError;
use crate::routes;
use crate::services::{FaceService, QrService};

/// Application state shared across all route handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub jwt_service: Arc<JwtService>,
    pub face: Arc<FaceService>,
    pub qr: Arc<QrService>,
    pub revoked_tokens: Arc<RevokedTokens>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>) -> Self {
        Self {
            jwt_service: Arc::new(JwtService::new(
                &config.auth.jwt_secret,
                config.auth.token_ttl_hours,
            )),
            face: Arc::new(FaceService::new(config.face.tolerance)),
            qr: Arc::new(QrService::new(config.qr.expiry_minutes)),
            revoked_tokens: Arc::new(RevokedTokens::new()),
            store,
            config: Arc::new(config),
        }
    }
}

/// Tags every request with an `x-request-id` UUID.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestUuid;

impl MakeRequestId for RequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

async fn not_found() -> AppError {
    AppError::not_found("NOT_FOUND", "Endpoint not found")
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

/// Builds the full application router.
///
/// Everything outside `health` and login sits behind the JWT middleware.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(routes::auth::create_routes())
        .merge(routes::attendance::create_routes())
        .merge(routes::classes::create_routes())
        .merge(routes::dashboard::create_routes())
        .merge(routes::directory::create_routes())
        .merge(routes::analytics::create_routes())
        .merge(routes::reports::create_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            AuthMiddleware::validate_token,
        ));

    Router::new()
        .merge(routes::health::create_routes())
        .merge(routes::auth::create_public_routes())
        .merge(protected)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.config.server.max_body_bytes))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(RequestUuid))
        .layer(cors_layer(&state.config.server.cors_origins))
        .with_state(state)
}

/// Opens the configured storage backend.
pub async fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    match config.database.backend {
        StorageBackend::Postgres => {
            let db = DatabaseConnection::new(PoolConfig::from_settings(&config.database)?)
                .await
                .context("Failed to connect to database")?;
            db.migrate().await.context("Failed to run migrations")?;
            Ok(Arc::new(PgStore::new(db)))
        }
        StorageBackend::Memory => {
            let hash = match &config.auth.demo_password {
                Some(pw) => Some(password::hash_password(pw)?),
                None => None,
            };
            tracing::info!("🧪 Using in-memory storage with demo accounts");
            Ok(Arc::new(MemoryStore::with_demo_data(hash)))
        }
    }
}

/// Starts the Attendify HTTP server and serves until the process exits.
pub async fn start(config: Config) -> Result<()> {
    let store = open_store(&config).await?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;
    let backend = store.backend();
    let app = router(AppState::new(config, store));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr} - port may already be in use"))?;

    tracing::info!("🚀 Attendify API starting...");
    tracing::info!("📡 Listening on http://{}", addr);
    tracing::info!("🏥 Health check available at http://{}/api/health", addr);
    tracing::info!("🗄️  Storage backend: {}", backend);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("Server error")?;
    Ok(())
}
