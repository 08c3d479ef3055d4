//! Measurement Server.
//!
//! Four public, unauthenticated endpoints nested under a configurable
//! prefix (`/ip`, `/ping`, `/download`, `/upload`), plus `/health` and a
//! JSON 404 fallback. Every measurement is scoped to its own request: the
//! only shared value is the read-only payload buffer.

pub mod identity;
pub mod payload;
pub mod probe;
pub mod sink;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use log::{info, warn};
use rand::RngCore;
use serde::Serialize;
use tokio::net::TcpListener;

use crate::errors::SpeedTestError;
use crate::measurements::MEBIBYTE;

pub const DEFAULT_PREFIX: &str = "/api/speed-test";
pub const MIN_CHUNK_BYTES: usize = 64 * 1024;
pub const MAX_CHUNK_BYTES: usize = 1024 * 1024;
/// Largest size in MiB whose byte count still fits in a `u64`.
pub const MAX_PAYLOAD_MB: u64 = u64::MAX / MEBIBYTE;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub listen: SocketAddr,
    /// Path prefix the measurement endpoints are nested under.
    pub prefix: String,
    /// Size used when `/download` gets no usable `size`, in MiB.
    pub default_download_mb: u64,
    /// Largest payload `/download` will generate, in MiB.
    pub max_download_mb: u64,
    /// Hard ceiling on bytes `/upload` accepts before aborting.
    pub max_upload_bytes: u64,
    /// Size of the generator buffer written repeatedly per response.
    pub chunk_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 3001)),
            prefix: DEFAULT_PREFIX.to_string(),
            default_download_mb: 1,
            max_download_mb: 600,
            max_upload_bytes: 600 * MEBIBYTE,
            chunk_bytes: MAX_CHUNK_BYTES,
        }
    }
}

impl ServerConfig {
    /// Normalise the prefix to `/segment[/segment]` with no trailing slash
    /// and keep the chunk size inside the supported range.
    pub fn normalized(mut self) -> Self {
        let trimmed = self.prefix.trim_matches('/');
        self.prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        };
        self.chunk_bytes =
            self.chunk_bytes.clamp(MIN_CHUNK_BYTES, MAX_CHUNK_BYTES);
        self.default_download_mb = self.default_download_mb.max(1);
        self.max_download_mb = self.max_download_mb.clamp(1, MAX_PAYLOAD_MB);
        self.default_download_mb =
            self.default_download_mb.min(self.max_download_mb);
        self
    }
}

/// Download bodies currently streaming, and how many ended early.
#[derive(Debug, Default)]
pub struct DownloadCounters {
    active: AtomicUsize,
    aborted: AtomicU64,
}

impl DownloadCounters {
    pub fn opened(&self) {
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn closed(&self, finished: bool) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        if !finished {
            self.aborted.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn aborted(&self) -> u64 {
        self.aborted.load(Ordering::Relaxed)
    }
}

/// State shared by every handler. Only the download counters change
/// after construction.
pub struct AppState {
    pub config: ServerConfig,
    /// Random bytes generated once and reused by every download response.
    pub payload: Bytes,
    pub downloads: Arc<DownloadCounters>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let mut buffer = vec![0u8; config.chunk_bytes];
        rand::thread_rng().fill_bytes(&mut buffer);

        Self {
            config,
            payload: Bytes::from(buffer),
            downloads: Arc::default(),
            start_time: Instant::now(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    uptime: f64,
    active_downloads: usize,
    aborted_downloads: u64,
}

#[derive(Serialize)]
struct NotFoundResponse {
    success: bool,
    message: &'static str,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "OK",
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime: state.start_time.elapsed().as_secs_f64(),
        active_downloads: state.downloads.active(),
        aborted_downloads: state.downloads.aborted(),
    })
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse { success: false, message: "Route not found" }),
    )
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed = started.elapsed();
    if status.is_server_error() {
        warn!("{} {} {} {:?}", method, path, status.as_u16(), elapsed);
    } else {
        info!("{} {} {} {:?}", method, path, status.as_u16(), elapsed);
    }

    response
}

/// Build the full router for the given configuration.
pub fn router(config: ServerConfig) -> Router {
    let config = config.normalized();
    let prefix = config.prefix.clone();
    let state = Arc::new(AppState::new(config));

    let measurement = Router::new()
        .route("/ip", get(identity::client_identity))
        .route("/ping", get(probe::ping))
        .route("/download", get(payload::download))
        .route("/upload", post(sink::upload))
        .layer(DefaultBodyLimit::disable());

    let app = Router::new().route("/health", get(health));
    let app = if prefix.is_empty() {
        app.merge(measurement)
    } else {
        app.nest(&prefix, measurement)
    };

    app.fallback(not_found)
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve<F>(
    config: ServerConfig,
    shutdown: F,
) -> Result<(), SpeedTestError>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(config.listen).await.map_err(|e| {
        SpeedTestError::config(format!("failed to bind {}", config.listen))
            .with_source(e)
    })?;

    serve_on(listener, config, shutdown).await
}

/// Serve on an already bound listener.
pub async fn serve_on<F>(
    listener: TcpListener,
    config: ServerConfig,
    shutdown: F,
) -> Result<(), SpeedTestError>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let local_addr = listener.local_addr().map_err(|e| {
        SpeedTestError::config("listener has no local address").with_source(e)
    })?;
    let prefix = config.clone().normalized().prefix;
    let app = router(config);

    info!(
        "Measurement server listening on http://{}{}",
        local_addr, prefix
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(|e| SpeedTestError::config("server terminated").with_source(e))
}


#[cfg(test)]
mod tests {
    use super::test_support::TestServer;
    use super::*;

    #[test]
    fn test_config_normalizes_prefix() {
        let config = ServerConfig {
            prefix: "api/speed-test/".to_string(),
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.prefix, "/api/speed-test");

        let config =
            ServerConfig { prefix: "/".to_string(), ..Default::default() }
                .normalized();
        assert_eq!(config.prefix, "");
    }

    #[test]
    fn test_config_clamps_chunk_size() {
        let config =
            ServerConfig { chunk_bytes: 1, ..Default::default() }.normalized();
        assert_eq!(config.chunk_bytes, MIN_CHUNK_BYTES);

        let config = ServerConfig {
            chunk_bytes: 10 * MAX_CHUNK_BYTES,
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.chunk_bytes, MAX_CHUNK_BYTES);
    }

    #[test]
    fn test_config_caps_download_size_to_representable_bytes() {
        let config = ServerConfig {
            max_download_mb: u64::MAX,
            default_download_mb: u64::MAX,
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.max_download_mb, MAX_PAYLOAD_MB);
        assert_eq!(config.default_download_mb, MAX_PAYLOAD_MB);
        assert!(config.max_download_mb.checked_mul(MEBIBYTE).is_some());
    }

    #[test]
    fn test_download_counters() {
        let counters = DownloadCounters::default();
        counters.opened();
        counters.opened();
        counters.closed(true);
        counters.closed(false);
        assert_eq!(counters.active(), 0);
        assert_eq!(counters.aborted(), 1);
    }

    #[test]
    fn test_state_payload_matches_chunk_size() {
        let state = AppState::new(
            ServerConfig { chunk_bytes: MIN_CHUNK_BYTES, ..Default::default() }
                .normalized(),
        );
        assert_eq!(state.payload.len(), MIN_CHUNK_BYTES);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let server = TestServer::start(ServerConfig::default()).await;

        let response = reqwest::get(format!("http://{}/health", server.addr))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["status"], "OK");
        assert!(body["uptime"].as_f64().unwrap() >= 0.0);
        assert!(body["timestamp"].as_str().is_some());
        assert_eq!(body["activeDownloads"], 0);
        assert_eq!(body["abortedDownloads"], 0);
    }

    #[tokio::test]
    async fn test_unknown_route_returns_json_404() {
        let server = TestServer::start(ServerConfig::default()).await;

        let response = reqwest::get(server.url("/nope")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Route not found");
    }

    #[tokio::test]
    async fn test_endpoints_mounted_without_prefix() {
        let server = TestServer::start(ServerConfig {
            prefix: String::new(),
            ..Default::default()
        })
        .await;

        let response =
            reqwest::get(format!("http://{}/ping", server.addr)).await.unwrap();
        assert_eq!(response.text().await.unwrap(), "pong");
    }
}
