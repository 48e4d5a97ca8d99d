//! `BridgeServer`: Axum HTTP adapter around a [`Bridge`].

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderValue, header};
use axum::response::Json;
use axum::routing::{get, post};
use pollbridge_core::Bridge;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::routes;
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The bridge every endpoint operates on.
    pub bridge: Arc<Bridge>,
    /// When the server started.
    pub start_time: Instant,
}

/// The HTTP server.
pub struct BridgeServer {
    config: ServerConfig,
    bridge: Arc<Bridge>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl BridgeServer {
    /// Create a new server around `bridge`.
    pub fn new(config: ServerConfig, bridge: Bridge) -> Self {
        Self {
            config,
            bridge: Arc::new(bridge),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            bridge: Arc::clone(&self.bridge),
            start_time: self.start_time,
        };

        let mut router = Router::new()
            .route("/connect", post(routes::connect))
            .route("/send", post(routes::send))
            .route("/poll", get(routes::poll))
            .route("/disconnect", post(routes::disconnect))
            .route("/health", get(health_handler));

        if let Some(dir) = &self.config.static_dir {
            router = router.merge(static_routes(dir));
        }
        if let Some(dir) = &self.config.games_dir {
            router = router.nest_service("/games", ServeDir::new(dir));
        }

        router
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        TcpListener::bind(self.config.bind_addr()).await
    }

    /// Serve on `listener` until shutdown is requested.
    ///
    /// Starts the idle watchdog. On shutdown the chat session is closed
    /// before in-flight requests are drained, then the watchdog is stopped.
    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        let local_addr = listener.local_addr()?;
        let watchdog = self.bridge.watchdog().spawn(self.shutdown.token());

        info!(addr = %local_addr, remote = %self.bridge.config().remote_addr(), "Bridge server started");

        let token = self.shutdown.token();
        let bridge = Arc::clone(&self.bridge);
        // Session closes before the drain so sends blocked on the chat
        // socket return.
        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                token.cancelled().await;
                bridge.shutdown();
            })
            .await;

        self.bridge.shutdown();
        self.shutdown.drain(vec![watchdog], None).await;
        info!("Bridge server stopped");
        result
    }

    /// Bind and serve in a background task.
    ///
    /// Returns the bound address and the serving task's handle.
    pub async fn listen(
        self: &Arc<Self>,
    ) -> std::io::Result<(SocketAddr, JoinHandle<std::io::Result<()>>)> {
        let listener = self.bind().await?;
        let addr = listener.local_addr()?;
        let server = Arc::clone(self);
        let handle = tokio::spawn(async move { server.serve(listener).await });
        Ok((addr, handle))
    }

    /// Get the bridge.
    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// The browser client bundle. Only these three files are exposed.
fn static_routes(dir: &Path) -> Router<AppState> {
    let index = dir.join("index.html");
    Router::new()
        .route_service("/", ServeFile::new(&index))
        .route_service("/index.html", ServeFile::new(&index))
        .route_service("/style.css", ServeFile::new(dir.join("style.css")))
        .route_service("/script.js", ServeFile::new(dir.join("script.js")))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time, &state.bridge.status()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use pollbridge_core::BridgeConfig;
    use tower::ServiceExt;

    fn make_server() -> BridgeServer {
        BridgeServer::new(ServerConfig::default(), Bridge::new(BridgeConfig::default()))
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_reports_session() {
        let app = make_server().router();
        let resp = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let parsed = body_json(resp).await;
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connected"], false);
        assert_eq!(parsed["queued_messages"], 0);
    }

    #[tokio::test]
    async fn poll_returns_empty_array() {
        let app = make_server().router();
        let resp = app.oneshot(get("/poll")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn send_without_session_reports_error() {
        let app = make_server().router();
        let resp = app.oneshot(post("/send", r#"{"message":"hi"}"#)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let parsed = body_json(resp).await;
        assert_eq!(parsed["status"], "error");
        assert_eq!(parsed["msg"], "not connected");
    }

    #[tokio::test]
    async fn malformed_body_reports_error() {
        let app = make_server().router();
        let resp = app.oneshot(post("/connect", "{not json")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let parsed = body_json(resp).await;
        assert_eq!(parsed["status"], "error");
        assert!(parsed["msg"].as_str().unwrap().starts_with("invalid request body"));
    }

    #[tokio::test]
    async fn empty_username_reports_error() {
        let app = make_server().router();
        let resp = app.oneshot(post("/connect", r#"{"username":""}"#)).await.unwrap();
        let parsed = body_json(resp).await;
        assert_eq!(parsed["status"], "error");
        assert_eq!(parsed["msg"], "username must not be empty");
    }

    #[tokio::test]
    async fn disconnect_without_session_is_ok() {
        let app = make_server().router();
        let resp = app.oneshot(post("/disconnect", "")).await.unwrap();
        assert_eq!(body_json(resp).await, serde_json::json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn poll_rejects_post() {
        let app = make_server().router();
        let resp = app.oneshot(post("/poll", "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = make_server().router();
        let resp = app.oneshot(get("/nonexistent")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn static_files_served_without_cache() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>chat</h1>").unwrap();
        std::fs::write(dir.path().join("script.js"), "console.log(1)").unwrap();

        let config = ServerConfig {
            static_dir: Some(dir.path().to_path_buf()),
            ..ServerConfig::default()
        };
        let app = BridgeServer::new(config, Bridge::new(BridgeConfig::default())).router();

        let resp = app.clone().oneshot(get("/")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-store");
        assert!(
            resp.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/html")
        );

        let resp = app.clone().oneshot(get("/script.js")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        // Missing bundle file
        let resp = app.oneshot(get("/style.css")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn games_served_from_games_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("snake.html"), "<p>snake</p>").unwrap();

        let config = ServerConfig {
            games_dir: Some(dir.path().to_path_buf()),
            ..ServerConfig::default()
        };
        let app = BridgeServer::new(config, Bridge::new(BridgeConfig::default())).router();

        let resp = app.clone().oneshot(get("/games/snake.html")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.oneshot(get("/games/missing.html")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn accessors() {
        let server = make_server();
        assert_eq!(server.config().port, 0);
        assert!(!server.shutdown().is_shutting_down());
        assert!(!server.bridge().status().connected);
    }
}
