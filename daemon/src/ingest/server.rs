//! HTTP server for track ingestion
//!
//! Stateless front end: every write is delegated to the status manager,
//! which serializes it against the operator command path.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, OnceLock};

use anyhow::{bail, Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::state::{StatusManager, StatusSnapshot, SubmitOutcome};

use super::protocol::{
    ApiError, HealthResponse, StateResponse, StatusResponse, ToggleAction, ToggleRequest,
    TrackUpdate,
};

/// Holds the status manager once startup restoration has finished
///
/// Requests that arrive before then are answered with a 500.
#[derive(Clone, Default)]
pub struct ManagerSlot(Arc<OnceLock<Arc<StatusManager>>>);

impl ManagerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the manager; returns false if one was already installed
    pub fn install(&self, manager: Arc<StatusManager>) -> bool {
        self.0.set(manager).is_ok()
    }

    fn get(&self) -> Result<&Arc<StatusManager>, ApiError> {
        self.0.get().ok_or(ApiError::NotInitialized)
    }
}

/// Shared context passed to all handlers
#[derive(Clone)]
struct AppContext {
    manager: ManagerSlot,
}

/// Build the ingestion router
pub fn router(manager: ManagerSlot) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/music/update", post(update_track))
        .route("/music/state", get(get_state))
        .route("/music/toggle", post(toggle))
        .route("/music/status", get(get_status))
        .with_state(AppContext { manager })
        .layer(CorsLayer::permissive())
}

/// Ingestion server bound to a TCP port
pub struct Server {
    listener: TcpListener,
    router: Router,
}

impl Server {
    /// Bind the first free port out of `ports`
    pub async fn bind(addr: IpAddr, ports: &[u16], manager: ManagerSlot) -> Result<Self> {
        for &port in ports {
            let socket_addr = SocketAddr::new(addr, port);
            match TcpListener::bind(socket_addr).await {
                Ok(listener) => {
                    debug!(addr = %listener.local_addr()?, "ingestion server listening");
                    return Ok(Self {
                        listener,
                        router: router(manager),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                    warn!(port, "port in use, trying next");
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to bind {}", socket_addr));
                }
            }
        }

        bail!("all ingestion ports are in use: {:?}", ports)
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve requests until a shutdown message arrives
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await
            .context("ingestion server failed")?;

        info!("ingestion server shutdown complete");
        Ok(())
    }
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// POST /music/update
async fn update_track(
    State(ctx): State<AppContext>,
    body: Result<Json<TrackUpdate>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let manager = ctx.manager.get()?;
    let Json(update) = body?;
    let track = update.track.trim();

    info!(%track, "track received from client");

    match manager.submit_track(track).await {
        SubmitOutcome::Applied | SubmitOutcome::Debounced if track.is_empty() => {
            Ok(Json(StatusResponse::new("cleared")))
        }
        SubmitOutcome::Applied | SubmitOutcome::Debounced => Ok(Json(StatusResponse::new("success"))),
        SubmitOutcome::Suspended => Ok(Json(StatusResponse::with_message(
            "disabled",
            "Live music status is disabled",
        ))),
        SubmitOutcome::Failed(e) => Err(ApiError::Upstream(e)),
    }
}

/// GET /music/state
async fn get_state(State(ctx): State<AppContext>) -> Result<Json<StateResponse>, ApiError> {
    let manager = ctx.manager.get()?;
    Ok(Json(StateResponse {
        enabled: manager.is_live(),
    }))
}

/// POST /music/toggle
async fn toggle(
    State(ctx): State<AppContext>,
    body: Result<Json<ToggleRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let manager = ctx.manager.get()?;
    let Json(request) = body?;

    match request.parse() {
        Some(ToggleAction::Enable) => {
            manager.enable().await;
            info!("live status enabled via HTTP");
            Ok(Json(StatusResponse::new("enabled")))
        }
        Some(ToggleAction::Disable) => {
            manager.disable().await;
            info!("live status disabled via HTTP");
            Ok(Json(StatusResponse::new("disabled")))
        }
        None => Err(ApiError::UnknownAction(request.action)),
    }
}

/// GET /music/status
async fn get_status(State(ctx): State<AppContext>) -> Result<Json<StatusSnapshot>, ApiError> {
    let manager = ctx.manager.get()?;
    Ok(Json(manager.snapshot().await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::StatusEvent;
    use crate::profile::testing::RecordingUpdater;
    use crate::state::{FlagStore, StatusSettings};
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        updater: Arc<RecordingUpdater>,
        _dir: tempfile::TempDir,
    }

    async fn setup(enabled: bool) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let store = FlagStore::new(dir.path().join("music_state.json"));
        store.save(enabled).unwrap();

        let updater = Arc::new(RecordingUpdater::new());
        let (tx, _) = broadcast::channel::<StatusEvent>(16);
        let manager =
            StatusManager::restore(StatusSettings::default(), store, updater.clone(), tx).await;

        let slot = ManagerSlot::new();
        assert!(slot.install(Arc::new(manager)));

        TestApp {
            router: router(slot),
            updater,
            _dir: dir,
        }
    }

    async fn make_request(
        app: &Router,
        method: Method,
        path: &str,
        body: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(path);
        if body.is_some() {
            request = request.header("content-type", "application/json");
        }
        let request = request
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = setup(true).await;
        let (status, body) = make_request(&app.router, Method::GET, "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["version"].is_string());
    }

    #[tokio::test]
    async fn test_track_update_success() {
        let app = setup(true).await;
        let body = json!({"track": "Artist - Title"}).to_string();

        let (status, resp) =
            make_request(&app.router, Method::POST, "/music/update", Some(body.as_str())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp, json!({"status": "success"}));
        assert_eq!(app.updater.call_count(), 1);
        assert!(app.updater.calls()[0].ends_with("Artist - Title"));
    }

    #[tokio::test]
    async fn test_empty_track_clears() {
        let app = setup(true).await;

        let (status, resp) =
            make_request(&app.router, Method::POST, "/music/update", Some(r#"{"track":"  "}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["status"], "cleared");
        assert_eq!(app.updater.calls(), vec![String::new()]);
    }

    #[tokio::test]
    async fn test_track_update_while_suspended() {
        let app = setup(false).await;
        let calls_after_restore = app.updater.call_count();

        let (status, resp) =
            make_request(&app.router, Method::POST, "/music/update", Some(r#"{"track":"A"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["status"], "disabled");
        assert!(resp["message"].is_string());
        assert_eq!(app.updater.call_count(), calls_after_restore);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_bad_gateway() {
        let app = setup(true).await;
        app.updater.set_failing(true);

        let (status, resp) =
            make_request(&app.router, Method::POST, "/music/update", Some(r#"{"track":"A"}"#)).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(resp["status"], "error");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = setup(true).await;

        let (status, resp) =
            make_request(&app.router, Method::POST, "/music/update", Some("{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["status"], "error");

        let (status, _) = make_request(&app.router, Method::POST, "/music/update", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(app.updater.call_count(), 0);
    }

    #[tokio::test]
    async fn test_toggle_round_trip() {
        let app = setup(true).await;

        let (status, resp) = make_request(
            &app.router,
            Method::POST,
            "/music/toggle",
            Some(r#"{"action":"disable"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["status"], "disabled");

        let (_, state) = make_request(&app.router, Method::GET, "/music/state", None).await;
        assert_eq!(state, json!({"enabled": false}));

        let (status, resp) = make_request(
            &app.router,
            Method::POST,
            "/music/toggle",
            Some(r#"{"action":"Enable"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["status"], "enabled");

        let (_, state) = make_request(&app.router, Method::GET, "/music/state", None).await;
        assert_eq!(state, json!({"enabled": true}));
    }

    #[tokio::test]
    async fn test_toggle_unknown_action() {
        let app = setup(true).await;

        let (status, resp) = make_request(
            &app.router,
            Method::POST,
            "/music/toggle",
            Some(r#"{"action":"pause"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["status"], "error");
    }

    #[tokio::test]
    async fn test_toggle_malformed_json_is_bad_request() {
        let app = setup(true).await;

        for body in [Some("{not json"), Some(r#"{"track":"A"}"#), None] {
            let (status, resp) =
                make_request(&app.router, Method::POST, "/music/toggle", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {body:?}");
            assert_eq!(resp["status"], "error");
        }

        let (_, state) = make_request(&app.router, Method::GET, "/music/state", None).await;
        assert_eq!(state["enabled"], true);
        assert_eq!(app.updater.call_count(), 0);
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let app = setup(true).await;
        make_request(&app.router, Method::POST, "/music/update", Some(r#"{"track":"A"}"#)).await;

        let (status, snapshot) = make_request(&app.router, Method::GET, "/music/status", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["mode"], "live");
        assert_eq!(snapshot["displayed"], "A");
        assert_eq!(snapshot["last_track"], "A");
    }

    #[tokio::test]
    async fn test_uninitialized_manager() {
        let app = router(ManagerSlot::new());

        for (method, path, body) in [
            (Method::GET, "/music/state", None),
            (Method::GET, "/music/status", None),
            (Method::POST, "/music/update", Some(r#"{"track":"A"}"#)),
            (Method::POST, "/music/toggle", Some(r#"{"action":"enable"}"#)),
        ] {
            let (status, resp) = make_request(&app, method, path, body).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", path);
            assert_eq!(resp["message"], "Music manager not initialized");
        }
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let app = setup(true).await;
        let request = Request::builder()
            .method(Method::GET)
            .uri("/music/state")
            .header("origin", "http://example.com")
            .body(Body::empty())
            .unwrap();

        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_bind_skips_taken_port() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let taken_port = taken.local_addr().unwrap().port();
        let localhost = IpAddr::from([127, 0, 0, 1]);

        let server = Server::bind(localhost, &[taken_port, 0], ManagerSlot::new())
            .await
            .unwrap();
        assert_ne!(server.local_addr().unwrap().port(), taken_port);
    }

    #[tokio::test]
    async fn test_server_shuts_down() {
        let server = Server::bind(IpAddr::from([127, 0, 0, 1]), &[0], ManagerSlot::new())
            .await
            .unwrap();
        let (tx, rx) = broadcast::channel(1);

        let handle = tokio::spawn(server.run(rx));
        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
