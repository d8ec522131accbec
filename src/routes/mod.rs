// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::docker_repo::ContainerEngine;
use crate::reconciler::ReconcilerConfig;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) engine: Arc<dyn ContainerEngine>,
    pub(crate) reconciler: ReconcilerConfig,
    pub(crate) config: AppConfig,
}

pub fn app(engine: Arc<dyn ContainerEngine>, config: AppConfig) -> Router {
    let poll_limiter = (config.stats.max_concurrent_polls > 0)
        .then(|| Arc::new(Semaphore::new(config.stats.max_concurrent_polls)));
    let state = AppState {
        engine,
        reconciler: ReconcilerConfig::from_settings(&config.stats, poll_limiter),
        config,
    };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/containers", get(http::list_containers)) // GET /api/containers?all=
        .route("/api/containers/{id}/proxies", get(http::container_proxies))
        .route("/api/containers/{id}/readme", get(http::container_readme))
        .route("/api/images/inspect", get(http::inspect_image)) // GET /api/images/inspect?image=
        .route("/api/proxies/encode", post(http::encode_proxies))
        .route("/ws/containers/{id}/stats", get(ws::ws_container_stats))
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
