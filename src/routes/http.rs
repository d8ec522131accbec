// JSON handlers: version, container list, proxies, readme, image hydration, encode

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::docker_repo::{ReadmeSource, container_view, load_readme};
use crate::error::EngineError;
use crate::labels::{self, BlockPolicy, validation::ProxyRowErrors};
use crate::models::{ProxyDescriptor, ProxyLink};

/// Error body `{ "error": "..." }` with a status.
pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        if e.is_not_found() {
            ApiError(StatusCode::NOT_FOUND, e.to_string())
        } else {
            tracing::warn!(error = %e, "engine request failed");
            ApiError(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

/// GET /version: service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct ListQuery {
    #[serde(default)]
    all: bool,
}

/// GET /api/containers: running containers (all with `?all=true`) with their proxies and links.
pub(super) async fn list_containers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let containers = state.engine.list_containers(query.all).await?;
    let origin = &state.config.server.public_origin;
    let views: Vec<_> = containers
        .into_iter()
        .map(|c| container_view(c, origin))
        .collect();
    Ok(Json(views))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ProxiesResponse {
    proxies: Vec<ProxyDescriptor>,
    links: Vec<ProxyLink>,
}

/// GET /api/containers/{id}/proxies: decoded proxies label of one container.
pub(super) async fn container_proxies(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let container = state.engine.container(&id).await?;
    let proxies = labels::decode(&container.labels);
    let links = labels::dashboard_links(&state.config.server.public_origin, &proxies);
    Ok(Json(ProxiesResponse { proxies, links }))
}

#[derive(Debug, Serialize)]
pub(super) struct ReadmeResponse {
    source: ReadmeSource,
    markdown: String,
}

/// GET /api/containers/{id}/readme: embedded README, else the file inside the container.
pub(super) async fn container_readme(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let container = state.engine.container(&id).await?;
    match load_readme(
        state.engine.as_ref(),
        &container,
        &state.config.docker.default_readme_path,
    )
    .await
    {
        Some((source, markdown)) => Ok(Json(ReadmeResponse { source, markdown })),
        None => Err(ApiError(StatusCode::NOT_FOUND, "No README found.".into())),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ImageQuery {
    image: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ImageHydration {
    image: String,
    proxies: Vec<ProxyDescriptor>,
    readme: Option<String>,
    readme_path: String,
    host_network: bool,
}

/// GET /api/images/inspect?image=: what the create form pre-fills from image labels.
pub(super) async fn inspect_image(
    State(state): State<AppState>,
    Query(query): Query<ImageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let image = query.image.trim();
    if image.is_empty() {
        return Err(ApiError(StatusCode::BAD_REQUEST, "image is required".into()));
    }
    let image_labels = state.engine.image_labels(image).await?;
    Ok(Json(ImageHydration {
        image: image.to_string(),
        proxies: labels::decode(&image_labels),
        readme: labels::read_embedded_readme(&image_labels),
        readme_path: labels::readme_path(&image_labels, &state.config.docker.default_readme_path),
        host_network: labels::wants_host_network(&image_labels),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct EncodeRequest {
    rows: Vec<ProxyDescriptor>,
    /// Accept rows without an nginx block.
    #[serde(default)]
    block_optional: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct EncodeResponse {
    /// Value for the proxies label; `null` means omit the label.
    label: Option<String>,
    errors: Vec<ProxyRowErrors>,
}

/// POST /api/proxies/encode: validate form rows and produce the label value.
pub(super) async fn encode_proxies(Json(request): Json<EncodeRequest>) -> impl IntoResponse {
    let policy = if request.block_optional {
        BlockPolicy::Optional
    } else {
        BlockPolicy::Required
    };
    let errors = labels::validation::validate_descriptors(&request.rows, policy);
    if !errors.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(EncodeResponse {
                label: None,
                errors,
            }),
        );
    }
    let label = labels::encode_with_policy(&request.rows, policy);
    (StatusCode::OK, Json(EncodeResponse { label, errors }))
}
