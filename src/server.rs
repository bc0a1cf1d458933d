//! FamilyCircles HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/fc/config` | Capability descriptor |
//! | `GET`  | `/fc/{tree}/object/{id}` | Individual or family projection |
//! | `GET`  | `/fc/{tree}/search?search=<query>` | Search results |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/`, `/index.php`, `/index.php/{*route}` | Same endpoints selected by the `route` parameter |
//!
//! # Error Contract
//!
//! Every error is JSON with the HTTP status repeated in the body:
//!
//! ```json
//! { "code": 400, "error": "must specify search term" }
//! ```
//!
//! # CORS
//!
//! Every response carries `Access-Control-Allow-Origin: *`, and preflight
//! requests are answered for all origins, methods, and headers.

use std::sync::Arc;

use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::{header, HeaderMap, HeaderValue, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::config::Config;
use crate::error::ApiError;
use crate::get::RecordHandler;
use crate::memory::snapshot_host;
use crate::models::{ApiDescriptor, RecordProjection, SearchResultItem};
use crate::request_url::RequestUrl;
use crate::search::SearchHandler;
use crate::traits::Host;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    records: RecordHandler,
    search: SearchHandler,
    /// Parsed `[server].base_url`, if configured.
    base_url: Option<Arc<Url>>,
}

impl AppState {
    fn request_url(&self, headers: &HeaderMap, uri: &Uri) -> RequestUrl {
        let host = headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok());
        let proto = headers
            .get("x-forwarded-proto")
            .and_then(|h| h.to_str().ok());
        RequestUrl::resolve_forwarded(
            self.base_url.as_deref(),
            host,
            proto,
            uri.path(),
            uri.query(),
        )
    }
}

/// Starts the server over the snapshot named in `[data].snapshot`.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    run_server_with_host(config, snapshot_host(config)?).await
}

/// Starts the server over caller-supplied collaborators.
///
/// Use this to serve records from a host other than the JSON snapshot.
pub async fn run_server_with_host(config: &Config, host: Host) -> anyhow::Result<()> {
    let app = build_router(config, host);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        "FamilyCircles listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the router with all endpoints and response layers.
pub fn build_router(config: &Config, host: Host) -> Router {
    let state = AppState {
        records: RecordHandler::new(host.clone(), config.avatar.clone()),
        search: SearchHandler::new(host),
        base_url: config.server.base_url().map(Arc::new),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/fc/config", get(handle_config))
        .route("/fc/{tree}/object/{id}", get(handle_object))
        .route("/fc/{tree}/search", get(handle_search))
        .route("/health", get(handle_health))
        .route("/", get(handle_front_controller))
        .route("/index.php", get(handle_front_controller))
        .route("/index.php/{*route}", get(handle_front_controller))
        .fallback(handle_fallback)
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /fc/config ============

async fn handle_config() -> Json<ApiDescriptor> {
    Json(ApiDescriptor::current())
}

// ============ GET /fc/{tree}/object/{id} ============

async fn handle_object(
    State(state): State<AppState>,
    path: Result<Path<(String, String)>, PathRejection>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<RecordProjection>, ApiError> {
    let Path((tree, id)) = path?;
    let url = state.request_url(&headers, &uri);
    Ok(Json(state.records.handle(&tree, &id, &url).await?))
}

// ============ GET /fc/{tree}/search ============

async fn handle_search(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<Vec<SearchResultItem>>, ApiError> {
    let Path(tree) = path?;
    let url = state.request_url(&headers, &uri);
    let query = search_param(&url);
    Ok(Json(state.search.handle(&tree, query).await?))
}

fn search_param(url: &RequestUrl) -> &str {
    url.query()
        .iter()
        .find(|(k, _)| k == "search")
        .map(|(_, v)| v.as_str())
        .unwrap_or("")
}

// ============ Front controller ============

/// An endpoint selected by a `route` value.
#[derive(Debug, PartialEq, Eq)]
enum FcRoute {
    Config,
    Object { tree: String, id: String },
    Search { tree: String },
}

impl FcRoute {
    fn parse(route: &str) -> Option<Self> {
        let rest = route.strip_prefix("/fc/")?;
        if rest == "config" {
            return Some(FcRoute::Config);
        }
        let (tree, rest) = rest.split_once('/')?;
        if tree.is_empty() {
            return None;
        }
        if rest == "search" {
            return Some(FcRoute::Search {
                tree: tree.to_string(),
            });
        }
        let id = rest.strip_prefix("object/")?;
        if id.is_empty() {
            return None;
        }
        Some(FcRoute::Object {
            tree: tree.to_string(),
            id: id.to_string(),
        })
    }
}

async fn handle_front_controller(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let url = state.request_url(&headers, &uri);
    let route = url.route().unwrap_or("").to_string();

    let result = match FcRoute::parse(&route) {
        Some(FcRoute::Config) => return Json(ApiDescriptor::current()).into_response(),
        Some(FcRoute::Object { tree, id }) => state
            .records
            .handle(&tree, &id, &url)
            .await
            .map(|p| Json(p).into_response()),
        Some(FcRoute::Search { tree }) => state
            .search
            .handle(&tree, search_param(&url))
            .await
            .map(|r| Json(r).into_response()),
        None => Err(ApiError::UnknownRoute(route)),
    };

    result.unwrap_or_else(IntoResponse::into_response)
}

async fn handle_fallback(uri: Uri) -> ApiError {
    ApiError::UnknownRoute(uri.path().to_string())
}
