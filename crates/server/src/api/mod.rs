// HTTP surface: router assembly, shared state and request middleware.
//
// Routes:
//   GET    /api/content?path=P   read
//   PUT    /api/content          full overwrite
//   PATCH  /api/content          conditional patch
//   DELETE /api/content?path=P   soft delete
//   POST   /api/files            create file or directory
//   POST   /api/rename           rename
//   POST   /api/move             move
//   GET    /api/tree             listing
//   POST   /api/assets?name=N    upload (raw body)
//   POST   /api/gc/run           manual collector pass
//   GET    /healthz

mod admin;
mod assets;
mod content;
mod files;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use folio_common::protocol::routes;
use tracing::{error, info};

use crate::assets::AssetStore;
use crate::config::ServerConfig;
use crate::cors::cors_layer;
use crate::error::{
    attach_request_id_header, request_id_from_headers_or_generate, with_request_id_scope,
};
use crate::gc::{AssetCollector, CollectorHandle};
use crate::store::trash::Trash;
use crate::store::FileStore;

/// Headroom over the upload limit for JSON framing of large documents.
const BODY_LIMIT_SLACK_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FileStore>,
    pub assets: Arc<AssetStore>,
    pub collector: CollectorHandle,
}

impl AppState {
    /// Opens (creating if needed) the documents, assets and trash trees.
    pub fn open(config: &ServerConfig) -> anyhow::Result<Self> {
        let trash = Trash::open(config.trash_dir()).with_context(|| {
            format!("failed to open recovery area `{}`", config.trash_dir().display())
        })?;
        let store = FileStore::open(&config.documents_dir(), trash.clone()).with_context(|| {
            format!("failed to open documents root `{}`", config.documents_dir().display())
        })?;
        let assets = AssetStore::open(config.assets_dir(), config.max_upload_bytes)
            .with_context(|| {
                format!("failed to open asset root `{}`", config.assets_dir().display())
            })?;
        let collector = AssetCollector::new(
            store.root().to_path_buf(),
            assets.root().to_path_buf(),
            trash,
            config.trash_retention,
        );

        Ok(Self {
            store: Arc::new(store),
            assets: Arc::new(assets),
            collector: CollectorHandle::new(collector),
        })
    }
}

/// Full application router with middleware.
pub fn build_app(state: AppState, config: &ServerConfig) -> Router {
    let api = Router::new()
        .route(
            routes::CONTENT,
            get(content::read)
                .put(content::full_update)
                .patch(content::patch)
                .delete(content::soft_delete),
        )
        .route(routes::FILES, post(files::create))
        .route(routes::RENAME, post(files::rename))
        .route(routes::MOVE, post(files::move_to))
        .route(routes::TREE, get(files::tree))
        .route(routes::ASSETS, post(assets::upload))
        .route(routes::GC_RUN, post(admin::run_collector))
        .with_state(state);

    apply_middleware(
        Router::new().route(routes::HEALTHZ, get(healthz)).merge(api),
        config.max_upload_bytes + BODY_LIMIT_SLACK_BYTES,
    )
    .layer(cors_layer(config.cors_origins.as_deref()))
}

fn apply_middleware(router: Router, body_limit: usize) -> Router {
    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(request_context_middleware))
        .layer(middleware::from_fn(panic_handler))
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

async fn panic_handler(request: Request<Body>, next: Next) -> Response {
    match tokio::spawn(async move { next.run(request).await }).await {
        Ok(response) => response,
        Err(join_error) => {
            error!(?join_error, "request handling panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn request_context_middleware(request: Request<Body>, next: Next) -> Response {
    let request_id = request_id_from_headers_or_generate(request.headers());
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started_at = Instant::now();

    let mut response = with_request_id_scope(request_id.clone(), next.run(request)).await;
    attach_request_id_header(&mut response, &request_id);

    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started_at.elapsed().as_millis() as u64,
        "request completed"
    );

    response
}
