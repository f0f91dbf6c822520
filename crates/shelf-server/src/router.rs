//! Axum router construction.
//!
//! Builds the application router: the JSON API at the root and again under
//! `/api`, uploaded blobs served under the public prefix, and an optional
//! SPA fallback for a frontend build.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

/// Room for multipart boundaries and text fields on top of the file itself.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// Build the full application router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let storage = &ctx.config.storage;
    let body_limit = usize::try_from(storage.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);
    let prefix = storage.normalized_prefix();
    let uploads = ServeDir::new(&storage.upload_dir);
    let static_dir = ctx.config.server.static_dir.clone();

    let api = catalog_routes().fallback(routes::api_not_found);

    let mut app = catalog_routes()
        .nest("/api", api)
        .nest_service(&prefix, uploads)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    if let Some(dir) = static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {:?}", dir);
            let index_path = dir.join("index.html");
            app = app.fallback_service(
                ServeDir::new(&dir)
                    .append_index_html_on_directories(true)
                    .not_found_service(ServeFile::new(index_path)),
            );
        }
    }

    app
}

/// Health and photo routes. Mounted both at the root and under `/api`.
fn catalog_routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/photos",
            get(routes::photos::list_photos).post(routes::photos::create_photo),
        )
        .route("/photos/{id}", delete(routes::photos::delete_photo))
}
