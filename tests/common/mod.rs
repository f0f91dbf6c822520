//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates a temporary database file and
//! upload directory and builds the full [`AppContext`] on top of them. The
//! [`TestHarness::with_server`] constructor starts Axum on a random port for
//! HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use shelf_core::config::Config;
use shelf_db::DbHandle;
use shelf_server::catalog::SqlitePhotoRepository;
use shelf_server::context::AppContext;
use shelf_server::router::build_router;
use shelf_storage::FilesystemBlobStore;
use tempfile::TempDir;

/// Bytes used as the uploaded image in tests. Content is never inspected.
pub const JPEG_BYTES: &[u8] = b"\xFF\xD8\xFF\xE0 not really a jpeg";

/// Test harness wrapping a fully-constructed [`AppContext`] backed by a
/// SQLite file and upload directory inside a temp dir.
pub struct TestHarness {
    pub ctx: AppContext,
    pub config: Config,
    _dir: TempDir,
}

impl TestHarness {
    /// Create a new harness with default settings rooted in a temp dir.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a harness after letting `adjust` tweak the temp-dir config.
    pub async fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let mut config = Config::default();
        config.database.path = dir.path().join("data/photoshelf.db");
        config.database.connect_attempts = 1;
        config.database.connect_delay_ms = 0;
        config.storage.upload_dir = dir.path().join("uploads");
        adjust(&mut config);

        let ctx = shelf_server::build_context(config.clone())
            .await
            .expect("failed to build context");

        Self {
            ctx,
            config,
            _dir: dir,
        }
    }

    /// A harness whose database handle was never initialized, so every
    /// metadata call fails the way an unreachable store does.
    pub async fn unready() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let mut config = Config::default();
        config.storage.upload_dir = dir.path().join("uploads");

        let blobs = FilesystemBlobStore::from_config(&config.storage)
            .await
            .expect("failed to create blob store");
        let ctx = AppContext::new(
            config.clone(),
            Arc::new(SqlitePhotoRepository::new(DbHandle::new())),
            Arc::new(blobs),
        );

        Self {
            ctx,
            config,
            _dir: dir,
        }
    }

    /// Start an Axum server on a random port and return the bound address.
    pub async fn serve(&self) -> SocketAddr {
        let app = build_router(self.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum_serve(listener, app).await;
        });

        addr
    }

    /// Start a server for a default harness.
    pub async fn with_server() -> (Self, SocketAddr) {
        let harness = Self::new().await;
        let addr = harness.serve().await;
        (harness, addr)
    }

    pub fn upload_dir(&self) -> &Path {
        &self.config.storage.upload_dir
    }

    /// Files currently in the upload directory, ignoring in-flight uploads.
    pub fn stored_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(self.upload_dir())
            .expect("upload dir readable")
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| !n.starts_with('.'))
            })
            .collect();
        files.sort();
        files
    }

    /// Rows in the photos table, read directly.
    pub fn row_count(&self) -> i64 {
        let conn = shelf_db::pool::open_pool(&self.config.database)
            .and_then(|pool| shelf_db::pool::get_conn(&pool))
            .expect("database reachable");
        conn.query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))
            .expect("count rows")
    }
}

async fn axum_serve(listener: tokio::net::TcpListener, app: axum::Router) {
    axum::serve(listener, app).await.ok();
}

pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}{path}")
}

/// Build an upload form. `None` leaves the field out entirely.
pub fn photo_form(name: Option<&str>, tags: Option<&str>, photo: Option<&[u8]>) -> reqwest::multipart::Form {
    let mut form = reqwest::multipart::Form::new();
    if let Some(name) = name {
        form = form.text("name", name.to_string());
    }
    if let Some(tags) = tags {
        form = form.text("tags", tags.to_string());
    }
    if let Some(bytes) = photo {
        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name("photo.jpg")
            .mime_str("image/jpeg")
            .expect("valid mime");
        form = form.part("photo", part);
    }
    form
}

/// POST a photo and return the status and JSON body.
pub async fn upload(
    client: &reqwest::Client,
    addr: SocketAddr,
    name: Option<&str>,
    tags: Option<&str>,
    photo: Option<&[u8]>,
) -> (reqwest::StatusCode, Value) {
    let resp = client
        .post(url(addr, "/api/photos"))
        .multipart(photo_form(name, tags, photo))
        .send()
        .await
        .expect("upload request");
    let status = resp.status();
    let body = resp.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

/// Upload a valid photo and return its id.
pub async fn upload_ok(client: &reqwest::Client, addr: SocketAddr, name: &str) -> i64 {
    let (status, body) = upload(client, addr, Some(name), None, Some(JPEG_BYTES)).await;
    assert_eq!(status, 201, "upload of {name:?} failed: {body}");
    body["id"].as_i64().expect("id in response")
}

pub async fn get_json(client: &reqwest::Client, addr: SocketAddr, path: &str) -> (reqwest::StatusCode, Value) {
    let resp = client
        .get(url(addr, path))
        .send()
        .await
        .expect("GET request");
    let status = resp.status();
    let body = resp.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

/// Names in a listing response, in order.
pub fn names(body: &Value) -> Vec<String> {
    body["items"]
        .as_array()
        .expect("items array")
        .iter()
        .map(|p| p["name"].as_str().unwrap_or_default().to_string())
        .collect()
}
