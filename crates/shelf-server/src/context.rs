//! Application context shared across route handlers via Axum state.

use std::sync::Arc;

use shelf_core::config::Config;
use shelf_storage::BlobStore;

use crate::catalog::{DeleteService, PhotoRepository, Sweeper, UploadService};

/// Long-lived handles built once at startup and passed to every component.
///
/// Cloning is cheap; everything is behind an `Arc`.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub photos: Arc<dyn PhotoRepository>,
    pub blobs: Arc<dyn BlobStore>,
    pub uploads: UploadService,
    pub deletes: DeleteService,
}

impl AppContext {
    pub fn new(
        config: Config,
        photos: Arc<dyn PhotoRepository>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            uploads: UploadService::new(photos.clone(), blobs.clone()),
            deletes: DeleteService::new(photos.clone(), blobs.clone()),
            config: Arc::new(config),
            photos,
            blobs,
        }
    }

    /// A sweeper using the configured grace period.
    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(
            self.photos.clone(),
            self.blobs.clone(),
            self.config.storage.sweep_grace(),
        )
    }
}
