//! shelf-storage: blob storage for photo payloads.
//!
//! A [`BlobStore`] owns a flat namespace of image files. Uploads are
//! streamed through a [`BlobUpload`] into a hidden partial file and become
//! visible under their [`Locator`] only when [`BlobUpload::finish`]
//! succeeds.

pub mod filesystem;

use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use shelf_core::{Locator, Result};

pub use filesystem::FilesystemBlobStore;

/// A committed blob as seen by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    pub locator: Locator,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// Storage for binary image payloads.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Start a streaming upload. The blob name is chosen by the store and
    /// keeps `extension` when it is usable.
    async fn begin(&self, extension: Option<&str>) -> Result<Box<dyn BlobUpload>>;

    /// Store a fully-buffered payload.
    async fn write(&self, data: Bytes, extension: Option<&str>) -> Result<Locator> {
        let mut upload = self.begin(extension).await?;
        if let Err(e) = upload.write(data).await {
            if let Err(abort_err) = upload.abort().await {
                tracing::warn!(error = %abort_err, "Failed to discard partial upload");
            }
            return Err(e);
        }
        upload.finish().await
    }

    /// Remove a blob. Succeeds if it is already absent.
    async fn delete(&self, locator: &Locator) -> Result<()>;

    async fn exists(&self, locator: &Locator) -> Result<bool>;

    /// Every committed blob. Partial uploads are not listed.
    async fn list(&self) -> Result<Vec<BlobEntry>>;

    /// Short name for logs.
    fn backend_name(&self) -> &'static str;
}

/// An in-progress upload.
///
/// Dropping an upload without calling [`finish`](Self::finish) discards
/// whatever was written.
#[async_trait]
pub trait BlobUpload: Send {
    /// Where the blob will be found once finished.
    fn locator(&self) -> &Locator;

    /// Append a chunk. Fails with `PayloadTooLarge` once the store's byte
    /// ceiling would be exceeded; nothing is truncated.
    async fn write(&mut self, data: Bytes) -> Result<()>;

    /// Make the blob visible under its locator.
    async fn finish(self: Box<Self>) -> Result<Locator>;

    /// Discard the upload.
    async fn abort(self: Box<Self>) -> Result<()>;
}
