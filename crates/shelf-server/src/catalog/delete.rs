//! Delete orchestration: metadata row first, then the blob.

use std::sync::Arc;

use shelf_core::{PhotoId, Result};
use shelf_storage::BlobStore;

use super::PhotoRepository;

#[derive(Clone)]
pub struct DeleteService {
    photos: Arc<dyn PhotoRepository>,
    blobs: Arc<dyn BlobStore>,
}

impl DeleteService {
    pub fn new(photos: Arc<dyn PhotoRepository>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { photos, blobs }
    }

    /// Delete the photo identified by `raw_id`.
    ///
    /// Fails with `InvalidId` unless `raw_id` is a positive integer and with
    /// `NotFound` if no row exists. Once the row is gone the call succeeds:
    /// a blob that is already missing or cannot be removed is only logged.
    pub async fn delete(&self, raw_id: &str) -> Result<PhotoId> {
        let id: PhotoId = raw_id.parse()?;
        let locator = self.photos.find_locator(id).await?;
        self.photos.delete(id).await?;

        if let Err(e) = self.blobs.delete(&locator).await {
            tracing::warn!(%id, %locator, error = %e, "Row deleted but blob removal failed");
        }

        tracing::info!(%id, %locator, "Photo deleted");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Payload, SqlitePhotoRepository, UploadForm, UploadService};
    use async_trait::async_trait;
    use bytes::Bytes;
    use shelf_core::{Error, Locator};
    use shelf_db::pool::init_memory_pool;
    use shelf_db::DbHandle;
    use shelf_storage::{BlobEntry, BlobUpload, FilesystemBlobStore};

    /// Blob store whose deletes always fail; everything else delegates.
    struct StuckDeletes(FilesystemBlobStore);

    #[async_trait]
    impl BlobStore for StuckDeletes {
        async fn begin(&self, extension: Option<&str>) -> Result<Box<dyn BlobUpload>> {
            self.0.begin(extension).await
        }
        async fn delete(&self, _locator: &Locator) -> Result<()> {
            Err(Error::from(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only filesystem",
            )))
        }
        async fn exists(&self, locator: &Locator) -> Result<bool> {
            self.0.exists(locator).await
        }
        async fn list(&self) -> Result<Vec<BlobEntry>> {
            self.0.list().await
        }
        fn backend_name(&self) -> &'static str {
            "stuck"
        }
    }

    struct Fixture {
        photos: Arc<SqlitePhotoRepository>,
        uploads: UploadService,
        deletes: DeleteService,
        blobs: Arc<dyn BlobStore>,
        _dir: tempfile::TempDir,
    }

    async fn fixture(stuck: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let fs = FilesystemBlobStore::new(dir.path(), "/uploads", 1024).await.unwrap();
        let blobs: Arc<dyn BlobStore> = if stuck {
            Arc::new(StuckDeletes(fs))
        } else {
            Arc::new(fs)
        };
        let photos = Arc::new(SqlitePhotoRepository::new(DbHandle::from_pool(
            init_memory_pool().unwrap(),
        )));
        Fixture {
            uploads: UploadService::new(photos.clone(), blobs.clone()),
            deletes: DeleteService::new(photos.clone(), blobs.clone()),
            photos,
            blobs,
            _dir: dir,
        }
    }

    async fn upload(f: &Fixture, name: &str) -> shelf_db::models::Photo {
        let form = UploadForm {
            name: Some(name.into()),
            tags: None,
        };
        let payload = Payload::Buffered {
            data: Bytes::from_static(b"jpeg"),
            extension: None,
        };
        f.uploads.upload(form, Some(payload)).await.unwrap()
    }

    #[tokio::test]
    async fn delete_removes_row_and_blob() {
        let f = fixture(false).await;
        let photo = upload(&f, "a").await;

        f.deletes.delete(&photo.id.to_string()).await.unwrap();
        assert!(!f.blobs.exists(&photo.locator).await.unwrap());
        assert!(f.photos.find_locator(photo.id).await.unwrap_err().is_not_found());

        let again = f.deletes.delete(&photo.id.to_string()).await.unwrap_err();
        assert!(again.is_not_found());
    }

    #[tokio::test]
    async fn invalid_ids_rejected_before_lookup() {
        let f = fixture(false).await;
        for raw in ["abc", "0", "-1", ""] {
            let err = f.deletes.delete(raw).await.unwrap_err();
            assert!(matches!(err, Error::InvalidId(_)), "id {raw:?}");
        }
    }

    #[tokio::test]
    async fn nonexistent_id_not_found() {
        let f = fixture(false).await;
        assert!(f.deletes.delete("999").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn missing_blob_is_tolerated() {
        let f = fixture(false).await;
        let photo = upload(&f, "a").await;
        f.blobs.delete(&photo.locator).await.unwrap();

        f.deletes.delete(&photo.id.to_string()).await.unwrap();
        assert_eq!(f.photos.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn blob_delete_failure_is_not_surfaced() {
        let f = fixture(true).await;
        let photo = upload(&f, "a").await;

        let id = f.deletes.delete(&photo.id.to_string()).await.unwrap();
        assert_eq!(id, photo.id);
        assert_eq!(f.photos.count(None).await.unwrap(), 0);
        assert!(f.blobs.exists(&photo.locator).await.unwrap());
    }
}
