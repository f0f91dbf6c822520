//! Upload orchestration: blob first, then metadata row, with rollback.

use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use shelf_core::{Error, Locator, NewPhoto, Result};
use shelf_db::models::Photo;
use shelf_storage::BlobStore;

use super::PhotoRepository;

/// Raw text fields of an upload, before validation.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub name: Option<String>,
    pub tags: Option<String>,
}

/// The image payload of an upload.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Already written to the blob store by [`UploadService::stage`].
    Staged(Locator),
    /// Held in memory; written during [`UploadService::upload`].
    Buffered {
        data: Bytes,
        extension: Option<String>,
    },
}

/// Creates photos so that a row never exists without its blob and a blob
/// never outlives a failed upload.
#[derive(Clone)]
pub struct UploadService {
    photos: Arc<dyn PhotoRepository>,
    blobs: Arc<dyn BlobStore>,
}

impl UploadService {
    pub fn new(photos: Arc<dyn PhotoRepository>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { photos, blobs }
    }

    /// Stream a payload into the blob store.
    ///
    /// On any error (from the stream or the store) the partial blob is
    /// discarded and nothing is left behind.
    pub async fn stage<S>(&self, extension: Option<&str>, chunks: S) -> Result<Locator>
    where
        S: Stream<Item = Result<Bytes>> + Send,
    {
        let mut chunks = std::pin::pin!(chunks);
        let mut upload = self.blobs.begin(extension).await?;

        while let Some(chunk) = chunks.next().await {
            let written = match chunk {
                Ok(data) => upload.write(data).await,
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                if let Err(abort_err) = upload.abort().await {
                    tracing::warn!(error = %abort_err, "Failed to discard partial upload");
                }
                return Err(e);
            }
        }

        upload.finish().await
    }

    /// Remove a staged blob that will not be committed. Failures are logged.
    pub async fn discard(&self, locator: &Locator) {
        if let Err(e) = self.blobs.delete(locator).await {
            let failure = Error::partial("discard staged blob", e);
            tracing::error!(%locator, error = %failure, "Staged blob left behind");
        }
    }

    /// Validate the form, make sure the blob is stored, then insert the row.
    ///
    /// - Invalid fields: a staged payload is discarded, `Validation` returned.
    /// - No payload: `Validation`.
    /// - Insert failure: the blob is deleted best-effort and the insert error
    ///   returned. If that delete also fails the orphan is logged.
    pub async fn upload(&self, form: UploadForm, payload: Option<Payload>) -> Result<Photo> {
        let fields = match NewPhoto::from_form(form.name.as_deref(), form.tags.as_deref()) {
            Ok(fields) => fields,
            Err(e) => {
                if let Some(Payload::Staged(locator)) = &payload {
                    self.discard(locator).await;
                }
                return Err(e);
            }
        };

        let Some(payload) = payload else {
            return Err(Error::Validation("Image file is required".into()));
        };

        let locator = match payload {
            Payload::Staged(locator) => locator,
            Payload::Buffered { data, extension } => {
                self.blobs.write(data, extension.as_deref()).await?
            }
        };

        match self.photos.insert(&fields, &locator).await {
            Ok(photo) => {
                tracing::info!(id = %photo.id, %locator, "Photo uploaded");
                Ok(photo)
            }
            Err(e) => {
                tracing::warn!(%locator, error = %e, "Insert failed; removing blob");
                if let Err(rollback) = self.blobs.delete(&locator).await {
                    let failure = Error::partial("delete blob after failed insert", rollback);
                    tracing::error!(%locator, error = %failure, "Rollback failed; blob orphaned");
                }
                Err(e)
            }
        }
    }
}
