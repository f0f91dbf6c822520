//! Local filesystem blob store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;
use shelf_core::config::StorageConfig;
use shelf_core::{Error, Locator, Result};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

use crate::{BlobEntry, BlobStore, BlobUpload};

/// Extension used when the client supplied none or an unusable one.
pub const DEFAULT_EXTENSION: &str = "jpg";

const MAX_EXTENSION_LEN: usize = 10;

/// Prefix of in-progress upload files. Such files are hidden from listings.
const PARTIAL_PREFIX: &str = ".partial-";

/// Blob store keeping every blob as a file directly under `root`.
#[derive(Debug, Clone)]
pub struct FilesystemBlobStore {
    root: PathBuf,
    public_prefix: String,
    max_bytes: u64,
}

impl FilesystemBlobStore {
    /// Create the store, creating `root` if needed.
    pub async fn new(
        root: impl AsRef<Path>,
        public_prefix: impl Into<String>,
        max_bytes: u64,
    ) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            public_prefix: public_prefix.into(),
            max_bytes,
        })
    }

    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::new(
            &config.upload_dir,
            config.normalized_prefix(),
            config.max_upload_bytes,
        )
        .await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Filesystem path of a blob, rejecting anything that is not a plain
    /// file name inside the root.
    pub fn path_of(&self, locator: &Locator) -> Result<PathBuf> {
        let name = locator.file_name();
        let safe = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\'])
            && name != "..";
        if !safe {
            return Err(Error::Internal(format!("unsafe blob locator: {locator}")));
        }
        Ok(self.root.join(name))
    }

    fn locator_for(&self, file_name: &str) -> Locator {
        Locator::from_parts(&self.public_prefix, file_name)
    }
}

/// Blob file name: upload time in milliseconds plus a random component.
pub fn generate_file_name(extension: Option<&str>) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let nonce: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{millis}-{nonce}.{}", sanitize_extension(extension))
}

/// Lowercased extension without the leading dot, or [`DEFAULT_EXTENSION`]
/// if it is missing or not short and alphanumeric.
pub fn sanitize_extension(extension: Option<&str>) -> String {
    let ext = extension
        .map(|e| e.trim().trim_start_matches('.'))
        .unwrap_or_default();
    let usable = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    if usable {
        ext.to_ascii_lowercase()
    } else {
        DEFAULT_EXTENSION.to_string()
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn begin(&self, extension: Option<&str>) -> Result<Box<dyn BlobUpload>> {
        let file_name = generate_file_name(extension);
        let final_path = self.root.join(&file_name);
        let temp_path = self
            .root
            .join(format!("{PARTIAL_PREFIX}{}", Uuid::new_v4()));
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;

        Ok(Box::new(FilesystemUpload {
            file: Some(file),
            temp_path: Some(temp_path),
            final_path,
            locator: self.locator_for(&file_name),
            bytes_written: 0,
            max_bytes: self.max_bytes,
        }))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, locator: &Locator) -> Result<()> {
        let path = self.path_of(locator)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(%locator, "Blob already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, locator: &Locator) -> Result<bool> {
        let path = self.path_of(locator)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn list(&self) -> Result<Vec<BlobEntry>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            entries.push(BlobEntry {
                locator: self.locator_for(name),
                size: meta.len(),
                modified: meta.modified().ok(),
            });
        }
        Ok(entries)
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

/// Streaming upload into a hidden partial file, moved into place on finish.
struct FilesystemUpload {
    file: Option<fs::File>,
    temp_path: Option<PathBuf>,
    final_path: PathBuf,
    locator: Locator,
    bytes_written: u64,
    max_bytes: u64,
}

#[async_trait]
impl BlobUpload for FilesystemUpload {
    fn locator(&self) -> &Locator {
        &self.locator
    }

    async fn write(&mut self, data: Bytes) -> Result<()> {
        let total = self.bytes_written + data.len() as u64;
        if total > self.max_bytes {
            return Err(Error::PayloadTooLarge {
                limit: self.max_bytes,
            });
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| Error::Internal("upload already closed".into()))?;
        file.write_all(&data).await?;
        self.bytes_written = total;
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> Result<Locator> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| Error::Internal("upload already closed".into()))?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if let Some(temp_path) = self.temp_path.as_ref() {
            publish(temp_path, &self.final_path).await?;
        }
        self.temp_path = None;

        tracing::debug!(locator = %self.locator, bytes = self.bytes_written, "Blob committed");
        Ok(self.locator.clone())
    }

    async fn abort(mut self: Box<Self>) -> Result<()> {
        drop(self.file.take());
        if let Some(temp_path) = self.temp_path.take() {
            match fs::remove_file(&temp_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Move a finished partial file to `dest` without replacing an existing blob.
///
/// The file is hard-linked into place, so a name collision fails with
/// `AlreadyExists` instead of overwriting. Filesystems without hard links
/// fall back to check-then-rename.
async fn publish(temp: &Path, dest: &Path) -> Result<()> {
    match fs::hard_link(temp, dest).await {
        Ok(()) => {
            if let Err(e) = fs::remove_file(temp).await {
                tracing::warn!(path = %temp.display(), error = %e, "Failed to remove linked partial upload");
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(collision(dest)),
        Err(e) if e.kind() == std::io::ErrorKind::Unsupported => {
            if fs::try_exists(dest).await? {
                return Err(collision(dest));
            }
            fs::rename(temp, dest).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn collision(dest: &Path) -> Error {
    Error::Internal(format!("blob {} already exists", dest.display()))
}

impl Drop for FilesystemUpload {
    fn drop(&mut self) {
        if let Some(temp_path) = self.temp_path.take() {
            drop(self.file.take());
            if let Err(e) = std::fs::remove_file(&temp_path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %temp_path.display(), error = %e, "Failed to remove partial upload");
                }
            }
        }
    }
}
