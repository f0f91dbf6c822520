//! Async access to photo metadata.

use async_trait::async_trait;
use rusqlite::Connection;
use shelf_core::{Error, ListQuery, Locator, NewPhoto, PhotoId, Result};
use shelf_db::models::Photo;
use shelf_db::queries::photos;
use shelf_db::DbHandle;

/// One page of a listing plus the number of rows matching the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoPage {
    pub items: Vec<Photo>,
    pub total: i64,
}

/// Metadata store for catalog photos.
///
/// Every method fails with a store error (not `NotFound`) when the store
/// cannot be reached.
#[async_trait]
pub trait PhotoRepository: Send + Sync {
    /// Liveness probe.
    async fn ping(&self) -> Result<()>;

    async fn count(&self, search: Option<&str>) -> Result<i64>;

    async fn list(&self, query: &ListQuery) -> Result<PhotoPage>;

    /// Insert a validated photo pointing at `locator`, returning the stored row.
    async fn insert(&self, photo: &NewPhoto, locator: &Locator) -> Result<Photo>;

    /// The blob locator of a photo, or `NotFound`.
    async fn find_locator(&self, id: PhotoId) -> Result<Locator>;

    /// Remove a photo row, or `NotFound` if there is none.
    async fn delete(&self, id: PhotoId) -> Result<()>;

    /// Every locator referenced by a row.
    async fn locators(&self) -> Result<Vec<Locator>>;
}

/// [`PhotoRepository`] backed by the SQLite pool.
///
/// Queries run on the blocking thread pool so slow disk I/O never stalls
/// the async workers.
#[derive(Debug, Clone)]
pub struct SqlitePhotoRepository {
    db: DbHandle,
}

impl SqlitePhotoRepository {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.conn()?;
            f(&*conn)
        })
        .await
        .map_err(|e| Error::Internal(format!("database task failed: {e}")))?
    }
}

#[async_trait]
impl PhotoRepository for SqlitePhotoRepository {
    async fn ping(&self) -> Result<()> {
        self.run(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(shelf_db::error::sqlite)?;
            Ok(())
        })
        .await
    }

    async fn count(&self, search: Option<&str>) -> Result<i64> {
        let search = search.map(String::from);
        self.run(move |conn| photos::count_photos(conn, search.as_deref()))
            .await
    }

    async fn list(&self, query: &ListQuery) -> Result<PhotoPage> {
        let query = query.clone();
        let (items, total) = self.run(move |conn| photos::list_page(conn, &query)).await?;
        Ok(PhotoPage { items, total })
    }

    async fn insert(&self, photo: &NewPhoto, locator: &Locator) -> Result<Photo> {
        let name = photo.name.clone();
        let tags = photo.encoded_tags();
        let locator = locator.clone();
        self.run(move |conn| photos::insert_photo(conn, &name, tags.as_deref(), &locator))
            .await
    }

    async fn find_locator(&self, id: PhotoId) -> Result<Locator> {
        self.run(move |conn| photos::find_locator(conn, id))
            .await?
            .ok_or_else(|| Error::not_found("photo", id))
    }

    async fn delete(&self, id: PhotoId) -> Result<()> {
        if self.run(move |conn| photos::delete_photo(conn, id)).await? {
            Ok(())
        } else {
            Err(Error::not_found("photo", id))
        }
    }

    async fn locators(&self) -> Result<Vec<Locator>> {
        self.run(photos::list_locators).await
    }
}
