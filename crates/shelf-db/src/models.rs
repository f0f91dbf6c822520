//! Row types for the photo catalog.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use shelf_core::{decode_tags, Locator, PhotoId};

/// One catalog entry as stored in the `photos` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub id: PhotoId,
    pub name: String,
    pub tags: Vec<String>,
    pub uploaded_at: DateTime<Utc>,
    pub locator: Locator,
}

impl Photo {
    /// Column order expected by [`Photo::from_row`].
    pub const COLUMNS: &'static str = "id, name, tags, upload_datetime, locator";

    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let raw_id: i64 = row.get(0)?;
        let id = PhotoId::new(raw_id)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(e)))?;

        let tags: Option<String> = row.get(2)?;
        let uploaded: String = row.get(3)?;
        let uploaded_at = DateTime::parse_from_rfc3339(&uploaded)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?
            .with_timezone(&Utc);

        Ok(Self {
            id,
            name: row.get(1)?,
            tags: decode_tags(tags.as_deref()),
            uploaded_at,
            locator: Locator::new(row.get::<_, String>(4)?),
        })
    }
}
