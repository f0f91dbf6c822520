//! Photo catalog queries.

use rusqlite::{params, Connection, OptionalExtension};
use shelf_core::{ListQuery, Locator, PhotoId, Result, SortField, SortOrder};

use crate::error;
use crate::models::Photo;

const COLS: &str = Photo::COLUMNS;

/// Matches every row when `?1` is NULL, otherwise a Unicode case-insensitive
/// substring match on name. Needs [`crate::functions::register`].
const NAME_FILTER: &str = "(?1 IS NULL OR instr(casefold(name), casefold(?1)) > 0)";

fn order_clause(sort: SortField, order: SortOrder) -> &'static str {
    match (sort, order) {
        (SortField::Name, SortOrder::Asc) => "casefold(name) ASC, id DESC",
        (SortField::Name, SortOrder::Desc) => "casefold(name) DESC, id DESC",
        (SortField::UploadedAt, SortOrder::Asc) => "upload_datetime ASC, id DESC",
        (SortField::UploadedAt, SortOrder::Desc) => "upload_datetime DESC, id DESC",
    }
}

/// Count photos whose name contains `search`, ignoring case.
pub fn count_photos(conn: &Connection, search: Option<&str>) -> Result<i64> {
    let q = format!("SELECT COUNT(*) FROM photos WHERE {NAME_FILTER}");
    conn.query_row(&q, params![search], |row| row.get(0))
        .map_err(error::sqlite)
}

/// One page of photos in the requested order.
pub fn list_photos(conn: &Connection, query: &ListQuery) -> Result<Vec<Photo>> {
    let q = format!(
        "SELECT {COLS} FROM photos WHERE {NAME_FILTER} ORDER BY {} LIMIT ?2 OFFSET ?3",
        order_clause(query.sort, query.order)
    );
    let mut stmt = conn.prepare(&q).map_err(error::sqlite)?;
    let rows = stmt
        .query_map(
            params![query.search, query.page.size, query.page.offset()],
            Photo::from_row,
        )
        .map_err(error::sqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(error::sqlite)?;
    Ok(rows)
}

/// A page of photos and the total matching count, read from one snapshot.
pub fn list_page(conn: &Connection, query: &ListQuery) -> Result<(Vec<Photo>, i64)> {
    let tx = conn.unchecked_transaction().map_err(error::sqlite)?;
    let total = count_photos(&tx, query.search.as_deref())?;
    let items = list_photos(&tx, query)?;
    tx.commit().map_err(error::sqlite)?;
    Ok((items, total))
}

/// Insert a photo row and return it as stored.
pub fn insert_photo(
    conn: &Connection,
    name: &str,
    tags: Option<&str>,
    locator: &Locator,
) -> Result<Photo> {
    conn.execute(
        "INSERT INTO photos (name, tags, locator) VALUES (?1, ?2, ?3)",
        params![name, tags, locator.as_str()],
    )
    .map_err(error::sqlite)?;

    let id = PhotoId::new(conn.last_insert_rowid())?;
    get_photo(conn, id)?.ok_or_else(|| shelf_core::Error::not_found("photo", id))
}

/// Get a photo by ID.
pub fn get_photo(conn: &Connection, id: PhotoId) -> Result<Option<Photo>> {
    let q = format!("SELECT {COLS} FROM photos WHERE id = ?1");
    conn.query_row(&q, [id.get()], Photo::from_row)
        .optional()
        .map_err(error::sqlite)
}

/// The locator recorded for a photo, if the row exists.
pub fn find_locator(conn: &Connection, id: PhotoId) -> Result<Option<Locator>> {
    conn.query_row("SELECT locator FROM photos WHERE id = ?1", [id.get()], |row| {
        row.get::<_, String>(0).map(Locator::new)
    })
    .optional()
    .map_err(error::sqlite)
}

/// Delete a photo row. Returns `false` if no row matched.
pub fn delete_photo(conn: &Connection, id: PhotoId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM photos WHERE id = ?1", [id.get()])
        .map_err(error::sqlite)?;
    Ok(n > 0)
}

/// Every locator currently referenced by a row.
pub fn list_locators(conn: &Connection) -> Result<Vec<Locator>> {
    let mut stmt = conn
        .prepare("SELECT locator FROM photos")
        .map_err(error::sqlite)?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0).map(Locator::new))
        .map_err(error::sqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(error::sqlite)?;
    Ok(rows)
}
