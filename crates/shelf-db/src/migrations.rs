//! Embedded SQL migrations, the runner, and additive column upgrades.
//!
//! Versioned migrations live in [`MIGRATIONS`] and are tracked in a
//! `schema_migrations` table. Columns introduced after a catalog was first
//! deployed are added by [`ensure_column`], which checks the live table
//! definition first and is safe to run on every start.

use rusqlite::Connection;
use shelf_core::{Error, Result};

use crate::error;

/// V1: the photo catalog table.
const V1_INITIAL: &str = r#"
CREATE TABLE photos (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL CHECK (length(name) BETWEEN 1 AND 40),
    upload_datetime TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    locator         TEXT NOT NULL
);

CREATE INDEX idx_photos_upload_datetime ON photos(upload_datetime);
CREATE INDEX idx_photos_name ON photos(name);
"#;

/// Ordered list of all migrations. Each entry is `(version, sql)`.
const MIGRATIONS: &[(i64, &str)] = &[(1, V1_INITIAL)];

/// Declaration of the optional `photos.tags` column.
pub const TAGS_COLUMN_DECL: &str = "TEXT NULL CHECK (tags IS NULL OR length(tags) <= 255)";

/// Run all pending migrations on the given connection.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(error::sqlite)?;

    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(error::sqlite)?;

        if already {
            continue;
        }

        let tx = conn.unchecked_transaction().map_err(error::sqlite)?;

        tx.execute_batch(sql)
            .map_err(|e| Error::database(format!("Migration V{version} failed: {e}")))?;

        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(error::sqlite)?;

        tx.commit().map_err(error::sqlite)?;
        tracing::info!(version, "Applied schema migration");
    }

    Ok(())
}

/// Bring the schema fully up to date: versioned migrations, then additive
/// column checks.
pub fn prepare_schema(conn: &Connection) -> Result<()> {
    run_migrations(conn)?;
    ensure_column(conn, "photos", "tags", TAGS_COLUMN_DECL)?;
    Ok(())
}

/// Whether `table` currently has a column named `column`.
pub fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM pragma_table_info(?1) WHERE name = ?2",
        [table, column],
        |row| row.get(0),
    )
    .map_err(error::sqlite)
}

/// Add `column` to `table` unless it already exists.
///
/// Returns `true` when the column was added. A concurrent process adding the
/// same column between the check and the `ALTER` is treated as success.
pub fn ensure_column(conn: &Connection, table: &str, column: &str, decl: &str) -> Result<bool> {
    for ident in [table, column] {
        if !is_identifier(ident) {
            return Err(Error::Internal(format!("invalid SQL identifier {ident:?}")));
        }
    }

    if column_exists(conn, table, column)? {
        tracing::debug!(table, column, "Column already present");
        return Ok(false);
    }

    let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {decl}");
    if let Err(e) = conn.execute_batch(&sql) {
        if column_exists(conn, table, column)? {
            return Ok(false);
        }
        return Err(error::sqlite(e));
    }

    tracing::info!(table, column, "Added missing column");
    Ok(true)
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !s.starts_with(|c: char| c.is_ascii_digit())
}
