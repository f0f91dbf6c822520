//! Scalar SQL functions registered on every pooled connection.

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

/// SQL name of the Unicode case-folding function.
pub const CASEFOLD: &str = "casefold";

/// Register `casefold(text)`: Unicode lowercase of its argument, NULL for NULL.
///
/// SQLite's own `lower()`, `LIKE` and `NOCASE` only fold ASCII.
pub fn register(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        CASEFOLD,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|s| s.to_lowercase()))
        },
    )
}
