//! Classification of SQLite and pool failures into [`shelf_core::Error`].

use rusqlite::ErrorCode;
use shelf_core::Error;

/// Map a rusqlite error onto the catalog taxonomy.
///
/// Constraint failures become [`Error::ConstraintViolation`]; failures that
/// mean the store cannot be used right now become [`Error::StoreUnavailable`];
/// everything else is a plain [`Error::Database`].
pub fn sqlite(e: rusqlite::Error) -> Error {
    match e.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => Error::constraint(e),
        Some(
            ErrorCode::CannotOpen
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::SystemIoFailure
            | ErrorCode::NotADatabase
            | ErrorCode::DiskFull
            | ErrorCode::PermissionDenied
            | ErrorCode::ReadOnly,
        ) => Error::unavailable(e),
        _ => Error::database(e),
    }
}

/// A pool checkout or build failure means the store is unreachable.
pub fn pool(e: r2d2::Error) -> Error {
    Error::unavailable(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn constraint_is_classified() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v TEXT NOT NULL)").unwrap();
        let err = conn
            .execute("INSERT INTO t (v) VALUES (NULL)", [])
            .unwrap_err();
        assert!(matches!(sqlite(err), Error::ConstraintViolation { .. }));
    }

    #[test]
    fn syntax_error_is_database() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.execute_batch("SELEC nonsense").unwrap_err();
        assert!(matches!(sqlite(err), Error::Database { .. }));
    }

    #[test]
    fn unopenable_file_is_unavailable() {
        let err = Connection::open("/nonexistent-dir/definitely/missing.db").unwrap_err();
        assert!(matches!(sqlite(err), Error::StoreUnavailable { .. }));
    }
}
