use rusqlite::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Raised by the non-destructive migration strategies. The destructive
    /// strategy never returns this; it wipes the store instead.
    #[error("Schema version mismatch: store is at v{found}, application declares v{expected}")]
    SchemaVersionMismatch { found: i64, expected: u32 },

    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, msg) if err.code == ErrorCode::ConstraintViolation => {
                StoreError::Constraint(msg.clone().unwrap_or_else(|| e.to_string()))
            }
            _ => StoreError::Database(e),
        }
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(e: r2d2::Error) -> Self {
        StoreError::StoreUnavailable(e.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::StoreUnavailable(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn primary_key_collision_maps_to_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY); INSERT INTO t VALUES (1);")
            .unwrap();

        let err: StoreError = conn
            .execute("INSERT INTO t VALUES (1)", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, StoreError::Constraint(_)), "got {err:?}");
    }

    #[test]
    fn other_sqlite_errors_stay_database_errors() {
        let conn = Connection::open_in_memory().unwrap();
        let err: StoreError = conn
            .execute("SELECT * FROM missing_table", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, StoreError::Database(_)), "got {err:?}");
    }

    #[test]
    fn io_errors_mean_store_unavailable() {
        let err: StoreError = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope").into();
        assert!(matches!(err, StoreError::StoreUnavailable(_)));
    }

    #[test]
    fn mismatch_message_names_both_versions() {
        let err = StoreError::SchemaVersionMismatch {
            found: 1,
            expected: 3,
        };
        assert_eq!(
            err.to_string(),
            "Schema version mismatch: store is at v1, application declares v3"
        );
    }
}
