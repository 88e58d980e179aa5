//! SQLite storage engine: single connection guarded by a mutex, WAL mode,
//! schema created at construction (spec §5 "Shared resources" — the pool
//! here is a single physical connection since the sandboxed SQLite file
//! has no concurrent-writer story; callers needing read parallelism open
//! additional read-only connections via [`StorageEngine::open_reader`]).

use std::sync::Mutex;

use rusqlite::Connection;
use tracing::instrument;

use meshcore_core::config::StorageConfig;
use meshcore_core::errors::StorageError;

use crate::schema;

pub struct StorageEngine {
    conn: Mutex<Connection>,
    config: StorageConfig,
}

impl StorageEngine {
    /// Opens (creating if absent) the database at `config.database_path`,
    /// enables WAL mode and foreign keys, and ensures the schema exists.
    #[instrument(skip(config), fields(path = %config.database_path))]
    pub fn open(config: StorageConfig) -> Result<Self, StorageError> {
        let conn = Connection::open(&config.database_path).map_err(|e| StorageError::Sqlite {
            message: e.to_string(),
        })?;
        Self::init_connection(&conn)?;
        schema::ensure_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            config,
        })
    }

    /// In-memory database, for tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|e| StorageError::Sqlite {
            message: e.to_string(),
        })?;
        Self::init_connection(&conn)?;
        schema::ensure_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            config: StorageConfig::default(),
        })
    }

    fn init_connection(conn: &Connection) -> Result<(), StorageError> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 4000;",
        )
        .map_err(|e| StorageError::Sqlite {
            message: e.to_string(),
        })
    }

    /// Opens a second, read-only connection to the same file (in-memory
    /// databases cannot be shared this way and return the same handle is
    /// not possible, so this is a no-op path exercised only against a
    /// file-backed database).
    pub fn open_reader(&self) -> Result<Connection, StorageError> {
        Connection::open(&self.config.database_path).map_err(|e| StorageError::Sqlite {
            message: e.to_string(),
        })
    }

    /// Runs `f` with exclusive access to the connection. Held only for the
    /// duration of `f`; never held across network I/O (spec §5).
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let conn = self.conn.lock().unwrap();
        f(&conn)
    }

    /// Runs `f` inside a single SQLite transaction, committing on `Ok` and
    /// rolling back on `Err` (spec §5 "multi-statement transactions...
    /// rollback-on-early-return guard").
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(|e| StorageError::Sqlite {
            message: e.to_string(),
        })?;
        match f(&tx) {
            Ok(value) => {
                tx.commit().map_err(|e| StorageError::Sqlite {
                    message: e.to_string(),
                })?;
                Ok(value)
            }
            Err(e) => {
                // `Transaction::drop` rolls back automatically if not
                // committed; this explicit drop just documents intent.
                drop(tx);
                Err(e)
            }
        }
    }
}

/// Encodes a vector as a little-endian `f32` byte buffer for `BLOB` storage
/// (spec §6 Embedding columns; no native vector type in SQLite).
pub fn encode_vector(v: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(v.len() * 4);
    for x in v {
        buf.extend_from_slice(&x.to_le_bytes());
    }
    buf
}

/// Inverse of [`encode_vector`].
pub fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_in_memory_and_creates_schema() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let count: i64 = engine
            .with_conn(|c| {
                c.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='contexts'",
                    [],
                    |r| r.get(0),
                )
                .map_err(|e| StorageError::Sqlite {
                    message: e.to_string(),
                })
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn vector_round_trips_through_bytes() {
        let v = vec![0.5_f32, -1.0, 3.25];
        let bytes = encode_vector(&v);
        assert_eq!(decode_vector(&bytes), v);
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let result: Result<(), StorageError> = engine.transaction(|tx| {
            tx.execute(
                "INSERT INTO contexts (id, tenant_id, name, status, properties, created_at, updated_at)
                 VALUES ('c1', 't1', 'n', 'active', '{}', '2024-01-01', '2024-01-01')",
                [],
            )
            .map_err(|e| StorageError::Sqlite { message: e.to_string() })?;
            Err(StorageError::Sqlite {
                message: "forced failure".into(),
            })
        });
        assert!(result.is_err());

        let count: i64 = engine
            .with_conn(|c| {
                c.query_row("SELECT COUNT(*) FROM contexts", [], |r| r.get(0))
                    .map_err(|e| StorageError::Sqlite { message: e.to_string() })
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}
