//! Object-store collaborators: a bucket directory on disk or a SQLite blob table.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tracing::debug;

use crate::secrets::Credentials;

pub const DEFAULT_BUCKET: &str = "nfl-daily-fantasy";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },
    #[error("credential '{name}' unavailable: {message}")]
    CredentialUnavailable { name: String, message: String },
    #[error("credential '{name}' is malformed: {message}")]
    CredentialMalformed { name: String, message: String },
}

pub trait ObjectStore {
    fn bucket(&self) -> &str;

    fn put_object(
        &self,
        credentials: &Credentials,
        key: &str,
        body: &[u8],
    ) -> Result<(), StorageError>;

    fn get_object(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// Relative keys only; no `..`, no absolute paths, no empty segments.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let path = Path::new(key);
    let well_formed = !key.is_empty()
        && !key.ends_with('/')
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if well_formed {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// Stores objects as files under `<root>/<bucket>/<key>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalObjectStore {
    root: PathBuf,
    bucket: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
        }
    }

    pub fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(&self.bucket).join(key))
    }
}

impl ObjectStore for LocalObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn put_object(
        &self,
        _credentials: &Credentials,
        key: &str,
        body: &[u8],
    ) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(&path, body)?;
        debug!(
            component = "storage",
            event = "storage.put",
            backend = "local",
            bucket = %self.bucket,
            key,
            bytes = body.len()
        );
        Ok(())
    }

    fn get_object(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound {
                    bucket: self.bucket.clone(),
                    key: key.to_string(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| StorageError::InvalidKey(path.display().to_string()))?;
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    fs::rename(tmp_path, path)?;
    Ok(())
}

/// Stores objects as blobs in a single SQLite table keyed by (bucket, key).
pub struct SqliteObjectStore {
    conn: Connection,
    bucket: String,
}

impl SqliteObjectStore {
    pub fn open(path: &Path, bucket: impl Into<String>) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open(path)?, bucket)
    }

    pub fn in_memory(bucket: impl Into<String>) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?, bucket)
    }

    fn from_connection(conn: Connection, bucket: impl Into<String>) -> Result<Self, StorageError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS objects (
                bucket TEXT NOT NULL,
                key TEXT NOT NULL,
                body BLOB NOT NULL,
                written_by TEXT NOT NULL,
                written_at_ms INTEGER NOT NULL,
                PRIMARY KEY(bucket, key)
            ) WITHOUT ROWID;
            ",
        )?;
        Ok(Self {
            conn,
            bucket: bucket.into(),
        })
    }

    pub fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT key FROM objects WHERE bucket = ?1 AND substr(key, 1, length(?2)) = ?2 ORDER BY key ASC",
        )?;
        let keys = stmt
            .query_map(params![self.bucket, prefix], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}

impl ObjectStore for SqliteObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn put_object(
        &self,
        credentials: &Credentials,
        key: &str,
        body: &[u8],
    ) -> Result<(), StorageError> {
        validate_key(key)?;
        self.conn.execute(
            "
            INSERT INTO objects (bucket, key, body, written_by, written_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(bucket, key) DO UPDATE SET
                body = excluded.body,
                written_by = excluded.written_by,
                written_at_ms = excluded.written_at_ms
            ",
            params![
                self.bucket,
                key,
                body,
                credentials.access_key_id,
                Utc::now().timestamp_millis()
            ],
        )?;
        debug!(
            component = "storage",
            event = "storage.put",
            backend = "sqlite",
            bucket = %self.bucket,
            key,
            bytes = body.len()
        );
        Ok(())
    }

    fn get_object(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        validate_key(key)?;
        self.conn
            .query_row(
                "SELECT body FROM objects WHERE bucket = ?1 AND key = ?2",
                params![self.bucket, key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn creds() -> Credentials {
        Credentials {
            access_key_id: "AKIATEST".to_string(),
            secret_access_key: "secret".to_string(),
        }
    }

    #[test]
    fn keys_must_be_relative_and_clean() {
        assert!(validate_key("data/processed/qb/a.parquet").is_ok());
        for bad in ["", "/abs/key", "../escape", "data/../x", "dir/"] {
            assert!(
                matches!(validate_key(bad), Err(StorageError::InvalidKey(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn local_store_round_trips_and_reports_missing() {
        let dir = tempdir().expect("temp dir should be created");
        let store = LocalObjectStore::new(dir.path(), DEFAULT_BUCKET);

        store
            .put_object(&creds(), "data/processed/qb/x.parquet", b"PAR1")
            .unwrap();
        assert_eq!(store.get_object("data/processed/qb/x.parquet").unwrap(), b"PAR1");
        assert!(dir
            .path()
            .join(DEFAULT_BUCKET)
            .join("data/processed/qb/x.parquet")
            .exists());
        assert!(!dir
            .path()
            .join(DEFAULT_BUCKET)
            .join("data/processed/qb/x.parquet.tmp")
            .exists());

        let err = store.get_object("data/processed/qb/missing.parquet").unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[test]
    fn sqlite_store_overwrites_and_lists_by_prefix() {
        let store = SqliteObjectStore::in_memory(DEFAULT_BUCKET).unwrap();
        store.put_object(&creds(), "data/processed/qb/a.parquet", b"one").unwrap();
        store.put_object(&creds(), "data/processed/qb/a.parquet", b"two").unwrap();
        store.put_object(&creds(), "model/linear_model.json", b"{}").unwrap();

        assert_eq!(store.get_object("data/processed/qb/a.parquet").unwrap(), b"two");
        assert_eq!(
            store.list_keys("data/").unwrap(),
            vec!["data/processed/qb/a.parquet".to_string()]
        );
        assert!(matches!(
            store.get_object("nope.csv"),
            Err(StorageError::NotFound { .. })
        ));
    }
}
