//! LMDB-backed cache for single-node deployments.
//!
//! Uses the heed crate (Rust bindings for LMDB). Entries survive restarts,
//! so every value carries its own expiry:
//!
//! ```text
//! [expires_at_millis: i64 LE, 8 bytes][payload]
//! ```
//!
//! Expired or truncated entries are treated as misses and removed lazily.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use super::errors::{CacheError, CacheResult};
use super::traits::CacheBackend;

const HEADER_LEN: usize = 8;

/// Error type for opening the LMDB environment.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for CacheError {
    fn from(e: LmdbCacheError) -> Self {
        CacheError::ConnectionError(e.to_string())
    }
}

fn txn_error(e: heed::Error) -> CacheError {
    CacheError::BackendError(format!("LMDB transaction error: {e}"))
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// LMDB-backed cache.
pub struct LmdbCacheBackend {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl std::fmt::Debug for LmdbCacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbCacheBackend")
            .field("path", &self.env.path())
            .finish()
    }
}

impl LmdbCacheBackend {
    /// Open (or create) a cache environment under `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or LMDB refuses
    /// to open the environment.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per path by this process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb.max(1) * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(Self { env, db })
    }

    /// Number of stored entries, expired ones included.
    pub fn entry_count(&self) -> CacheResult<u64> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        self.db.len(&rtxn).map_err(txn_error)
    }

    fn read_entry(&self, key: &str) -> CacheResult<Lookup> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let Some(bytes) = self.db.get(&rtxn, key.as_bytes()).map_err(txn_error)? else {
            return Ok(Lookup::Missing);
        };
        if bytes.len() < HEADER_LEN {
            return Ok(Lookup::Stale);
        }
        let (header, payload) = bytes.split_at(HEADER_LEN);
        let mut expiry = [0u8; HEADER_LEN];
        expiry.copy_from_slice(header);
        if i64::from_le_bytes(expiry) <= now_millis() {
            return Ok(Lookup::Stale);
        }
        Ok(Lookup::Live(payload.to_vec()))
    }
}

enum Lookup {
    Live(Vec<u8>),
    Missing,
    /// Expired or truncated.
    Stale,
}

#[async_trait]
impl CacheBackend for LmdbCacheBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        match self.read_entry(key)? {
            Lookup::Live(value) => Ok(Some(value)),
            Lookup::Missing => Ok(None),
            Lookup::Stale => {
                let mut wtxn = self.env.write_txn().map_err(txn_error)?;
                self.db
                    .delete(&mut wtxn, key.as_bytes())
                    .map_err(txn_error)?;
                wtxn.commit().map_err(txn_error)?;
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let expires_at = now_millis().saturating_add(ttl.as_millis() as i64);

        let mut full_bytes = Vec::with_capacity(HEADER_LEN + value.len());
        full_bytes.extend_from_slice(&expires_at.to_le_bytes());
        full_bytes.extend_from_slice(value);

        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db
            .put(&mut wtxn, key.as_bytes(), &full_bytes)
            .map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db
            .delete(&mut wtxn, key.as_bytes())
            .map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(())
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(self.env.read_txn().is_ok())
    }

    fn provider_name(&self) -> &'static str {
        "lmdb"
    }
}
