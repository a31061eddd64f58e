//! # docmill-db
//!
//! SQLite persistence layer for the docmill extraction engine.
//!
//! This crate provides:
//! - Connection pool management (WAL mode, busy timeout)
//! - The [`JobRepository`] implementation backing the job state machine
//! - One-time import of legacy flat-file job records
//!
//! ## Example
//!
//! ```rust,ignore
//! use docmill_db::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect(std::path::Path::new("data/jobs.db")).await?;
//!     db.migrate().await?;
//!
//!     let job_id = db.jobs.create("report.pdf", 1200, ".pdf").await?;
//!     println!("Created job: {}", job_id);
//!     Ok(())
//! }
//! ```

pub mod jobs;
pub mod legacy;
pub mod pool;

use std::path::Path;

// Re-export core types
pub use docmill_core::*;

pub use jobs::SqliteJobRepository;
pub use legacy::{import_legacy_json, LegacyJobRecord};
pub use pool::{create_pool, create_pool_with_config, PoolConfig};

/// Main database handle, constructed once at startup.
///
/// Cheap to clone; all clones share the same connection pool.
#[derive(Clone)]
pub struct Database {
    pool: sqlx::SqlitePool,
    /// Job repository: the single source of truth for job status.
    pub jobs: SqliteJobRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self {
            jobs: SqliteJobRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance backed by the given SQLite file.
    pub async fn connect(path: &Path) -> Result<Self> {
        let pool = create_pool(path).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(path: &Path, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(path, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Import legacy flat-file job records (idempotent; see [`legacy`]).
    pub async fn import_legacy(&self, path: &Path) -> Result<u64> {
        import_legacy_json(&self.pool, path).await
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }
}
