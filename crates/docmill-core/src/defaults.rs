//! Centralized default constants for the docmill engine.
//!
//! **This module is the single source of truth** for all shared default
//! values. Crates reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// WORKER POOL
// =============================================================================

/// Maximum number of concurrently executing extraction jobs.
pub const JOB_MAX_CONCURRENT: usize = 4;

/// Default event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// RETENTION & CLEANUP
// =============================================================================

/// Hours a completed job's record and artifacts are retained.
pub const JOB_RETENTION_HOURS: i64 = 24;

/// Hours after which a still-PENDING job is presumed abandoned and reclaimed.
/// Defaults to the completed-job window; operators can shorten it
/// independently via `JOB_PENDING_RETENTION_HOURS`.
pub const JOB_PENDING_RETENTION_HOURS: i64 = 24;

/// Interval between cleanup sweeps, in seconds (hourly).
pub const CLEANUP_INTERVAL_SECS: u64 = 3600;

/// Shortened retry interval after a failed cleanup pass, in seconds.
pub const CLEANUP_ERROR_BACKOFF_SECS: u64 = 300;

/// Seconds an uploaded file may sit in the staging directory before the
/// uploads sweep removes it.
pub const UPLOAD_RETENTION_SECS: u64 = 3600;

// =============================================================================
// EXTRACTION
// =============================================================================

/// Per-invocation timeout for external extraction commands, in seconds.
pub const EXTRACTION_CMD_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum number of connections in the SQLite pool.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Default SQLite busy timeout in seconds. Writers queue behind the
/// database-level lock instead of failing with SQLITE_BUSY.
pub const DB_BUSY_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for job listings.
pub const LIST_LIMIT: i64 = 100;
