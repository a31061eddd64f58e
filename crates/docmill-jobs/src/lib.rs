//! # docmill-jobs
//!
//! Extraction job engine for docmill.
//!
//! This crate provides:
//! - An ordered extractor capability registry with built-in capabilities
//! - A bounded worker pool processing extraction jobs off the request path
//! - A periodic cleanup scheduler for expired records and artifacts
//! - The result materializer writing per-job output directories and
//!   download archives
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use docmill_db::Database;
//! use docmill_jobs::{
//!     CleanupConfig, CleanupScheduler, DispatcherConfig, ExtractorRegistry, JobDispatcher,
//!     ResultMaterializer,
//! };
//!
//! let db = Database::connect(std::path::Path::new("data/jobs.db")).await?;
//! db.migrate().await?;
//!
//! let registry = Arc::new(ExtractorRegistry::with_default_extractors());
//! let materializer = Arc::new(ResultMaterializer::new("data/outputs"));
//!
//! let dispatcher = JobDispatcher::new(
//!     db.clone(),
//!     registry,
//!     materializer.clone(),
//!     DispatcherConfig::from_env(),
//! );
//! let handle = dispatcher.start();
//!
//! let cleanup = CleanupScheduler::new(
//!     db.clone(),
//!     materializer,
//!     "data/uploads",
//!     CleanupConfig::from_env(),
//! )
//! .start();
//!
//! // Submit work for a validated, already-saved upload:
//! let job_id = db.jobs.create("report.pdf", 1200, ".pdf").await?;
//! handle.submit(job_id, "data/uploads/report_1700000000.pdf")?;
//!
//! // Graceful shutdown drains in-flight work and stops the sweeper.
//! handle.shutdown().await?;
//! cleanup.shutdown().await?;
//! ```

pub mod cleanup;
pub mod dispatcher;
pub mod extractors;
pub mod materializer;
pub mod registry;

// Re-export core types
pub use docmill_core::*;

pub use cleanup::{CleanupConfig, CleanupHandle, CleanupScheduler};
pub use dispatcher::{DispatcherConfig, DispatcherHandle, JobDispatcher, WorkerEvent};
pub use extractors::{DocxExtractor, MarkdownExtractor, PdfExtractor, XlsxExtractor};
pub use materializer::{MaterializedOutput, ResultMaterializer};
pub use registry::ExtractorRegistry;
