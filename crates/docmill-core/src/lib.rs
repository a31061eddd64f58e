//! # docmill-core
//!
//! Core types, traits, and abstractions for the docmill extraction engine.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other docmill crates depend on: the [`Job`] record and its status
//! state machine, the [`JobRepository`] persistence contract, and the
//! [`Extractor`] capability interface that format-specific extractors
//! implement.

pub mod defaults;
pub mod error;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
