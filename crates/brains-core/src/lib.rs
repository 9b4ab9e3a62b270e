//! # brains-core
//!
//! Core types, traits, and abstractions for the brains note store.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the database layer depends on: the ordered-stream contract, the
//! `[[...]]` link extraction/classification pipeline, and the error taxonomy.

pub mod error;
pub mod link_extraction;
pub mod logging;
pub mod models;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use link_extraction::{classify, extract_raw_links, extract_typed_links};
pub use models::*;
pub use traits::*;
pub use uuid_utils::{extract_timestamp, is_v7, new_v7};
