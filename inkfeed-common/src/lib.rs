//! # Inkfeed Common Library
//!
//! Shared code for the classroom feedback service:
//! - Submission record model and the JSON file store
//! - Configuration loading (TOML file, root folder resolution)
//! - Error type
//! - Timestamp and identifier helpers

pub mod config;
pub mod error;
pub mod records;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use records::{Record, RecordFilter, RecordStore};
