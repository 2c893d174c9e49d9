//! Read-side reports over the record store
//!
//! Pure functions over loaded records; rendering lives in the HTTP layer.

pub mod archive;
pub mod csv_export;
pub mod stats;

pub use archive::student_archive;
pub use csv_export::{export_file_name, records_to_csv, CSV_HEADER};
pub use stats::{compute_stats, StatsSummary};
