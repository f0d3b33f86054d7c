//! Error types for the watershed pipeline.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised while orchestrating a pipeline run.
///
/// No-data conditions (`NoScenes`, an empty municipality result) are
/// terminal for the affected branch only; sibling products keep running.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no reference zone overlaps the watershed envelope")]
    NoZoneOverlap,

    #[error("no scenes pass the cloud/date filters between {start} and {end}")]
    NoScenes { start: NaiveDate, end: NaiveDate },

    #[error("reference catalog: {0}")]
    Catalog(String),

    #[error("reference table {name}: download failed: {reason}")]
    TableDownload { name: String, reason: String },

    #[error("reference table {name}: malformed CSV: {reason}")]
    TableParse { name: String, reason: String },

    #[error("reference table {name}: missing column {column}")]
    MissingColumn { name: String, column: String },

    #[error("core error: {0}")]
    Core(#[from] zapflow_core::Error),

    #[error("remote platform error: {0}")]
    Remote(#[from] zapflow_remote::Error),
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
