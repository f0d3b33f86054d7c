//! Error types for report assembly.

use thiserror::Error;

/// Errors produced while assembling the report workbook.
#[derive(Error, Debug)]
pub enum Error {
    #[error("workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),
}

/// Result alias for report operations.
pub type Result<T> = std::result::Result<T, Error>;
