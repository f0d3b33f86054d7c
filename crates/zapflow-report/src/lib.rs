//! # Zapflow Report
//!
//! Spreadsheet assembly for the aggregated socioeconomic tables: one sheet
//! per source table, per-unit header blocks, and per-unit trend charts. The
//! workbook is returned as bytes for the UI layer to offer as a download or
//! hand to the export coordinator.

pub mod charts;
pub mod error;
pub mod workbook;

pub use charts::measurement_unit;
pub use error::{Error, Result};
pub use workbook::{build_workbook, sheet_name, UnitBlockRange, SHEET_NAME_LIMIT};
