//! Error types for watershed input handling.

use thiserror::Error;

/// Errors raised while validating and preparing watershed input data.
///
/// Upload validation failures map one-to-one onto the checks performed by
/// [`crate::validate::GeometryValidator`], so callers can always tell the
/// operator exactly which rule the file violated.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid GeoJSON: {0}")]
    InvalidGeoJson(String),

    #[error("file is {bytes} bytes, above the {limit}-byte upload ceiling")]
    FileTooLarge { bytes: usize, limit: usize },

    #[error("expected exactly one feature, found {0}")]
    FeatureCount(usize),

    #[error("feature has an empty geometry")]
    EmptyGeometry,

    #[error("unsupported geometry type {0} (expected Polygon or MultiPolygon)")]
    UnsupportedGeometryType(String),

    #[error("no coordinate reference system declared on the uploaded file")]
    MissingCrs,

    #[error("CRS mismatch: file declares {found}, required {required}")]
    CrsMismatch { found: String, required: String },

    #[error("invalid export name {0:?}: only letters, digits, '-' and '_' are allowed")]
    InvalidExportName(String),

    #[error("{0}")]
    Other(String),
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
