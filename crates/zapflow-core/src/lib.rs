//! # Zapflow Core
//!
//! Core types for the watershed data-product pipeline.
//!
//! This crate provides:
//! - `WatershedGeometry`: a validated, immutable watershed boundary
//! - `GeometryValidator`: ordered upload checks with typed failures
//! - `Crs`: coordinate reference system handling
//! - `Feature` / `FeatureCollection`: vector catalogs (zones, municipalities)

pub mod crs;
pub mod error;
pub mod geometry;
pub mod validate;
pub mod vector;

pub use crs::Crs;
pub use error::{Error, Result};
pub use geometry::{BoundingBox, WatershedGeometry};
pub use validate::{ExportName, GeometryValidator, MAX_UPLOAD_BYTES};
pub use vector::{AttributeValue, Feature, FeatureCollection};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::Crs;
    pub use crate::error::{Error, Result};
    pub use crate::geometry::{BoundingBox, WatershedGeometry};
    pub use crate::validate::{ExportName, GeometryValidator};
}
