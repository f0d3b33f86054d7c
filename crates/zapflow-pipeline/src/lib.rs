//! # Zapflow Pipeline
//!
//! Orchestration of watershed data products against a remote
//! Earth-observation compute platform.
//!
//! A run flows through the components in order:
//!
//! 1. the caller validates an uploaded boundary with
//!    `zapflow_core::GeometryValidator`;
//! 2. [`zones::ZoneCatalog`] resolves the projected zone of largest overlap;
//! 3. [`products::ProductPipeline`] builds one declarative expression per
//!    selected product;
//! 4. [`export::ExportCoordinator`] submits the exports and polls the remote
//!    task queue until every task is terminal;
//! 5. in parallel, [`municipalities::MunicipalityCatalog`] finds the
//!    administrative units covering the watershed and
//!    [`tables::TabularAggregator`] restructures the socioeconomic reference
//!    tables for them.
//!
//! All remote access goes through the `zapflow_remote::RemotePlatform` trait,
//! so the whole flow runs against an in-memory platform in tests.

pub mod blocking;
pub mod error;
pub mod export;
pub mod municipalities;
pub mod products;
pub mod tables;
pub mod zones;

pub use blocking::BlockingRunner;
pub use error::{Error, Result};
pub use export::{
    export_file_name, ExportCoordinator, PollOptions, PollSummary, TaskState, TrackedTask,
    MAX_EXPORT_PIXELS,
};
pub use municipalities::{
    MunicipalityCatalog, MunicipalityMatch, REPRESENTATIVENESS_THRESHOLD,
};
pub use products::{
    slope_class, DerivedProduct, PipelineConfig, PipelineOutput, ProductKind, ProductPipeline,
    ProductSelection, SkippedProduct, ZeroSlopePolicy, SLOPE_CLASS_BREAKS,
};
pub use tables::{TableResult, TableSource, TabularAggregator, TOP_PRODUCTS};
pub use zones::{ZoneCatalog, ZoneMatch, ZONE_ENVELOPE_BUFFER_DEG};
