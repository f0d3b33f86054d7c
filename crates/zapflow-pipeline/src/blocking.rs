//! Blocking (synchronous) facade for the pipeline.
//!
//! Wraps the async components with an internal current-thread Tokio runtime
//! so a synchronous UI layer can drive the pipeline without managing one.

use crate::error::{Error, Result};
use crate::export::{ExportCoordinator, PollSummary, TrackedTask};
use crate::municipalities::MunicipalityMatch;
use crate::products::{DerivedProduct, PipelineOutput, ProductPipeline, ProductSelection};
use crate::tables::{TableResult, TabularAggregator};
use crate::zones::ZoneMatch;
use zapflow_core::{ExportName, WatershedGeometry};
use zapflow_remote::RemotePlatform;

/// Blocking wrapper around the async pipeline components.
pub struct BlockingRunner {
    rt: tokio::runtime::Runtime,
}

impl BlockingRunner {
    pub fn new() -> Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Core(zapflow_core::Error::Io(e)))?;
        Ok(Self { rt })
    }

    /// Build derived products (blocking).
    pub fn compute_products<P: RemotePlatform>(
        &self,
        pipeline: &ProductPipeline<'_, P>,
        watershed: &WatershedGeometry,
        zone: &ZoneMatch,
        selection: &ProductSelection,
    ) -> Result<PipelineOutput> {
        self.rt.block_on(pipeline.compute(watershed, zone, selection))
    }

    /// Submit exports and poll them to completion (blocking).
    pub fn run_exports<P: RemotePlatform>(
        &self,
        coordinator: &ExportCoordinator<'_, P>,
        products: &[DerivedProduct],
        base: &ExportName,
        watershed: &WatershedGeometry,
    ) -> Result<(Vec<TrackedTask>, PollSummary)> {
        self.rt.block_on(coordinator.run(products, base, watershed))
    }

    /// Download and restructure the reference tables (blocking).
    pub fn aggregate_tables(
        &self,
        aggregator: &TabularAggregator,
        units: &[MunicipalityMatch],
    ) -> Result<Vec<TableResult>> {
        self.rt.block_on(aggregator.aggregate(units))
    }
}
