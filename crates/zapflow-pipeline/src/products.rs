//! Derived-product construction.
//!
//! Each selected product becomes a declarative expression the remote platform
//! evaluates server-side, reprojected to the resolved zone at the product's
//! native scale. Products are independent: a no-data condition on the optical
//! composite skips the optical group and leaves the rest untouched.

use chrono::{Duration, NaiveDate, Utc};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::zones::ZoneMatch;
use zapflow_core::WatershedGeometry;
use zapflow_remote::{ImageExpr, RemotePlatform, SceneQuery};

// ---------------------------------------------------------------------------
// Product identity
// ---------------------------------------------------------------------------

/// The derivable raster products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductKind {
    Ndvi,
    Gndvi,
    Ndwi,
    Ndmi,
    SentinelComposite,
    Elevation,
    SlopeClasses,
    LandCover,
    PastureQuality,
}

impl ProductKind {
    pub const ALL: [ProductKind; 9] = [
        Self::Ndvi,
        Self::Gndvi,
        Self::Ndwi,
        Self::Ndmi,
        Self::SentinelComposite,
        Self::Elevation,
        Self::SlopeClasses,
        Self::LandCover,
        Self::PastureQuality,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Ndvi => "ndvi",
            Self::Gndvi => "gndvi",
            Self::Ndwi => "ndwi",
            Self::Ndmi => "ndmi",
            Self::SentinelComposite => "sentinel_composite",
            Self::Elevation => "elevation",
            Self::SlopeClasses => "slope_classes",
            Self::LandCover => "land_cover",
            Self::PastureQuality => "pasture_quality",
        }
    }

    /// Numeric file prefix; doubles as a manual sort order when browsing the
    /// export folder (terrain first, imagery last).
    pub fn file_prefix(self) -> &'static str {
        match self {
            Self::Elevation | Self::SlopeClasses => "02_",
            Self::LandCover => "04_",
            Self::PastureQuality => "05_",
            Self::Ndvi | Self::Gndvi | Self::Ndwi | Self::Ndmi | Self::SentinelComposite => "06_",
        }
    }

    pub fn file_suffix(self) -> &'static str {
        match self {
            Self::Ndvi => "_NDVI",
            Self::Gndvi => "_GNDVI",
            Self::Ndwi => "_NDWI",
            Self::Ndmi => "_NDMI",
            Self::SentinelComposite => "_SENTINEL",
            Self::Elevation => "_MDE",
            Self::SlopeClasses => "_DECLIVIDADE",
            Self::LandCover => "_USO_COBERTURA",
            Self::PastureQuality => "_PASTAGEM",
        }
    }

    /// Native output resolution in meters.
    pub fn scale_m(self) -> u32 {
        match self {
            Self::Ndvi | Self::Gndvi | Self::Ndwi | Self::Ndmi | Self::SentinelComposite => 10,
            Self::Elevation | Self::SlopeClasses | Self::LandCover | Self::PastureQuality => 30,
        }
    }

    /// Products derived from the cloud-filtered optical composite.
    pub fn is_optical(self) -> bool {
        matches!(
            self,
            Self::Ndvi | Self::Gndvi | Self::Ndwi | Self::Ndmi | Self::SentinelComposite
        )
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Immutable selection of products for one pipeline run.
///
/// Replaces the ad-hoc per-session toggles of earlier tooling: every
/// recognized option is an explicit field, fixed before the run starts.
#[derive(Debug, Clone)]
pub struct ProductSelection {
    pub ndvi: bool,
    pub gndvi: bool,
    pub ndwi: bool,
    pub ndmi: bool,
    pub sentinel_composite: bool,
    pub elevation: bool,
    pub slope_classes: bool,
    pub land_cover: bool,
    pub pasture_quality: bool,
    base_name: zapflow_core::ExportName,
}

impl ProductSelection {
    /// Selection with every product disabled.
    pub fn none(base_name: zapflow_core::ExportName) -> Self {
        Self {
            ndvi: false,
            gndvi: false,
            ndwi: false,
            ndmi: false,
            sentinel_composite: false,
            elevation: false,
            slope_classes: false,
            land_cover: false,
            pasture_quality: false,
            base_name,
        }
    }

    /// Selection with every product enabled.
    pub fn all(base_name: zapflow_core::ExportName) -> Self {
        Self {
            ndvi: true,
            gndvi: true,
            ndwi: true,
            ndmi: true,
            sentinel_composite: true,
            elevation: true,
            slope_classes: true,
            land_cover: true,
            pasture_quality: true,
            base_name,
        }
    }

    pub fn base_name(&self) -> &zapflow_core::ExportName {
        &self.base_name
    }

    pub fn is_selected(&self, kind: ProductKind) -> bool {
        match kind {
            ProductKind::Ndvi => self.ndvi,
            ProductKind::Gndvi => self.gndvi,
            ProductKind::Ndwi => self.ndwi,
            ProductKind::Ndmi => self.ndmi,
            ProductKind::SentinelComposite => self.sentinel_composite,
            ProductKind::Elevation => self.elevation,
            ProductKind::SlopeClasses => self.slope_classes,
            ProductKind::LandCover => self.land_cover,
            ProductKind::PastureQuality => self.pasture_quality,
        }
    }

    /// Selected kinds in canonical order.
    pub fn selected(&self) -> Vec<ProductKind> {
        ProductKind::ALL
            .into_iter()
            .filter(|kind| self.is_selected(*kind))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do with zero-slope pixels in the classified product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroSlopePolicy {
    /// Zero slope is flat ground: class 1.
    #[default]
    FoldIntoClassOne,
    /// Mask zero-slope pixels out of the classified raster entirely.
    MaskOut,
}

/// Immutable configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// End of the acquisition window; `None` means "today" at call time.
    pub reference_date: Option<NaiveDate>,
    /// Length of the trailing acquisition window.
    pub window_days: i64,
    /// Cloudy-pixel ceiling for optical scenes, percent.
    pub max_cloud_percent: f64,
    pub zero_slope: ZeroSlopePolicy,
    pub sentinel_collection: String,
    pub dem_collection: String,
    pub land_cover_asset: String,
    pub pasture_quality_asset: String,
    /// Year of the land-cover / pasture classification band.
    pub classification_year: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reference_date: None,
            window_days: 365,
            max_cloud_percent: 10.0,
            zero_slope: ZeroSlopePolicy::default(),
            sentinel_collection: "COPERNICUS/S2_SR".to_string(),
            dem_collection: "COPERNICUS/DEM/GLO30".to_string(),
            land_cover_asset:
                "projects/mapbiomas-workspace/public/collection8/mapbiomas_collection80_integration_v1"
                    .to_string(),
            pasture_quality_asset:
                "projects/mapbiomas-workspace/public/collection8/mapbiomas_collection80_pasture_quality_v1"
                    .to_string(),
            classification_year: 2023,
        }
    }
}

/// Bands kept when loading the Sentinel-2 collection.
const SENTINEL_BANDS: [&str; 5] = ["B2", "B3", "B4", "B8", "B11"];
/// Display bands of the composite product and their stable labels.
const COMPOSITE_BANDS: [&str; 4] = ["B2", "B3", "B4", "B8"];
const COMPOSITE_LABELS: [&str; 4] = ["blue", "green", "red", "nir"];

// ---------------------------------------------------------------------------
// Slope classes
// ---------------------------------------------------------------------------

/// Percent-rise breakpoints separating the six slope classes.
pub const SLOPE_CLASS_BREAKS: [f64; 5] = [3.0, 8.0, 20.0, 45.0, 75.0];

/// Ordinal slope class for a percent-rise value.
///
/// Breakpoints are inclusive on the lower class: 3% is class 1, 8% class 2,
/// and so on up to class 6 above 75%. Zero (and any non-positive) slope is
/// class 1.
pub fn slope_class(percent: f64) -> u8 {
    1 + SLOPE_CLASS_BREAKS.iter().filter(|b| percent > **b).count() as u8
}

// ---------------------------------------------------------------------------
// Derived products
// ---------------------------------------------------------------------------

/// A named raster handle on the remote platform; never materialized locally.
#[derive(Debug, Clone)]
pub struct DerivedProduct {
    pub kind: ProductKind,
    pub expression: ImageExpr,
    pub scale_m: u32,
    pub target_epsg: u32,
}

/// A product that could not be computed; siblings are unaffected.
#[derive(Debug)]
pub struct SkippedProduct {
    pub kind: ProductKind,
    pub reason: Error,
}

/// Everything one `compute` call produced.
#[derive(Debug)]
pub struct PipelineOutput {
    pub products: Vec<DerivedProduct>,
    pub skipped: Vec<SkippedProduct>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Builds derived products for a validated watershed.
pub struct ProductPipeline<'a, P> {
    platform: &'a P,
    config: PipelineConfig,
}

impl<'a, P: RemotePlatform> ProductPipeline<'a, P> {
    pub fn new(platform: &'a P, config: PipelineConfig) -> Self {
        Self { platform, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Build every selected derived product.
    ///
    /// The optical group shares one scene-count probe; a count of zero skips
    /// those products with a [`Error::NoScenes`] reason while independent
    /// products (elevation-derived, thematic) are still produced.
    pub async fn compute(
        &self,
        watershed: &WatershedGeometry,
        zone: &ZoneMatch,
        selection: &ProductSelection,
    ) -> Result<PipelineOutput> {
        let end = self
            .config
            .reference_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let start = end - Duration::days(self.config.window_days);

        let selected = selection.selected();
        let mut products = Vec::with_capacity(selected.len());
        let mut skipped = Vec::new();

        let optical: Vec<ProductKind> =
            selected.iter().copied().filter(|k| k.is_optical()).collect();
        let mut optical_available = true;
        if !optical.is_empty() {
            let query = SceneQuery {
                collection: self.config.sentinel_collection.clone(),
                start,
                end,
                max_cloud_percent: self.config.max_cloud_percent,
                region: watershed.to_geojson(),
            };
            let count = self.platform.scene_count(&query).await?;
            if count == 0 {
                warn!(%start, %end, "no scenes pass the acquisition filters; skipping optical products");
                optical_available = false;
                for kind in &optical {
                    skipped.push(SkippedProduct {
                        kind: *kind,
                        reason: Error::NoScenes { start, end },
                    });
                }
            } else {
                info!(count, %start, %end, "optical composite scenes available");
            }
        }

        for kind in selected {
            if kind.is_optical() && !optical_available {
                continue;
            }
            products.push(DerivedProduct {
                kind,
                expression: self.expression_for(kind, start, end, zone),
                scale_m: kind.scale_m(),
                target_epsg: zone.epsg,
            });
        }

        Ok(PipelineOutput { products, skipped })
    }

    /// Cloud-filtered trailing-window median composite, clipped to the region.
    fn composite_base(&self, start: NaiveDate, end: NaiveDate) -> ImageExpr {
        ImageExpr::collection(&self.config.sentinel_collection, &SENTINEL_BANDS)
            .filter_bounds()
            .filter_date(start, end)
            .filter_cloud(self.config.max_cloud_percent)
            .median()
            .clip()
    }

    /// DEM mosaic with an explicit default projection. The mosaic has no
    /// well-defined projection of its own, so one must be assigned before
    /// any reprojection.
    fn elevation_base(&self) -> ImageExpr {
        ImageExpr::collection(&self.config.dem_collection, &["DEM"])
            .filter_bounds()
            .mosaic()
            .default_projection(4326)
            .clip()
    }

    fn expression_for(
        &self,
        kind: ProductKind,
        start: NaiveDate,
        end: NaiveDate,
        zone: &ZoneMatch,
    ) -> ImageExpr {
        let expr = match kind {
            ProductKind::Ndvi => self
                .composite_base(start, end)
                .normalized_difference("B8", "B4", "NDVI"),
            ProductKind::Gndvi => self
                .composite_base(start, end)
                .normalized_difference("B8", "B3", "GNDVI"),
            ProductKind::Ndwi => self
                .composite_base(start, end)
                .normalized_difference("B3", "B8", "NDWI"),
            ProductKind::Ndmi => self
                .composite_base(start, end)
                .normalized_difference("B8", "B11", "NDMI"),
            ProductKind::SentinelComposite => self
                .composite_base(start, end)
                .select(&COMPOSITE_BANDS, &COMPOSITE_LABELS),
            ProductKind::Elevation => self.elevation_base(),
            ProductKind::SlopeClasses => {
                let percent = self.elevation_base().slope().percent_rise();
                let percent = match self.config.zero_slope {
                    ZeroSlopePolicy::FoldIntoClassOne => percent,
                    ZeroSlopePolicy::MaskOut => percent.mask_non_zero(),
                };
                percent.classify(&SLOPE_CLASS_BREAKS)
            }
            ProductKind::LandCover => ImageExpr::image(&self.config.land_cover_asset)
                .select(&[self.classification_band().as_str()], &[])
                .clip(),
            ProductKind::PastureQuality => ImageExpr::image(&self.config.pasture_quality_asset)
                .select(&[self.classification_band().as_str()], &[])
                .clip(),
        };
        expr.reproject(zone.epsg, kind.scale_m() as f64)
    }

    fn classification_band(&self) -> String {
        format!("classification_{}", self.config.classification_year)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
