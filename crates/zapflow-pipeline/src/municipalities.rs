//! Administrative-unit intersection and representativeness.
//!
//! Every catalog unit whose bounding box touches the watershed envelope gets
//! an exact overlay intersection; units covering at least the threshold share
//! of the watershed are kept, ordered by coverage. An empty result is a valid
//! terminal state: no socioeconomic aggregation applies to that geometry.

use std::cmp::Ordering;

use geo::{Area, BooleanOps};
use geo_types::MultiPolygon;
use tracing::{debug, info};

use crate::error::{Error, Result};
use zapflow_core::vector::FeatureCollection;
use zapflow_core::{BoundingBox, WatershedGeometry};

/// Minimum share of the watershed a unit must cover, percent.
pub const REPRESENTATIVENESS_THRESHOLD: f64 = 20.0;

/// One administrative unit overlapping the watershed.
#[derive(Debug, Clone, PartialEq)]
pub struct MunicipalityMatch {
    pub id: String,
    pub name: String,
    /// Intersection area in CRS units squared.
    pub overlap_area: f64,
    /// Share of the watershed covered by this unit, in `[0, 100]`.
    pub representativeness: f64,
}

/// Whether a coverage share qualifies a unit for aggregation.
///
/// The threshold is inclusive: exactly 20.00% is retained.
pub fn passes_threshold(representativeness: f64) -> bool {
    representativeness >= REPRESENTATIVENESS_THRESHOLD
}

#[derive(Debug, Clone)]
struct UnitEntry {
    id: String,
    name: String,
    footprint: MultiPolygon<f64>,
    bbox: BoundingBox,
}

/// Catalog of administrative-unit boundaries.
#[derive(Debug, Clone)]
pub struct MunicipalityCatalog {
    units: Vec<UnitEntry>,
}

impl MunicipalityCatalog {
    /// Build from a feature collection carrying unit ids and names under the
    /// given property keys. Features without a polygon footprint are skipped.
    pub fn from_features(
        collection: &FeatureCollection,
        id_property: &str,
        name_property: &str,
    ) -> Result<Self> {
        let mut units = Vec::with_capacity(collection.len());
        for feature in collection.iter() {
            let footprint = match &feature.geometry {
                Some(geo_types::Geometry::Polygon(p)) => MultiPolygon::new(vec![p.clone()]),
                Some(geo_types::Geometry::MultiPolygon(mp)) => mp.clone(),
                _ => {
                    debug!("skipping unit feature without polygon footprint");
                    continue;
                }
            };
            let id = feature.property_string(id_property).ok_or_else(|| {
                Error::Catalog(format!("unit feature without {id_property} attribute"))
            })?;
            let name = feature.property_string(name_property).ok_or_else(|| {
                Error::Catalog(format!("unit feature without {name_property} attribute"))
            })?;
            let bbox = match BoundingBox::from_multi_polygon(&footprint) {
                Some(bbox) => bbox,
                None => continue,
            };
            units.push(UnitEntry {
                id,
                name,
                footprint,
                bbox,
            });
        }
        Ok(Self { units })
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Units covering at least [`REPRESENTATIVENESS_THRESHOLD`] percent of
    /// the watershed, sorted descending by coverage.
    pub fn intersect(&self, watershed: &WatershedGeometry) -> Vec<MunicipalityMatch> {
        let total = watershed.area();
        if total <= 0.0 {
            return Vec::new();
        }
        let bbox = watershed.bounding_box();

        let mut matches = Vec::new();
        for unit in &self.units {
            if !unit.bbox.intersects(&bbox) {
                continue;
            }
            let overlap_area = watershed
                .multi_polygon()
                .intersection(&unit.footprint)
                .unsigned_area();
            if overlap_area <= 0.0 {
                continue;
            }
            let representativeness = (overlap_area / total * 100.0).min(100.0);
            if passes_threshold(representativeness) {
                matches.push(MunicipalityMatch {
                    id: unit.id.clone(),
                    name: unit.name.clone(),
                    overlap_area,
                    representativeness,
                });
            } else {
                debug!(
                    unit = %unit.id,
                    representativeness,
                    "unit below representativeness threshold"
                );
            }
        }

        matches.sort_by(|a, b| {
            b.representativeness
                .partial_cmp(&a.representativeness)
                .unwrap_or(Ordering::Equal)
        });
        info!(count = matches.len(), "municipalities at or above threshold");
        matches
    }
}
