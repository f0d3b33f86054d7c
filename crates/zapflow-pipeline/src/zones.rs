//! Projected-zone resolution.
//!
//! A watershed may straddle UTM zone boundaries. The resolver intersects the
//! watershed's buffered envelope against every catalog zone and picks the one
//! with the largest overlap area; centroid containment would bias toward
//! zones that only marginally touch the area of interest.

use std::cmp::Ordering;

use geo::{Area, BooleanOps};
use geo_types::{MultiPolygon, Polygon};
use tracing::debug;

use crate::error::{Error, Result};
use zapflow_core::vector::FeatureCollection;
use zapflow_core::{BoundingBox, WatershedGeometry};

/// Envelope expansion applied before intersecting the zone catalog, in
/// degrees (roughly 1 km at the equator).
pub const ZONE_ENVELOPE_BUFFER_DEG: f64 = 0.01;

/// The projected coordinate system chosen for a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneMatch {
    pub epsg: u32,
    pub overlap_area: f64,
}

#[derive(Debug, Clone)]
struct ZoneEntry {
    epsg: u32,
    footprint: MultiPolygon<f64>,
    bbox: BoundingBox,
}

/// Catalog of candidate projected zones.
#[derive(Debug, Clone)]
pub struct ZoneCatalog {
    zones: Vec<ZoneEntry>,
}

impl ZoneCatalog {
    /// Build from a feature collection whose features carry an EPSG code
    /// under `epsg_property`.
    pub fn from_features(collection: &FeatureCollection, epsg_property: &str) -> Result<Self> {
        let mut zones = Vec::with_capacity(collection.len());
        for feature in collection.iter() {
            let epsg = feature.property_u32(epsg_property).ok_or_else(|| {
                Error::Catalog(format!("zone feature without {epsg_property} attribute"))
            })?;
            let footprint = match &feature.geometry {
                Some(geo_types::Geometry::Polygon(p)) => MultiPolygon::new(vec![p.clone()]),
                Some(geo_types::Geometry::MultiPolygon(mp)) => mp.clone(),
                _ => {
                    return Err(Error::Catalog(format!(
                        "zone EPSG:{epsg} has no polygon footprint"
                    )))
                }
            };
            let bbox = BoundingBox::from_multi_polygon(&footprint)
                .ok_or_else(|| Error::Catalog(format!("zone EPSG:{epsg} footprint is empty")))?;
            zones.push(ZoneEntry {
                epsg,
                footprint,
                bbox,
            });
        }
        Ok(Self { zones })
    }

    /// Built-in SIRGAS 2000 / UTM southern catalog, zones 18S–25S
    /// (EPSG:31978–31985): 6°-wide longitude bands covering Brazil.
    pub fn sirgas_utm_south() -> Self {
        let zones = (18u32..=25)
            .map(|zone| {
                let west = -180.0 + 6.0 * (zone - 1) as f64;
                let footprint = MultiPolygon::new(vec![band_polygon(west, west + 6.0)]);
                let bbox = BoundingBox::new(west, -80.0, west + 6.0, 0.0);
                ZoneEntry {
                    epsg: 31960 + zone,
                    footprint,
                    bbox,
                }
            })
            .collect();
        Self { zones }
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Resolve the single zone with the largest envelope overlap.
    ///
    /// Ties break first-largest in descending area order; the sort is stable,
    /// so equal-area candidates keep catalog order and repeated runs with the
    /// same inputs agree. No overlapping zone is fatal for the run: products
    /// cannot be reprojected without a target system.
    pub fn resolve(&self, watershed: &WatershedGeometry) -> Result<ZoneMatch> {
        let envelope_box = watershed.bounding_box().expand(ZONE_ENVELOPE_BUFFER_DEG);
        let envelope = MultiPolygon::new(vec![envelope_box.to_polygon()]);

        let mut candidates: Vec<ZoneMatch> = Vec::new();
        for zone in &self.zones {
            if !zone.bbox.intersects(&envelope_box) {
                continue;
            }
            let overlap_area = envelope.intersection(&zone.footprint).unsigned_area();
            if overlap_area > 0.0 {
                debug!(epsg = zone.epsg, overlap_area, "zone candidate");
                candidates.push(ZoneMatch {
                    epsg: zone.epsg,
                    overlap_area,
                });
            }
        }

        candidates.sort_by(|a, b| {
            b.overlap_area
                .partial_cmp(&a.overlap_area)
                .unwrap_or(Ordering::Equal)
        });
        candidates.first().copied().ok_or(Error::NoZoneOverlap)
    }
}

fn band_polygon(west: f64, east: f64) -> Polygon<f64> {
    BoundingBox::new(west, -80.0, east, 0.0).to_polygon()
}
