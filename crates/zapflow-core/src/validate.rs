//! Upload validation for watershed boundary files.
//!
//! Checks run in a fixed order and each failure maps onto a dedicated
//! [`Error`] variant, so the caller can always report the exact rule an
//! upload violated. A file that fails any check must be corrected and
//! re-uploaded; nothing is coerced silently. The one permitted repair is
//! topological: a boundary whose ring self-intersects is healed with a
//! zero-width-buffer-equivalent boolean self-union.

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::geometry::WatershedGeometry;
use geo::BooleanOps;
use geo_types::{Coord, Geometry, MultiPolygon};
use geojson::GeoJson;
use std::fmt;
use tracing::{debug, warn};

/// Upload size ceiling (1 MiB).
pub const MAX_UPLOAD_BYTES: usize = 1 << 20;

// ---------------------------------------------------------------------------
// Export name
// ---------------------------------------------------------------------------

/// Export-naming root supplied by the operator.
///
/// The name is embedded verbatim between a product prefix and suffix when
/// export files are named, so it must carry no whitespace and only
/// filesystem-safe characters. Invalid input is rejected, never rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportName(String);

impl ExportName {
    pub fn new(raw: &str) -> Result<Self> {
        let valid = !raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(Error::InvalidExportName(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExportName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Validates an uploaded single-feature GeoJSON boundary file.
pub struct GeometryValidator {
    required_crs: Crs,
    max_bytes: usize,
}

impl Default for GeometryValidator {
    fn default() -> Self {
        Self {
            required_crs: Crs::sirgas2000(),
            max_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

impl GeometryValidator {
    pub fn new(required_crs: Crs) -> Self {
        Self {
            required_crs,
            max_bytes: MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Run the five checks in order, repair minor ring invalidity, and return
    /// the validated geometry.
    ///
    /// Check order: file size, feature count, non-empty geometry, geometry
    /// type, declared CRS. A CRS mismatch is a hard error; the boundary is
    /// never reprojected on the caller's behalf.
    pub fn validate(&self, bytes: &[u8]) -> Result<WatershedGeometry> {
        if bytes.len() > self.max_bytes {
            return Err(Error::FileTooLarge {
                bytes: bytes.len(),
                limit: self.max_bytes,
            });
        }

        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::InvalidGeoJson(format!("not valid UTF-8: {e}")))?;
        let parsed: GeoJson = text
            .parse()
            .map_err(|e: geojson::Error| Error::InvalidGeoJson(e.to_string()))?;
        let collection = match parsed {
            GeoJson::FeatureCollection(fc) => fc,
            _ => {
                return Err(Error::InvalidGeoJson(
                    "expected a FeatureCollection".to_string(),
                ))
            }
        };

        if collection.features.len() != 1 {
            return Err(Error::FeatureCount(collection.features.len()));
        }

        let feature = &collection.features[0];
        let geometry = feature.geometry.as_ref().ok_or(Error::EmptyGeometry)?;
        if geometry_is_empty(&geometry.value) {
            return Err(Error::EmptyGeometry);
        }

        let multi_polygon = match &geometry.value {
            geojson::Value::Polygon(_) | geojson::Value::MultiPolygon(_) => {
                let converted = Geometry::<f64>::try_from(geometry)
                    .map_err(|e| Error::InvalidGeoJson(e.to_string()))?;
                to_multi_polygon(converted).ok_or(Error::EmptyGeometry)?
            }
            other => return Err(Error::UnsupportedGeometryType(type_name(other))),
        };

        let declared = declared_crs(&collection).ok_or(Error::MissingCrs)?;
        if !declared.is_equivalent(&self.required_crs) {
            return Err(Error::CrsMismatch {
                found: declared.identifier(),
                required: self.required_crs.identifier(),
            });
        }

        let multi_polygon = if ring_self_intersects(&multi_polygon) {
            warn!("boundary ring self-intersects; applying zero-width buffer repair");
            repair(&multi_polygon)
        } else {
            multi_polygon
        };

        debug!(crs = %declared, "boundary validated");
        WatershedGeometry::new(multi_polygon, declared).ok_or(Error::EmptyGeometry)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// CRS declared via the legacy named-CRS member of the collection.
fn declared_crs(collection: &geojson::FeatureCollection) -> Option<Crs> {
    let crs = collection.foreign_members.as_ref()?.get("crs")?;
    let name = crs.get("properties")?.get("name")?.as_str()?;
    Some(Crs::from_name(name))
}

fn geometry_is_empty(value: &geojson::Value) -> bool {
    match value {
        geojson::Value::Polygon(rings) => rings.is_empty() || rings.iter().all(Vec::is_empty),
        geojson::Value::MultiPolygon(polygons) => {
            polygons.is_empty()
                || polygons
                    .iter()
                    .all(|rings| rings.is_empty() || rings.iter().all(Vec::is_empty))
        }
        geojson::Value::Point(coords) => coords.is_empty(),
        geojson::Value::MultiPoint(coords) => coords.is_empty(),
        geojson::Value::LineString(coords) => coords.is_empty(),
        geojson::Value::MultiLineString(lines) => lines.is_empty(),
        geojson::Value::GeometryCollection(geometries) => geometries.is_empty(),
    }
}

fn type_name(value: &geojson::Value) -> String {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
    .to_string()
}

fn to_multi_polygon(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
        Geometry::MultiPolygon(mp) => Some(mp),
        _ => None,
    }
}

/// Zero-width buffer repair: a boolean self-union rebuilds ring topology,
/// splitting bow-tie rings into valid polygons.
fn repair(geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    geometry.union(geometry)
}

/// Whether any exterior or interior ring crosses itself.
///
/// Only proper crossings count; consecutive segments sharing an endpoint do
/// not. This is the cheap predicate used to decide whether the repair step
/// is needed at all.
pub fn ring_self_intersects(geometry: &MultiPolygon<f64>) -> bool {
    geometry.0.iter().any(|polygon| {
        std::iter::once(polygon.exterior())
            .chain(polygon.interiors().iter())
            .any(|ring| ring_crosses_itself(&ring.0))
    })
}

fn ring_crosses_itself(coords: &[Coord<f64>]) -> bool {
    // Closed ring: coords[0] == coords[n-1], giving n-1 segments.
    let n = coords.len();
    if n < 4 {
        return false;
    }
    let segments = n - 1;

    for i in 0..segments {
        for j in (i + 2)..segments {
            // First and last segment are adjacent through the closing vertex.
            if i == 0 && j == segments - 1 {
                continue;
            }
            if segments_cross(
                coords[i],
                coords[i + 1],
                coords[j],
                coords[j + 1],
            ) {
                return true;
            }
        }
    }
    false
}

/// Strict segment crossing test via orientation signs.
fn segments_cross(a1: Coord<f64>, a2: Coord<f64>, b1: Coord<f64>, b2: Coord<f64>) -> bool {
    let d1 = orientation(b1, b2, a1);
    let d2 = orientation(b1, b2, a2);
    let d3 = orientation(a1, a2, b1);
    let d4 = orientation(a1, a2, b2);

    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

fn orientation(p: Coord<f64>, q: Coord<f64>, r: Coord<f64>) -> f64 {
    (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn feature_collection(geometry: &str, crs: Option<&str>) -> String {
        let crs_member = crs
            .map(|name| {
                format!(
                    r#""crs": {{"type": "name", "properties": {{"name": "{name}"}}}},"#
                )
            })
            .unwrap_or_default();
        format!(
            r#"{{
              "type": "FeatureCollection",
              {crs_member}
              "features": [
                {{"type": "Feature", "geometry": {geometry}, "properties": {{}}}}
              ]
            }}"#
        )
    }

    const SQUARE: &str = r#"{"type": "Polygon", "coordinates": [[[-45.0, -19.0], [-44.9, -19.0], [-44.9, -18.9], [-45.0, -18.9], [-45.0, -19.0]]]}"#;
    const SIRGAS: &str = "urn:ogc:def:crs:EPSG::4674";

    #[test]
    fn valid_upload_passes() {
        let body = feature_collection(SQUARE, Some(SIRGAS));
        let watershed = GeometryValidator::default()
            .validate(body.as_bytes())
            .unwrap();
        assert!(watershed.area() > 0.0);
        assert_eq!(watershed.crs().epsg(), Some(4674));
    }

    #[test]
    fn oversized_file_rejected() {
        let body = feature_collection(SQUARE, Some(SIRGAS));
        let err = GeometryValidator::default()
            .with_max_bytes(16)
            .validate(body.as_bytes())
            .unwrap_err();
        assert!(matches!(err, Error::FileTooLarge { limit: 16, .. }));
    }

    #[test]
    fn two_features_rejected() {
        let body = format!(
            r#"{{
              "type": "FeatureCollection",
              "crs": {{"type": "name", "properties": {{"name": "{SIRGAS}"}}}},
              "features": [
                {{"type": "Feature", "geometry": {SQUARE}, "properties": {{}}}},
                {{"type": "Feature", "geometry": {SQUARE}, "properties": {{}}}}
              ]
            }}"#
        );
        let err = GeometryValidator::default()
            .validate(body.as_bytes())
            .unwrap_err();
        assert!(matches!(err, Error::FeatureCount(2)));
    }

    #[test]
    fn null_geometry_rejected() {
        let body = format!(
            r#"{{
              "type": "FeatureCollection",
              "crs": {{"type": "name", "properties": {{"name": "{SIRGAS}"}}}},
              "features": [{{"type": "Feature", "geometry": null, "properties": {{}}}}]
            }}"#
        );
        let err = GeometryValidator::default()
            .validate(body.as_bytes())
            .unwrap_err();
        assert!(matches!(err, Error::EmptyGeometry));
    }

    #[test]
    fn empty_polygon_rejected() {
        let body = feature_collection(
            r#"{"type": "Polygon", "coordinates": []}"#,
            Some(SIRGAS),
        );
        let err = GeometryValidator::default()
            .validate(body.as_bytes())
            .unwrap_err();
        assert!(matches!(err, Error::EmptyGeometry));
    }

    #[test]
    fn line_geometry_rejected() {
        let body = feature_collection(
            r#"{"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}"#,
            Some(SIRGAS),
        );
        let err = GeometryValidator::default()
            .validate(body.as_bytes())
            .unwrap_err();
        match err {
            Error::UnsupportedGeometryType(name) => assert_eq!(name, "LineString"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_crs_rejected() {
        let body = feature_collection(SQUARE, None);
        let err = GeometryValidator::default()
            .validate(body.as_bytes())
            .unwrap_err();
        assert!(matches!(err, Error::MissingCrs));
    }

    #[test]
    fn wrong_crs_rejected_not_coerced() {
        let body = feature_collection(SQUARE, Some("EPSG:4326"));
        let err = GeometryValidator::default()
            .validate(body.as_bytes())
            .unwrap_err();
        match err {
            Error::CrsMismatch { found, required } => {
                assert_eq!(found, "EPSG:4326");
                assert_eq!(required, "EPSG:4674");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bowtie_ring_detected_and_repaired() {
        // Exterior ring crossing itself at (1, 1).
        let bowtie = r#"{"type": "Polygon", "coordinates": [[[0.0, 0.0], [2.0, 2.0], [2.0, 0.0], [0.0, 2.0], [0.0, 0.0]]]}"#;
        let body = feature_collection(bowtie, Some(SIRGAS));
        let watershed = GeometryValidator::default()
            .validate(body.as_bytes())
            .unwrap();
        assert!(watershed.area() > 0.0);
        assert!(!ring_self_intersects(watershed.multi_polygon()));
    }

    #[test]
    fn clean_ring_not_flagged() {
        let body = feature_collection(SQUARE, Some(SIRGAS));
        let watershed = GeometryValidator::default()
            .validate(body.as_bytes())
            .unwrap();
        assert!(!ring_self_intersects(watershed.multi_polygon()));
    }

    #[test]
    fn export_name_rules() {
        assert!(ExportName::new("bacia_ribeirao-2024").is_ok());
        assert!(matches!(
            ExportName::new("bacia ribeirao"),
            Err(Error::InvalidExportName(_))
        ));
        assert!(matches!(
            ExportName::new(""),
            Err(Error::InvalidExportName(_))
        ));
        assert!(matches!(
            ExportName::new("bacia/ribeirao"),
            Err(Error::InvalidExportName(_))
        ));
    }
}
