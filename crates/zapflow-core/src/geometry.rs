//! Watershed geometry and bounding-box primitives.

use crate::crs::Crs;
use geo::{Area, BoundingRect};
use geo_types::{LineString, MultiPolygon, Polygon};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Bounding box of a multipolygon, `None` when it has no coordinates.
    pub fn from_multi_polygon(geometry: &MultiPolygon<f64>) -> Option<Self> {
        geometry.bounding_rect().map(|rect| Self {
            min_x: rect.min().x,
            min_y: rect.min().y,
            max_x: rect.max().x,
            max_y: rect.max().y,
        })
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Grow the box by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (self.min_x, self.min_y),
                (self.max_x, self.min_y),
                (self.max_x, self.max_y),
                (self.min_x, self.max_y),
                (self.min_x, self.min_y),
            ]),
            vec![],
        )
    }
}

/// A validated watershed boundary.
///
/// Normally produced by [`crate::validate::GeometryValidator`]; immutable for
/// the lifetime of a pipeline run. The total area and bounding box are
/// computed once at construction.
#[derive(Debug, Clone)]
pub struct WatershedGeometry {
    geometry: MultiPolygon<f64>,
    crs: Crs,
    area: f64,
    bbox: BoundingBox,
}

impl WatershedGeometry {
    /// Wrap a non-empty multipolygon. Returns `None` when the geometry has no
    /// coordinates at all.
    pub fn new(geometry: MultiPolygon<f64>, crs: Crs) -> Option<Self> {
        let bbox = BoundingBox::from_multi_polygon(&geometry)?;
        let area = geometry.unsigned_area();
        Some(Self {
            geometry,
            crs,
            area,
            bbox,
        })
    }

    pub fn multi_polygon(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Total area in CRS units squared.
    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    /// GeoJSON view of the boundary, used as the region of remote requests.
    pub fn to_geojson(&self) -> geojson::Geometry {
        geojson::Geometry::new(geojson::Value::from(&self.geometry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![Polygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (size, 0.0),
                (size, size),
                (0.0, size),
                (0.0, 0.0),
            ]),
            vec![],
        )])
    }

    #[test]
    fn test_bbox_expand() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0).expand(1.0);
        assert_eq!(bbox.min_x, -1.0);
        assert_eq!(bbox.max_y, 11.0);
        assert_eq!(bbox.width(), 12.0);
    }

    #[test]
    fn test_bbox_intersects() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(9.0, 9.0, 20.0, 20.0);
        let c = BoundingBox::new(11.0, 0.0, 20.0, 10.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_watershed_area_and_bbox() {
        let watershed = WatershedGeometry::new(square(10.0), Crs::sirgas2000()).unwrap();
        assert!((watershed.area() - 100.0).abs() < 1e-10);
        assert_eq!(watershed.bounding_box(), BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(watershed.crs().epsg(), Some(4674));
    }

    #[test]
    fn test_empty_multipolygon_rejected() {
        let empty = MultiPolygon::<f64>::new(vec![]);
        assert!(WatershedGeometry::new(empty, Crs::sirgas2000()).is_none());
    }

    #[test]
    fn test_geojson_roundtrip_type() {
        let watershed = WatershedGeometry::new(square(1.0), Crs::sirgas2000()).unwrap();
        let geojson = watershed.to_geojson();
        assert!(matches!(geojson.value, geojson::Value::MultiPolygon(_)));
    }
}
