//! Declarative raster expressions evaluated by the remote platform.
//!
//! The pipeline never materializes pixels locally: each derived product is
//! described as an operation tree which the platform compiles and executes
//! server-side. Operations that need the area of interest ([`FilterBounds`],
//! [`Clip`]) use the region that accompanies the enclosing request, so the
//! tree itself stays small and geometry-free.
//!
//! [`FilterBounds`]: ImageExpr::FilterBounds
//! [`Clip`]: ImageExpr::Clip

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One node of a remote raster expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ImageExpr {
    /// Load an image collection, keeping only `bands`.
    Collection { id: String, bands: Vec<String> },

    /// Load a single image asset.
    Image { id: String },

    /// Keep scenes acquired within `[start, end)`.
    FilterDate {
        source: Box<ImageExpr>,
        start: NaiveDate,
        end: NaiveDate,
    },

    /// Keep scenes whose cloudy-pixel fraction is below `max_percent`.
    FilterCloud {
        source: Box<ImageExpr>,
        max_percent: f64,
    },

    /// Keep scenes intersecting the request region.
    FilterBounds { source: Box<ImageExpr> },

    /// Per-pixel median across the collection.
    Median { source: Box<ImageExpr> },

    /// Flatten the collection into a single mosaic image.
    Mosaic { source: Box<ImageExpr> },

    /// `(a - b) / (a + b)` of two named bands, output renamed to `rename`.
    NormalizedDifference {
        source: Box<ImageExpr>,
        band_a: String,
        band_b: String,
        rename: String,
    },

    /// Subset to `bands`; when `rename` is non-empty it pairs with `bands`.
    Select {
        source: Box<ImageExpr>,
        bands: Vec<String>,
        rename: Vec<String>,
    },

    /// Clip to the request region.
    Clip { source: Box<ImageExpr> },

    /// Assign a default projection. Mosaics lack a well-defined one and must
    /// be given one before any reprojection.
    DefaultProjection { source: Box<ImageExpr>, epsg: u32 },

    /// Slope in degrees derived from an elevation image.
    Slope { source: Box<ImageExpr> },

    /// Convert slope degrees to percent rise: `tan(radians) * 100`.
    PercentRise { source: Box<ImageExpr> },

    /// Mask out pixels whose value is exactly zero.
    MaskNonZero { source: Box<ImageExpr> },

    /// Ordinal classes from ascending `breaks`: a value `v` maps to
    /// `1 + |{b in breaks : v > b}|`, so every break is inclusive on the
    /// lower class.
    Classify {
        source: Box<ImageExpr>,
        breaks: Vec<f64>,
    },

    /// Reproject to `epsg` at `scale_m` meters per pixel.
    Reproject {
        source: Box<ImageExpr>,
        epsg: u32,
        scale_m: f64,
    },
}

impl ImageExpr {
    pub fn collection(id: impl Into<String>, bands: &[&str]) -> Self {
        Self::Collection {
            id: id.into(),
            bands: bands.iter().map(|b| b.to_string()).collect(),
        }
    }

    pub fn image(id: impl Into<String>) -> Self {
        Self::Image { id: id.into() }
    }

    pub fn filter_date(self, start: NaiveDate, end: NaiveDate) -> Self {
        Self::FilterDate {
            source: Box::new(self),
            start,
            end,
        }
    }

    pub fn filter_cloud(self, max_percent: f64) -> Self {
        Self::FilterCloud {
            source: Box::new(self),
            max_percent,
        }
    }

    pub fn filter_bounds(self) -> Self {
        Self::FilterBounds {
            source: Box::new(self),
        }
    }

    pub fn median(self) -> Self {
        Self::Median {
            source: Box::new(self),
        }
    }

    pub fn mosaic(self) -> Self {
        Self::Mosaic {
            source: Box::new(self),
        }
    }

    pub fn normalized_difference(
        self,
        band_a: impl Into<String>,
        band_b: impl Into<String>,
        rename: impl Into<String>,
    ) -> Self {
        Self::NormalizedDifference {
            source: Box::new(self),
            band_a: band_a.into(),
            band_b: band_b.into(),
            rename: rename.into(),
        }
    }

    pub fn select(self, bands: &[&str], rename: &[&str]) -> Self {
        Self::Select {
            source: Box::new(self),
            bands: bands.iter().map(|b| b.to_string()).collect(),
            rename: rename.iter().map(|b| b.to_string()).collect(),
        }
    }

    pub fn clip(self) -> Self {
        Self::Clip {
            source: Box::new(self),
        }
    }

    pub fn default_projection(self, epsg: u32) -> Self {
        Self::DefaultProjection {
            source: Box::new(self),
            epsg,
        }
    }

    pub fn slope(self) -> Self {
        Self::Slope {
            source: Box::new(self),
        }
    }

    pub fn percent_rise(self) -> Self {
        Self::PercentRise {
            source: Box::new(self),
        }
    }

    pub fn mask_non_zero(self) -> Self {
        Self::MaskNonZero {
            source: Box::new(self),
        }
    }

    pub fn classify(self, breaks: &[f64]) -> Self {
        Self::Classify {
            source: Box::new(self),
            breaks: breaks.to_vec(),
        }
    }

    pub fn reproject(self, epsg: u32, scale_m: f64) -> Self {
        Self::Reproject {
            source: Box::new(self),
            epsg,
            scale_m,
        }
    }

    /// Innermost node of the tree (the data source).
    pub fn root_source(&self) -> &ImageExpr {
        match self {
            Self::Collection { .. } | Self::Image { .. } => self,
            Self::FilterDate { source, .. }
            | Self::FilterCloud { source, .. }
            | Self::FilterBounds { source }
            | Self::Median { source }
            | Self::Mosaic { source }
            | Self::NormalizedDifference { source, .. }
            | Self::Select { source, .. }
            | Self::Clip { source }
            | Self::DefaultProjection { source, .. }
            | Self::Slope { source }
            | Self::PercentRise { source }
            | Self::MaskNonZero { source }
            | Self::Classify { source, .. }
            | Self::Reproject { source, .. } => source.root_source(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn builder_nests_in_call_order() {
        let expr = ImageExpr::collection("COPERNICUS/S2_SR", &["B4", "B8"])
            .filter_bounds()
            .filter_date(date(2024, 1, 1), date(2025, 1, 1))
            .filter_cloud(10.0)
            .median()
            .clip()
            .normalized_difference("B8", "B4", "NDVI")
            .reproject(31983, 10.0);

        let ImageExpr::Reproject {
            source,
            epsg,
            scale_m,
        } = expr
        else {
            panic!("outermost op must be reproject");
        };
        assert_eq!(epsg, 31983);
        assert!((scale_m - 10.0).abs() < f64::EPSILON);

        let ImageExpr::NormalizedDifference {
            band_a,
            band_b,
            rename,
            ..
        } = *source
        else {
            panic!("expected normalized difference under reproject");
        };
        assert_eq!(band_a, "B8");
        assert_eq!(band_b, "B4");
        assert_eq!(rename, "NDVI");
    }

    #[test]
    fn root_source_walks_to_collection() {
        let expr = ImageExpr::collection("COPERNICUS/S2_SR", &["B4"])
            .median()
            .clip();
        let ImageExpr::Collection { id, .. } = expr.root_source() else {
            panic!("root must be the collection");
        };
        assert_eq!(id, "COPERNICUS/S2_SR");
    }

    #[test]
    fn serializes_with_op_tags() {
        let expr = ImageExpr::collection("COPERNICUS/DEM/GLO30", &["DEM"])
            .mosaic()
            .default_projection(4326);
        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(json["op"], "default_projection");
        assert_eq!(json["epsg"], 4326);
        assert_eq!(json["source"]["op"], "mosaic");
        assert_eq!(json["source"]["source"]["op"], "collection");
    }

    #[test]
    fn roundtrips_through_json() {
        let expr = ImageExpr::image("mapbiomas/collection8")
            .select(&["classification_2023"], &[])
            .clip()
            .reproject(31982, 30.0);
        let json = serde_json::to_string(&expr).unwrap();
        let back: ImageExpr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, expr);
    }
}
