//! Vector features for reference catalogs (projection zones, administrative
//! units).

use crate::error::{Error, Result};
use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// String view, for string-typed attributes only.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Self::String(s.clone()),
            other => Self::String(other.to_string()),
        }
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Option<Geometry<f64>>,
    /// Feature attributes
    pub properties: HashMap<String, AttributeValue>,
    /// Optional feature ID
    pub id: Option<String>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: HashMap::new(),
            id: None,
        }
    }

    /// Create a feature with no geometry
    pub fn empty() -> Self {
        Self {
            geometry: None,
            properties: HashMap::new(),
            id: None,
        }
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// String attribute, accepting integer-typed ids as well.
    pub fn property_string(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            AttributeValue::String(s) => Some(s.clone()),
            AttributeValue::Int(i) => Some(i.to_string()),
            _ => None,
        }
    }

    pub fn property_u32(&self, key: &str) -> Option<u32> {
        match self.properties.get(key)? {
            AttributeValue::Int(i) => u32::try_from(*i).ok(),
            AttributeValue::Float(v) if v.fract() == 0.0 && *v >= 0.0 => Some(*v as u32),
            AttributeValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Collection of features
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self {
            features: Vec::new(),
        }
    }

    /// Parse a GeoJSON FeatureCollection document.
    ///
    /// Properties are converted to typed [`AttributeValue`]s; geometries that
    /// cannot be represented as `geo` types are rejected.
    pub fn from_geojson_str(text: &str) -> Result<Self> {
        let parsed: geojson::GeoJson = text
            .parse()
            .map_err(|e: geojson::Error| Error::InvalidGeoJson(e.to_string()))?;

        let collection = match parsed {
            geojson::GeoJson::FeatureCollection(fc) => fc,
            _ => {
                return Err(Error::InvalidGeoJson(
                    "expected a FeatureCollection".to_string(),
                ))
            }
        };

        let mut features = Vec::with_capacity(collection.features.len());
        for feature in collection.features {
            let geometry = match feature.geometry {
                Some(ref g) => Some(
                    Geometry::<f64>::try_from(g)
                        .map_err(|e| Error::InvalidGeoJson(e.to_string()))?,
                ),
                None => None,
            };

            let id = feature.id.as_ref().map(|id| match id {
                geojson::feature::Id::String(s) => s.clone(),
                geojson::feature::Id::Number(n) => n.to_string(),
            });

            let mut properties = HashMap::new();
            if let Some(map) = feature.properties {
                for (key, value) in &map {
                    properties.insert(key.clone(), AttributeValue::from_json(value));
                }
            }

            features.push(Feature {
                geometry,
                properties,
                id,
            });
        }

        Ok(Self { features })
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        {
          "type": "Feature",
          "id": 42,
          "geometry": {
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
          },
          "properties": {
            "cd_mun": "3106200",
            "nm_mun": "Belo Horizonte",
            "epsg": 31983,
            "ratio": 0.25,
            "active": true
          }
        }
      ]
    }"#;

    #[test]
    fn parse_feature_collection() {
        let fc = FeatureCollection::from_geojson_str(FIXTURE).unwrap();
        assert_eq!(fc.len(), 1);

        let feature = &fc.features[0];
        assert_eq!(feature.id.as_deref(), Some("42"));
        assert!(matches!(feature.geometry, Some(Geometry::Polygon(_))));
        assert_eq!(
            feature.property_string("cd_mun").as_deref(),
            Some("3106200")
        );
        assert_eq!(feature.property_u32("epsg"), Some(31983));
        assert_eq!(
            feature.get_property("ratio").and_then(AttributeValue::as_f64),
            Some(0.25)
        );
        assert_eq!(
            feature.get_property("active"),
            Some(&AttributeValue::Bool(true))
        );
    }

    #[test]
    fn rejects_bare_geometry_document() {
        let err = FeatureCollection::from_geojson_str(
            r#"{"type": "Point", "coordinates": [0.0, 0.0]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidGeoJson(_)));
    }

    #[test]
    fn integer_id_attribute_reads_as_string() {
        let fc = FeatureCollection::from_geojson_str(FIXTURE).unwrap();
        assert_eq!(
            fc.features[0].property_string("epsg").as_deref(),
            Some("31983")
        );
    }
}
