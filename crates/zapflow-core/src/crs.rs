//! Coordinate Reference System handling

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation.
///
/// Sources identify a CRS either by a bare `EPSG:<code>` string or by an OGC
/// URN such as `urn:ogc:def:crs:EPSG::4674`; both resolve to the same [`Crs`].
/// Non-EPSG authorities are kept by name only and compare by exact name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crs {
    /// EPSG code if known
    epsg: Option<u32>,
    /// Authority name as declared by the source
    name: Option<String>,
}

impl Crs {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            name: None,
        }
    }

    /// Create a CRS from a declared authority name, recognizing EPSG codes
    /// embedded in `EPSG:` and `urn:ogc:def:crs:EPSG` forms.
    pub fn from_name(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            epsg: parse_epsg_name(&name),
            name: Some(name),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// SIRGAS 2000 geographic CRS (EPSG:4674), the reference system required
    /// for uploaded watershed boundaries.
    pub fn sirgas2000() -> Self {
        Self::from_epsg(4674)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &Crs) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.name, &other.name) {
            return a == b;
        }

        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(name) = &self.name {
            return name.clone();
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

/// Pull an EPSG code out of a declared CRS name, if the name carries one.
fn parse_epsg_name(name: &str) -> Option<u32> {
    let upper = name.to_ascii_uppercase();
    if !upper.contains("EPSG") {
        return None;
    }
    upper
        .rsplit(':')
        .find(|part| !part.is_empty())
        .and_then(|part| part.parse().ok())
}
