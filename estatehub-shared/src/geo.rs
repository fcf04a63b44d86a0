/// Geometry types for listings and search areas
///
/// Points are stored in PostGIS as `geometry(Point, 4326)` and read back as
/// two float columns (`longitude`, `latitude`). Search areas arrive from the
/// geocoder as GeoJSON and are handed back to PostGIS as GeoJSON text, so the
/// only geometry logic living in Rust is shape validation.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// WGS 84, the SRID of every stored geometry
pub const SRID: i32 = 4326;

/// A WGS 84 coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Point {
    /// Degrees east, -180..=180
    pub longitude: f64,

    /// Degrees north, -90..=90
    pub latitude: f64,
}

impl Point {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// True when both components are finite and inside WGS 84 bounds
    pub fn is_valid(&self) -> bool {
        self.longitude.is_finite()
            && self.latitude.is_finite()
            && (-180.0..=180.0).contains(&self.longitude)
            && (-90.0..=90.0).contains(&self.latitude)
    }
}

/// Validator hook for request structs carrying a `Point`
pub fn validate_point(point: &Point) -> Result<(), validator::ValidationError> {
    if point.is_valid() {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("coordinates");
        err.message = Some("Coordinates must be a valid longitude/latitude pair".into());
        Err(err)
    }
}

/// Errors raised when a geocoder shape can't be used as a search area
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GeometryError {
    #[error("Polygon has no rings")]
    Empty,

    #[error("Polygon ring {0} has fewer than 4 positions")]
    RingTooShort(usize),

    #[error("Polygon ring {0} is not closed")]
    RingNotClosed(usize),

    #[error("Unsupported geometry type: {0}")]
    Unsupported(String),

    #[error("Malformed GeoJSON: {0}")]
    Malformed(String),
}

/// A GeoJSON polygon: an exterior ring followed by optional holes
///
/// Each position is `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon {
    rings: Vec<Vec<[f64; 2]>>,
}

impl Polygon {
    /// Builds a polygon, checking that every ring is closed and long enough
    pub fn new(rings: Vec<Vec<[f64; 2]>>) -> Result<Self, GeometryError> {
        if rings.is_empty() {
            return Err(GeometryError::Empty);
        }

        for (i, ring) in rings.iter().enumerate() {
            if ring.len() < 4 {
                return Err(GeometryError::RingTooShort(i));
            }
            if ring.first() != ring.last() {
                return Err(GeometryError::RingNotClosed(i));
            }
        }

        Ok(Self { rings })
    }

    /// Extracts a search polygon from a GeoJSON geometry object
    ///
    /// `Polygon` is used as-is. For `MultiPolygon` the first member is used,
    /// which for administrative areas is the main landmass. Anything else
    /// (points, lines) has no area to search.
    pub fn from_geojson(geometry: &serde_json::Value) -> Result<Self, GeometryError> {
        let kind = geometry
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| GeometryError::Malformed("missing type".to_string()))?;

        let coordinates = geometry
            .get("coordinates")
            .cloned()
            .ok_or_else(|| GeometryError::Malformed("missing coordinates".to_string()))?;

        let rings: Vec<Vec<[f64; 2]>> = match kind {
            "Polygon" => serde_json::from_value(coordinates)
                .map_err(|e| GeometryError::Malformed(e.to_string()))?,
            "MultiPolygon" => {
                let polygons: Vec<Vec<Vec<[f64; 2]>>> = serde_json::from_value(coordinates)
                    .map_err(|e| GeometryError::Malformed(e.to_string()))?;
                polygons.into_iter().next().ok_or(GeometryError::Empty)?
            }
            other => return Err(GeometryError::Unsupported(other.to_string())),
        };

        Self::new(rings)
    }

    /// The rings, exterior first
    pub fn rings(&self) -> &[Vec<[f64; 2]>] {
        &self.rings
    }

    /// GeoJSON text suitable for `ST_GeomFromGeoJSON`
    pub fn to_geojson(&self) -> String {
        json!({ "type": "Polygon", "coordinates": self.rings }).to_string()
    }
}
