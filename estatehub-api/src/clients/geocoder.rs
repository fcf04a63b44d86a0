/// Address to search-area lookup
///
/// [`NominatimGeocoder`] asks Nominatim for the single best match with its
/// outline (`polygon_geojson=1`). Only areas are useful for search: a match
/// whose outline is a point or a line is treated as "not found".
///
/// # Example
///
/// ```no_run
/// use estatehub_api::clients::geocoder::{Geocoder, NominatimGeocoder};
/// use estatehub_api::config::GeocoderConfig;
///
/// # async fn example(config: GeocoderConfig) -> Result<(), Box<dyn std::error::Error>> {
/// let geocoder = NominatimGeocoder::new(&config)?;
/// let polygon = geocoder.polygon_for("Camden, London").await?;
/// println!("{} ring(s)", polygon.rings().len());
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use estatehub_shared::geo::{GeometryError, Polygon};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::GeocoderConfig;

#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("Geocoder request failed: {0}")]
    Request(String),

    #[error("Geocoder returned status {0}")]
    Status(u16),

    #[error("Geocoder response could not be decoded: {0}")]
    Decode(String),

    #[error("No results for address")]
    NoResults,

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Resolves a free-text address to a polygon
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn polygon_for(&self, address: &str) -> Result<Polygon, GeocodeError>;
}

/// One Nominatim search result; only the outline is used
#[derive(Debug, Deserialize)]
struct Place {
    #[serde(default)]
    geojson: Option<serde_json::Value>,
}

/// Picks the search polygon out of a search response
fn polygon_from_places(places: Vec<Place>) -> Result<Polygon, GeocodeError> {
    let geometry = places
        .into_iter()
        .next()
        .and_then(|place| place.geojson)
        .ok_or(GeocodeError::NoResults)?;

    Ok(Polygon::from_geojson(&geometry)?)
}

pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    country: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| GeocodeError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            country: config.country.clone(),
        })
    }

    fn query<'a>(&'a self, address: &'a str) -> Vec<(&'static str, &'a str)> {
        let mut query = vec![
            ("q", address),
            ("format", "json"),
            ("polygon_geojson", "1"),
            ("limit", "1"),
        ];
        if let Some(country) = &self.country {
            query.push(("countrycodes", country.as_str()));
        }
        query
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn polygon_for(&self, address: &str) -> Result<Polygon, GeocodeError> {
        tracing::debug!(address = %address, "Geocoding address");

        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&self.query(address))
            .send()
            .await
            .map_err(|e| GeocodeError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status().as_u16()));
        }

        let places: Vec<Place> = response
            .json()
            .await
            .map_err(|e| GeocodeError::Decode(e.to_string()))?;

        polygon_from_places(places)
    }
}
