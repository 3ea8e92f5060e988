use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::geo::Coordinate;

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
const USER_AGENT: &str = "RapidResponse Emergency App";

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("geocoder returned an unreadable coordinate: {0}")]
    BadCoordinate(String),
}

/// Address → coordinate lookup. `Ok(None)` means "no match", not a failure.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinate>, GeocodeError>;
}

pub struct DisabledGeocoder;

#[async_trait]
impl Geocoder for DisabledGeocoder {
    async fn geocode(&self, _address: &str) -> Result<Option<Coordinate>, GeocodeError> {
        Ok(None)
    }
}

#[derive(Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    country_codes: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: String, country_codes: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            country_codes,
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinate>, GeocodeError> {
        let address = address.trim();
        if address.is_empty() {
            warn!("geocoding skipped: empty address");
            return Ok(None);
        }

        let mut url = format!(
            "{}?q={}&format=json&limit=1",
            self.base_url,
            urlencoding::encode(address)
        );
        if !self.country_codes.is_empty() {
            url.push_str(&format!(
                "&countrycodes={}",
                urlencoding::encode(&self.country_codes)
            ));
        }

        let places: Vec<NominatimPlace> = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(place) = places.into_iter().next() else {
            return Ok(None);
        };

        let lat = place
            .lat
            .parse::<f64>()
            .map_err(|_| GeocodeError::BadCoordinate(place.lat.clone()))?;
        let lng = place
            .lon
            .parse::<f64>()
            .map_err(|_| GeocodeError::BadCoordinate(place.lon.clone()))?;

        Ok(Some(Coordinate::new(lat, lng)))
    }
}
