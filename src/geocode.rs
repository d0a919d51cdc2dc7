use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::report::Coordinates;
use crate::TARGET_ALERTS;

/// Resolves coordinates to a human-readable location label. Callers treat
/// this as best-effort: on failure they fall back to [`fallback_label`]
/// instead of aborting.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn label_for(&self, coordinates: Coordinates) -> Result<String>;
}

/// "lat, lon" formatted to 4 decimal places, used whenever reverse geocoding
/// is unavailable.
pub fn fallback_label(coordinates: Coordinates) -> String {
    format!(
        "{:.4}, {:.4}",
        coordinates.latitude, coordinates.longitude
    )
}

/// Nominatim-style reverse geocoding endpoint.
pub struct HttpGeocoder {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
}

impl HttpGeocoder {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn label_for(&self, coordinates: Coordinates) -> Result<String> {
        let mut url = self.base_url.join("reverse")?;
        url.query_pairs_mut()
            .append_pair("lat", &coordinates.latitude.to_string())
            .append_pair("lon", &coordinates.longitude.to_string())
            .append_pair("format", "json");

        let response: ReverseResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let label = response
            .display_name
            .ok_or_else(|| anyhow!("reverse geocoder returned no display name"))?;

        debug!(target: TARGET_ALERTS,
            "Resolved ({}, {}) to {}",
            coordinates.latitude, coordinates.longitude, label
        );
        Ok(label)
    }
}
