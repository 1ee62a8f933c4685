//! Address geocoding.
//!
//! Resolves a listing's free-text location into coordinates with a single
//! lookup against a Nominatim-compatible search API. There is no retry and
//! no timeout beyond the HTTP client's defaults; every failure resolves to
//! `None` and is logged.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use tradepost_core::Coordinates;

/// Why a lookup produced no coordinates. Logged, never returned to callers.
#[derive(Debug, Error)]
enum GeocodingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid coordinate {value:?}: {source}")]
    Coordinate {
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },
}

/// Translates a free-text address into coordinates.
#[async_trait]
pub trait GeocodingClient: Send + Sync {
    /// Coordinates of the first match, or `None` when there is no match or
    /// the lookup fails for any reason.
    async fn resolve(&self, address: &str) -> Option<Coordinates>;
}

/// Nominatim search API client.
#[derive(Clone)]
pub struct NominatimClient {
    client: reqwest::Client,
    base_url: Url,
}

/// One search result; Nominatim encodes coordinates as strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

impl NominatimClient {
    /// Create a new geocoding client.
    ///
    /// `user_agent` identifies the application, as the public Nominatim
    /// usage policy requires.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(base_url: Url, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client, base_url })
    }

    fn search_url(&self, address: &str) -> Result<Url, GeocodingError> {
        let mut url = self.base_url.join("search")?;
        url.query_pairs_mut()
            .append_pair("q", address)
            .append_pair("format", "json");
        Ok(url)
    }

    async fn lookup(&self, address: &str) -> Result<Option<Coordinates>, GeocodingError> {
        let response = self.client.get(self.search_url(address)?).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GeocodingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let places: Vec<Place> = response.json().await?;
        places.into_iter().next().map(to_coordinates).transpose()
    }
}

fn to_coordinates(place: Place) -> Result<Coordinates, GeocodingError> {
    Ok(Coordinates::new(parse_degrees(&place.lat)?, parse_degrees(&place.lon)?))
}

fn parse_degrees(value: &str) -> Result<f64, GeocodingError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|source| GeocodingError::Coordinate {
            value: value.to_owned(),
            source,
        })
}

#[async_trait]
impl GeocodingClient for NominatimClient {
    #[instrument(skip(self))]
    async fn resolve(&self, address: &str) -> Option<Coordinates> {
        match self.lookup(address).await {
            Ok(Some(coordinates)) => Some(coordinates),
            Ok(None) => {
                tracing::warn!("Address not found");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Error geocoding address");
                None
            }
        }
    }
}
