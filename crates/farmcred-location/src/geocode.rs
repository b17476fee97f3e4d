use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use farmcred_types::Coordinates;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("geocoding API error ({status})")]
    Api { status: u16 },
}

/// Turns coordinates into a place name.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// `Ok(None)` when the service knows no locality for the point.
    async fn city(&self, at: Coordinates) -> Result<Option<String>, GeocodeError>;
}

#[derive(serde::Deserialize)]
struct ReverseGeocodeResponse {
    #[serde(default)]
    city: Option<String>,
}

/// `GET {base_url}/reverse-geocode?lat=..&lng=..` returning `{"city": ...}`.
pub struct HttpReverseGeocoder {
    http: reqwest::Client,
    base_url: String,
}

impl HttpReverseGeocoder {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GeocodeError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("farmcred/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ReverseGeocoder for HttpReverseGeocoder {
    async fn city(&self, at: Coordinates) -> Result<Option<String>, GeocodeError> {
        let url = format!(
            "{}/reverse-geocode?lat={}&lng={}",
            self.base_url, at.latitude, at.longitude
        );
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(GeocodeError::Api {
                status: resp.status().as_u16(),
            });
        }
        let body: ReverseGeocodeResponse = resp.json().await?;
        Ok(body.city.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()))
    }
}
