use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use farmcred_types::{Coordinates, FarmLocation};

use crate::geocode::ReverseGeocoder;

/// Why a position fix could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationError {
    #[error("Location access denied. Please enable location services.")]
    PermissionDenied,
    #[error("Location information is unavailable.")]
    Unavailable,
    #[error("Location request timed out. Please try again.")]
    Timeout,
}

/// A raw fix from a positioning device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// Radius of uncertainty in metres, when the device reports one.
    #[serde(default)]
    pub accuracy: Option<f64>,
}

impl Position {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// A position fix plus the address it resolved to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub address: String,
}

impl From<CapturedLocation> for FarmLocation {
    fn from(captured: CapturedLocation) -> Self {
        FarmLocation::new(captured.latitude, captured.longitude, captured.address)
    }
}

/// Anything that can produce the device's current position.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn current_position(&self) -> Result<Position, LocationError>;
}

/// A position supplied up front, e.g. by a client that already ran the
/// device geolocation call.
pub struct FixedPosition(pub Position);

#[async_trait]
impl PositionSource for FixedPosition {
    async fn current_position(&self) -> Result<Position, LocationError> {
        Ok(self.0)
    }
}

/// Combines a position source with reverse geocoding.
pub struct LocationCapture {
    geocoder: Arc<dyn ReverseGeocoder>,
    timeout: Duration,
}

impl LocationCapture {
    pub fn new(geocoder: Arc<dyn ReverseGeocoder>, timeout: Duration) -> Self {
        Self { geocoder, timeout }
    }

    /// Take a fix from `source` and resolve its address.
    pub async fn capture(
        &self,
        source: &dyn PositionSource,
    ) -> Result<CapturedLocation, LocationError> {
        let position = tokio::time::timeout(self.timeout, source.current_position())
            .await
            .map_err(|_| LocationError::Timeout)??;
        if !position.coordinates().is_valid() {
            return Err(LocationError::Unavailable);
        }
        Ok(self.resolve(position).await)
    }

    /// Attach an address to a known-good fix. Geocoding failures fall back to
    /// the formatted coordinates.
    pub async fn resolve(&self, position: Position) -> CapturedLocation {
        let coordinates = position.coordinates();
        let address = match self.geocoder.city(coordinates).await {
            Ok(Some(city)) => city,
            Ok(None) => coordinates.display_fallback(),
            Err(e) => {
                tracing::warn!(%e, "reverse geocoding failed, using coordinates");
                coordinates.display_fallback()
            }
        };
        CapturedLocation {
            latitude: position.latitude,
            longitude: position.longitude,
            accuracy: position.accuracy,
            address,
        }
    }
}
