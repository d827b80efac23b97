//! Location retrieval and proximity validation.
//!
//! The platform sensor sits behind [`LocationProvider`]. The service above it
//! normalizes every provider failure into two error kinds the caller can act
//! on: permission denied, or location unavailable.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::Location;

/// Mean Earth radius used by the haversine formula, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Outcome of a foreground location permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    /// The user allowed location access.
    Granted,
    /// The user refused location access.
    Denied,
    /// The user has not answered yet.
    Undetermined,
}

impl PermissionStatus {
    /// Whether location may be read.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Requested fix quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationAccuracy {
    /// Network or cell level.
    Low,
    /// Roughly block level.
    #[default]
    Balanced,
    /// GPS level.
    High,
}

/// A raw fix reported by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Horizontal accuracy radius in meters, if reported.
    pub accuracy: Option<f64>,
    /// Altitude in meters, if reported.
    pub altitude: Option<f64>,
    /// When the fix was taken.
    pub timestamp: DateTime<Utc>,
}

impl Position {
    /// The fix as a plain location.
    #[must_use]
    pub fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude)
    }
}

/// Failures reported by a location provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Location services are switched off or absent.
    #[error("location services unavailable: {0}")]
    ServicesDisabled(String),

    /// The sensor did not produce a fix in time.
    #[error("timed out waiting for a position fix")]
    Timeout,

    /// Any other sensor failure.
    #[error("sensor error: {0}")]
    Sensor(String),
}

/// A platform location source.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &'static str;

    /// Ask the user for foreground location access.
    async fn request_foreground_permission(
        &self,
    ) -> std::result::Result<PermissionStatus, ProviderError>;

    /// Read the current position.
    async fn current_position(
        &self,
        accuracy: LocationAccuracy,
    ) -> std::result::Result<Position, ProviderError>;
}

/// A provider that reports a fixed position.
///
/// Used on hosts without a sensor and in tests.
#[derive(Debug, Clone)]
pub struct StaticLocationProvider {
    location: Option<Location>,
    permission: PermissionStatus,
}

impl StaticLocationProvider {
    /// A provider that always grants permission and reports `location`.
    #[must_use]
    pub fn new(location: Location) -> Self {
        Self {
            location: Some(location),
            permission: PermissionStatus::Granted,
        }
    }

    /// A provider that grants permission but never gets a fix.
    #[must_use]
    pub fn without_fix() -> Self {
        Self {
            location: None,
            permission: PermissionStatus::Granted,
        }
    }

    /// Override the permission answer.
    #[must_use]
    pub fn with_permission(mut self, permission: PermissionStatus) -> Self {
        self.permission = permission;
        self
    }
}

#[async_trait]
impl LocationProvider for StaticLocationProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn request_foreground_permission(
        &self,
    ) -> std::result::Result<PermissionStatus, ProviderError> {
        Ok(self.permission)
    }

    async fn current_position(
        &self,
        accuracy: LocationAccuracy,
    ) -> std::result::Result<Position, ProviderError> {
        let location = self
            .location
            .ok_or_else(|| ProviderError::ServicesDisabled("no position configured".to_string()))?;
        Ok(Position {
            latitude: location.lat,
            longitude: location.lng,
            accuracy: Some(match accuracy {
                LocationAccuracy::Low => 3_000.0,
                LocationAccuracy::Balanced => 100.0,
                LocationAccuracy::High => 10.0,
            }),
            altitude: None,
            timestamp: Utc::now(),
        })
    }
}

/// Result of comparing a position against a target location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProximityCheck {
    /// Great-circle distance in meters.
    pub distance_meters: f64,
    /// Admission radius in meters.
    pub radius_meters: f64,
    /// Whether the distance is within the radius.
    pub within_radius: bool,
}

/// Great-circle distance between two points in meters (haversine).
#[must_use]
pub fn calculate_distance(a: Location, b: Location) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let delta_phi = (b.lat - a.lat).to_radians();
    let delta_lambda = (b.lng - a.lng).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Decide whether `current` is close enough to `target` to admit a check-in.
#[must_use]
pub fn check_proximity(current: Location, target: Location, radius_meters: f64) -> ProximityCheck {
    let distance_meters = calculate_distance(current, target);
    ProximityCheck {
        distance_meters,
        radius_meters,
        within_radius: distance_meters <= radius_meters,
    }
}

/// Location access for check-in flows.
#[derive(Clone)]
pub struct GeolocationService {
    provider: Arc<dyn LocationProvider>,
}

impl std::fmt::Debug for GeolocationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeolocationService")
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl GeolocationService {
    /// Create a service over `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn LocationProvider>) -> Self {
        Self { provider }
    }

    /// Get the device's current location with a high-accuracy fix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] if the user refuses access and
    /// [`Error::LocationUnavailable`] for every other failure.
    pub async fn get_current_location(&self) -> Result<Location> {
        let status = self
            .provider
            .request_foreground_permission()
            .await
            .map_err(|err| {
                warn!(provider = self.provider.name(), error = %err, "Permission request failed");
                Error::LocationUnavailable
            })?;

        if !status.is_granted() {
            debug!(?status, "Location permission not granted");
            return Err(Error::PermissionDenied);
        }

        let position = self
            .provider
            .current_position(LocationAccuracy::High)
            .await
            .map_err(|err| {
                warn!(provider = self.provider.name(), error = %err, "Position fix failed");
                Error::LocationUnavailable
            })?;

        let location = position.location();
        if !location.is_valid() {
            warn!(provider = self.provider.name(), %location, "Provider reported out-of-range fix");
            return Err(Error::LocationUnavailable);
        }

        debug!(%location, accuracy = ?position.accuracy, "Got current location");
        Ok(location)
    }

    /// Haversine distance in meters.
    #[must_use]
    pub fn calculate_distance(&self, a: Location, b: Location) -> f64 {
        calculate_distance(a, b)
    }

    /// Read the current location and check it against `target`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get_current_location`].
    pub async fn check_proximity_to(
        &self,
        target: Location,
        radius_meters: f64,
    ) -> Result<(Location, ProximityCheck)> {
        let current = self.get_current_location().await?;
        Ok((current, check_proximity(current, target, radius_meters)))
    }
}
