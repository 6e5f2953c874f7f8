//! Coordinate resolution for the timeline and the host app's location fix.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use salah_core::{AppError, LocationError};

use crate::geocode::{GeocodeError, Geocoder};
use crate::settings::SettingsStore;
use crate::types::{Coordinates, LocationSetting};

/// Upper bound on a single forward-geocoding attempt
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Permission state of the location service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    NotDetermined,
    Granted,
    Denied,
}

/// Source of one-shot device location fixes
#[async_trait]
pub trait LocationService: Send + Sync {
    async fn authorization(&self) -> AuthorizationStatus;

    async fn request_location(&self) -> Result<Coordinates, LocationError>;
}

/// Location service fed by coordinates typed in by the user.
///
/// With no coordinates the service has never been authorized.
#[derive(Debug, Clone, Default)]
pub struct ManualLocationService {
    coordinates: Option<Coordinates>,
    denied: bool,
}

impl ManualLocationService {
    pub fn new(coordinates: Option<Coordinates>) -> Self {
        Self {
            coordinates,
            denied: false,
        }
    }

    /// A service whose authorization was refused
    pub fn denied() -> Self {
        Self {
            coordinates: None,
            denied: true,
        }
    }
}

#[async_trait]
impl LocationService for ManualLocationService {
    async fn authorization(&self) -> AuthorizationStatus {
        if self.denied {
            AuthorizationStatus::Denied
        } else if self.coordinates.is_some() {
            AuthorizationStatus::Granted
        } else {
            AuthorizationStatus::NotDetermined
        }
    }

    async fn request_location(&self) -> Result<Coordinates, LocationError> {
        match self.authorization().await {
            AuthorizationStatus::Denied => Err(LocationError::PermissionDenied),
            AuthorizationStatus::NotDetermined => Err(LocationError::NotDetermined),
            AuthorizationStatus::Granted => self
                .coordinates
                .filter(Coordinates::is_valid)
                .ok_or(LocationError::ServiceUnavailable),
        }
    }
}

/// Request a fix from `service` and persist it as the last known location.
pub async fn update_location<S>(service: &S, store: &SettingsStore) -> Result<Coordinates, AppError>
where
    S: LocationService + ?Sized,
{
    let coordinates = service.request_location().await?;
    store.save_coordinates(coordinates)?;
    tracing::info!("Saved location {}", coordinates);
    Ok(coordinates)
}

/// Turns the location setting into coordinates for prayer computation
pub struct LocationResolver<G: ?Sized> {
    store: Arc<SettingsStore>,
    geocoder: Arc<G>,
    fallback: Coordinates,
    timeout: Duration,
}

impl<G: Geocoder + ?Sized> LocationResolver<G> {
    pub fn new(store: Arc<SettingsStore>, geocoder: Arc<G>, fallback: Coordinates) -> Self {
        Self {
            store,
            geocoder,
            fallback,
            timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `Auto` uses the saved fix or the fallback; a place name is
    /// forward-geocoded once. Returns `None` when the place cannot be found.
    pub async fn resolve(&self, setting: &LocationSetting) -> Option<Coordinates> {
        match setting {
            LocationSetting::Auto => Some(self.store.saved_coordinates().unwrap_or_else(|| {
                tracing::debug!("No saved location, using fallback {}", self.fallback);
                self.fallback
            })),
            LocationSetting::Named(place) => {
                let result = tokio::time::timeout(self.timeout, self.geocoder.forward(place))
                    .await
                    .unwrap_or(Err(GeocodeError::Timeout));

                match result {
                    Ok(coordinates) => Some(coordinates),
                    Err(e) => {
                        tracing::warn!("Could not resolve location {:?}: {}", place, e);
                        None
                    }
                }
            }
        }
    }
}
