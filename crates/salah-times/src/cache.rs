//! Place-name cache in front of reverse geocoding.
//!
//! Lookups are served from an exact-match map; misses go to the network at
//! most once per rate-limit window, across all coordinates. The map is never
//! evicted, so it grows with the number of distinct coordinates seen.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::geocode::{GeocodeError, Geocoder};
use crate::types::Coordinates;

pub const UNKNOWN_LOCATION: &str = "Unknown Location";
pub const DEFAULT_RATE_LIMIT: Duration = Duration::from_secs(60);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Default)]
struct CacheState {
    names: HashMap<Coordinates, String>,
    last_request: Option<Instant>,
    last_known: Option<String>,
}

impl CacheState {
    fn fallback(&self) -> String {
        self.last_known
            .clone()
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string())
    }
}

/// Rate-limited reverse-geocoding cache.
///
/// The state lock is held across the network call, so one cache never has
/// more than one lookup in flight.
pub struct GeocodeCache<G: ?Sized> {
    geocoder: Arc<G>,
    rate_limit: Duration,
    call_timeout: Duration,
    state: Mutex<CacheState>,
}

impl<G: Geocoder + ?Sized> GeocodeCache<G> {
    pub fn new(geocoder: Arc<G>) -> Self {
        Self::with_limits(geocoder, DEFAULT_RATE_LIMIT, DEFAULT_CALL_TIMEOUT)
    }

    pub fn with_limits(geocoder: Arc<G>, rate_limit: Duration, call_timeout: Duration) -> Self {
        Self {
            geocoder,
            rate_limit,
            call_timeout,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Place name for `coordinates`; never fails.
    pub async fn name_for(&self, coordinates: Coordinates) -> String {
        let mut state = self.state.lock().await;

        if let Some(name) = state.names.get(&coordinates) {
            return name.clone();
        }

        let now = Instant::now();
        if let Some(last) = state.last_request {
            if now.duration_since(last) < self.rate_limit {
                tracing::debug!(
                    "Reverse geocoding for {} rate limited; using last known name",
                    coordinates
                );
                return state.fallback();
            }
        }

        state.last_request = Some(now);
        let result = match tokio::time::timeout(
            self.call_timeout,
            self.geocoder.reverse(coordinates),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GeocodeError::Timeout),
        };

        match result {
            Ok(name) => {
                state.names.insert(coordinates, name.clone());
                state.last_known = Some(name.clone());
                name
            }
            Err(e) => {
                tracing::warn!("Reverse geocoding {} failed: {}", coordinates, e);
                state.fallback()
            }
        }
    }

    /// Number of cached coordinate pairs
    pub async fn len(&self) -> usize {
        self.state.lock().await.names.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.names.is_empty()
    }
}
