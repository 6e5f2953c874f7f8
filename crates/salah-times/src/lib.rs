//! Prayer times widget engine
//!
//! Shared settings, location resolution with rate-limited reverse geocoding,
//! astronomical prayer computation and the timeline that feeds the widget.

pub mod astronomy;
pub mod cache;
pub mod calculator;
pub mod geocode;
pub mod location;
pub mod presentation;
pub mod provider;
pub mod settings;
pub mod types;

pub use cache::{GeocodeCache, UNKNOWN_LOCATION};
pub use calculator::{compute, prayer_times_for};
pub use geocode::{GeocodeError, Geocoder, NominatimGeocoder};
pub use location::{
    update_location, AuthorizationStatus, LocationResolver, LocationService,
    ManualLocationService,
};
pub use presentation::{countdown, format_prayer_time, format_remaining, Countdown};
pub use provider::{ReloadPolicy, ReloadRule, Timeline, TimelineProvider, TimelineSchedule};
pub use settings::SettingsStore;
pub use types::*;
