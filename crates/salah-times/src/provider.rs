//! Timeline provider: bounded runs of future entries plus a reload policy.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use salah_core::{Config, ReloadPolicyKind, TimelineConfig};

use crate::cache::GeocodeCache;
use crate::calculator::prayer_times_for;
use crate::geocode::Geocoder;
use crate::location::LocationResolver;
use crate::settings::SettingsStore;
use crate::types::{mark_next_prayer, Coordinates, Entry, Prayer, PrayerTime, Settings};

pub const LOCATION_UNAVAILABLE: &str = "Location unavailable";
pub const PRAYER_TIMES_UNAVAILABLE: &str = "Prayer times unavailable";
pub const PLACEHOLDER_LOCATION: &str = "Loading...";
pub const SNAPSHOT_LOCATION: &str = "Sample City";

/// When the host should ask for the next timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadPolicy {
    After(DateTime<Utc>),
    AtEnd,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub entries: Vec<Entry>,
    pub policy: ReloadPolicy,
}

impl Timeline {
    /// Entry to display at `now`: the latest one not after it
    pub fn entry_at(&self, now: DateTime<Utc>) -> Option<&Entry> {
        self.entries
            .iter()
            .take_while(|e| e.date <= now)
            .last()
            .or_else(|| self.entries.first())
    }

    /// Instant after which this timeline should be regenerated
    pub fn reload_at(&self) -> Option<DateTime<Utc>> {
        match self.policy {
            ReloadPolicy::After(at) => Some(at),
            ReloadPolicy::AtEnd => self.entries.last().map(|e| e.date),
        }
    }
}

/// Spacing and span of the entries in one timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineSchedule {
    pub step: Duration,
    pub window: Duration,
}

impl Default for TimelineSchedule {
    fn default() -> Self {
        Self {
            step: Duration::minutes(5),
            window: Duration::minutes(30),
        }
    }
}

impl TimelineSchedule {
    pub fn hourly() -> Self {
        Self {
            step: Duration::hours(1),
            window: Duration::hours(24),
        }
    }

    /// Entry offsets from the start: `0, step, 2*step, ...` below `window`.
    /// Always at least one.
    pub fn offsets(&self) -> Vec<Duration> {
        if self.step <= Duration::zero() {
            return vec![Duration::zero()];
        }

        let mut offsets = vec![Duration::zero()];
        let mut next = self.step;
        while next < self.window {
            offsets.push(next);
            next += self.step;
        }
        offsets
    }
}

/// Reload rule before it is anchored to a generation time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadRule {
    After(Duration),
    AtEnd,
}

impl ReloadRule {
    fn anchor(self, now: DateTime<Utc>) -> ReloadPolicy {
        match self {
            ReloadRule::After(interval) => ReloadPolicy::After(now + interval),
            ReloadRule::AtEnd => ReloadPolicy::AtEnd,
        }
    }
}

impl From<&TimelineConfig> for TimelineSchedule {
    fn from(config: &TimelineConfig) -> Self {
        Self {
            step: Duration::minutes(i64::from(config.step_minutes)),
            window: Duration::minutes(i64::from(config.window_minutes)),
        }
    }
}

impl From<&TimelineConfig> for ReloadRule {
    fn from(config: &TimelineConfig) -> Self {
        match config.reload_policy {
            ReloadPolicyKind::After => {
                ReloadRule::After(Duration::minutes(i64::from(config.reload_after_minutes)))
            }
            ReloadPolicyKind::AtEnd => ReloadRule::AtEnd,
        }
    }
}

/// Produces widget entries from the shared settings.
///
/// The geocode cache is owned by the provider and lives as long as it does,
/// so repeated timeline passes reuse resolved place names.
pub struct TimelineProvider<G: ?Sized> {
    store: Arc<SettingsStore>,
    resolver: LocationResolver<G>,
    names: Arc<GeocodeCache<G>>,
    schedule: TimelineSchedule,
    reload: ReloadRule,
}

impl<G: Geocoder + ?Sized> TimelineProvider<G> {
    pub fn new(store: Arc<SettingsStore>, geocoder: Arc<G>, config: &Config) -> Self {
        let call_timeout = StdDuration::from_secs(config.geocoding.timeout_secs);
        let fallback = Coordinates::new(
            config.location.fallback_latitude,
            config.location.fallback_longitude,
        );

        let resolver = LocationResolver::new(store.clone(), geocoder.clone(), fallback)
            .with_timeout(call_timeout);
        let names = Arc::new(GeocodeCache::with_limits(
            geocoder,
            StdDuration::from_secs(config.geocoding.rate_limit_secs),
            call_timeout,
        ));

        Self::from_parts(
            store,
            resolver,
            names,
            TimelineSchedule::from(&config.timeline),
            ReloadRule::from(&config.timeline),
        )
    }

    pub fn from_parts(
        store: Arc<SettingsStore>,
        resolver: LocationResolver<G>,
        names: Arc<GeocodeCache<G>>,
        schedule: TimelineSchedule,
        reload: ReloadRule,
    ) -> Self {
        Self {
            store,
            resolver,
            names,
            schedule,
            reload,
        }
    }

    pub fn schedule(&self) -> TimelineSchedule {
        self.schedule
    }

    pub fn placeholder(&self, now: DateTime<Utc>) -> Entry {
        Entry::data(now, sample_prayers(now), Some(PLACEHOLDER_LOCATION.to_string()))
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> Entry {
        Entry::data(now, sample_prayers(now), Some(SNAPSHOT_LOCATION.to_string()))
    }

    pub async fn timeline(&self) -> Timeline {
        self.timeline_at(Utc::now()).await
    }

    /// Build a timeline starting at `now`.
    ///
    /// Entries are collected locally and only returned once complete, so a
    /// dropped future publishes nothing.
    pub async fn timeline_at(&self, now: DateTime<Utc>) -> Timeline {
        let settings = self.store.get();
        let dates: Vec<DateTime<Utc>> =
            self.schedule.offsets().into_iter().map(|o| now + o).collect();
        let policy = self.reload.anchor(now);

        let Some(coordinates) = self.resolver.resolve(&settings.location).await else {
            tracing::warn!("Location {} could not be resolved", settings.location);
            let entries = dates
                .into_iter()
                .map(|date| Entry::error(date, LOCATION_UNAVAILABLE))
                .collect();
            return Timeline { entries, policy };
        };

        let location = self.names.name_for(coordinates).await;
        let mut day = DayCache::default();
        let mut entries = Vec::with_capacity(dates.len());

        for date in dates {
            let mut prayers = day.prayers(coordinates, date, &settings).to_vec();
            if prayers.is_empty() {
                entries.push(Entry::error(date, PRAYER_TIMES_UNAVAILABLE));
                continue;
            }
            mark_next_prayer(&mut prayers, date);
            entries.push(Entry::data(date, prayers, Some(location.clone())));
        }

        tracing::info!(
            "Built timeline of {} entries for {} ({})",
            entries.len(),
            location,
            coordinates
        );
        Timeline { entries, policy }
    }
}

/// One computed day, reused while consecutive entries share a local date
#[derive(Default)]
struct DayCache {
    day: Option<NaiveDate>,
    prayers: Vec<PrayerTime>,
}

impl DayCache {
    fn prayers(
        &mut self,
        coordinates: Coordinates,
        at: DateTime<Utc>,
        settings: &Settings,
    ) -> &[PrayerTime] {
        let day = at.with_timezone(&Local).date_naive();
        if self.day != Some(day) {
            self.prayers = prayer_times_for(coordinates, day, settings, at);
            self.day = Some(day);
        }
        &self.prayers
    }
}

/// Fixed preview list relative to `now`; Dhuhr is next
pub fn sample_prayers(now: DateTime<Utc>) -> Vec<PrayerTime> {
    let mut prayers: Vec<PrayerTime> = [
        (Prayer::Fajr, -2),
        (Prayer::Dhuhr, 2),
        (Prayer::Asr, 5),
        (Prayer::Maghrib, 8),
        (Prayer::Isha, 10),
    ]
    .into_iter()
    .map(|(prayer, hours)| PrayerTime::new(prayer, now + Duration::hours(hours)))
    .collect();
    mark_next_prayer(&mut prayers, now);
    prayers
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::geocode::GeocodeError;
    use crate::types::{LocationSetting, PrayerAdjustments};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubGeocoder {
        name: Option<&'static str>,
        place: Option<Coordinates>,
        reverse_calls: AtomicUsize,
    }

    #[async_trait]
    impl Geocoder for StubGeocoder {
        async fn reverse(&self, coordinates: Coordinates) -> Result<String, GeocodeError> {
            self.reverse_calls.fetch_add(1, Ordering::SeqCst);
            self.name
                .map(str::to_string)
                .ok_or_else(|| GeocodeError::NoMatch(coordinates.to_string()))
        }

        async fn forward(&self, query: &str) -> Result<Coordinates, GeocodeError> {
            self.place
                .ok_or_else(|| GeocodeError::NoMatch(query.to_string()))
        }
    }

    fn provider_with(
        geocoder: StubGeocoder,
        config: &Config,
    ) -> (Arc<SettingsStore>, Arc<StubGeocoder>, TimelineProvider<StubGeocoder>) {
        let store = Arc::new(SettingsStore::in_memory().unwrap());
        let geocoder = Arc::new(geocoder);
        let provider = TimelineProvider::new(store.clone(), geocoder.clone(), config);
        (store, geocoder, provider)
    }

    fn stub(name: Option<&'static str>, place: Option<Coordinates>) -> StubGeocoder {
        StubGeocoder {
            name,
            place,
            reverse_calls: AtomicUsize::new(0),
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 21, 6, 0, 0).unwrap()
    }

    #[test]
    fn test_default_schedule_offsets() {
        let offsets = TimelineSchedule::default().offsets();
        let minutes: Vec<i64> = offsets.iter().map(|o| o.num_minutes()).collect();
        assert_eq!(minutes, vec![0, 5, 10, 15, 20, 25]);
    }

    #[test]
    fn test_hourly_schedule_covers_a_day() {
        let offsets = TimelineSchedule::hourly().offsets();
        assert_eq!(offsets.len(), 24);
        assert_eq!(offsets.last().unwrap().num_hours(), 23);
    }

    #[test]
    fn test_degenerate_schedule_still_yields_one_entry() {
        let schedule = TimelineSchedule {
            step: Duration::zero(),
            window: Duration::minutes(30),
        };
        assert_eq!(schedule.offsets(), vec![Duration::zero()]);
    }

    #[test]
    fn test_sample_prayers_flag_dhuhr() {
        let prayers = sample_prayers(start());
        let next: Vec<_> = prayers.iter().filter(|p| p.is_next).collect();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].prayer, Prayer::Dhuhr);
    }

    #[test]
    fn test_placeholder_and_snapshot_labels() {
        let (_, _, provider) = provider_with(stub(None, None), &Config::default());
        assert_eq!(
            provider.placeholder(start()).location.as_deref(),
            Some(PLACEHOLDER_LOCATION)
        );
        assert_eq!(
            provider.snapshot(start()).location.as_deref(),
            Some(SNAPSHOT_LOCATION)
        );
        assert!(!provider.snapshot(start()).is_error());
    }

    #[tokio::test]
    async fn test_auto_timeline_uses_fallback_and_names_it() {
        let (_, geocoder, provider) = provider_with(stub(Some("Dhaka"), None), &Config::default());

        let timeline = provider.timeline_at(start()).await;
        assert_eq!(timeline.entries.len(), 6);
        assert_eq!(timeline.policy, ReloadPolicy::After(start() + Duration::minutes(1)));

        for (i, entry) in timeline.entries.iter().enumerate() {
            assert_eq!(entry.date, start() + Duration::minutes(5 * i as i64));
            assert!(!entry.is_error());
            assert_eq!(entry.location.as_deref(), Some("Dhaka"));
            assert!(!entry.prayer_times.is_empty());
            assert!(entry.prayer_times.iter().filter(|p| p.is_next).count() <= 1);
        }
        assert_eq!(geocoder.reverse_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_next_flag_follows_entry_timestamp() {
        let mut config = Config::default();
        config.timeline = TimelineConfig::hourly();
        let (_, _, provider) = provider_with(stub(Some("Dhaka"), None), &config);

        let timeline = provider.timeline_at(start()).await;
        assert_eq!(timeline.policy, ReloadPolicy::AtEnd);

        for entry in &timeline.entries {
            if let Some(next) = entry.next_prayer() {
                assert!(next.time > entry.date);
                assert!(entry
                    .prayer_times
                    .iter()
                    .take_while(|p| !p.is_next)
                    .all(|p| p.time <= entry.date));
            } else {
                assert!(entry.prayer_times.iter().all(|p| p.time <= entry.date));
            }
        }
    }

    #[tokio::test]
    async fn test_unresolvable_place_gives_error_entries() {
        let (store, geocoder, provider) = provider_with(stub(Some("Dhaka"), None), &Config::default());
        let settings = Settings {
            location: LocationSetting::Named("Atlantis".to_string()),
            ..Settings::default()
        };
        store.set(&settings).unwrap();

        let timeline = provider.timeline_at(start()).await;
        assert_eq!(timeline.entries.len(), 6);
        for entry in &timeline.entries {
            assert!(entry.is_error());
            assert!(entry.prayer_times.is_empty());
            assert_eq!(entry.error.as_deref(), Some(LOCATION_UNAVAILABLE));
        }
        assert_eq!(geocoder.reverse_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_polar_location_gives_unavailable_entries() {
        let tromso = Coordinates::new(69.6496, 18.956);
        let (store, _, provider) = provider_with(stub(Some("Tromsø"), None), &Config::default());
        store.save_coordinates(tromso).unwrap();

        let timeline = provider.timeline_at(start()).await;
        assert!(timeline
            .entries
            .iter()
            .all(|e| e.error.as_deref() == Some(PRAYER_TIMES_UNAVAILABLE)));
    }

    #[tokio::test]
    async fn test_reverse_failure_degrades_to_unknown_location() {
        let (_, _, provider) = provider_with(stub(None, None), &Config::default());

        let timeline = provider.timeline_at(start()).await;
        assert!(timeline
            .entries
            .iter()
            .all(|e| e.location.as_deref() == Some(crate::cache::UNKNOWN_LOCATION)));
    }

    #[tokio::test]
    async fn test_named_place_and_adjustments_apply() {
        let sylhet = Coordinates::new(24.8998, 91.8708);
        let (store, _, provider) =
            provider_with(stub(Some("Sylhet"), Some(sylhet)), &Config::default());

        let plain = provider.timeline_at(start()).await;

        store
            .set(&Settings {
                location: LocationSetting::Named("Sylhet".to_string()),
                adjustments: PrayerAdjustments::uniform(10),
                ..Settings::default()
            })
            .unwrap();
        let shifted = provider.timeline_at(start()).await;

        // The fallback and Sylhet are both in Bangladesh but differ in longitude,
        // so compare against a direct computation instead of the first timeline.
        let expected = prayer_times_for(
            sylhet,
            start().with_timezone(&Local).date_naive(),
            &store.get(),
            start(),
        );
        let first = &shifted.entries[0];
        assert_eq!(first.location.as_deref(), Some("Sylhet"));
        let got: Vec<_> = first.prayer_times.iter().map(|p| p.time).collect();
        let want: Vec<_> = expected.iter().map(|p| p.time).collect();
        assert_eq!(got, want);
        assert_ne!(plain.entries[0].prayer_times, first.prayer_times);
    }

    #[test]
    fn test_entry_at_and_reload_at() {
        let t0 = start();
        let entries: Vec<Entry> = (0..3)
            .map(|i| Entry::error(t0 + Duration::minutes(5 * i), "x"))
            .collect();
        let timeline = Timeline {
            entries,
            policy: ReloadPolicy::AtEnd,
        };

        assert_eq!(timeline.entry_at(t0 - Duration::minutes(1)).unwrap().date, t0);
        assert_eq!(
            timeline.entry_at(t0 + Duration::minutes(7)).unwrap().date,
            t0 + Duration::minutes(5)
        );
        assert_eq!(timeline.reload_at(), Some(t0 + Duration::minutes(10)));
    }
}
