use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Geographic coordinates in degrees.
///
/// Equality and hashing use the exact bit pattern of both components, so two
/// values are the same cache key only if they are bit-for-bit identical.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True when both components are finite and inside the usual ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl PartialEq for Coordinates {
    fn eq(&self, other: &Self) -> bool {
        self.latitude.to_bits() == other.latitude.to_bits()
            && self.longitude.to_bits() == other.longitude.to_bits()
    }
}

impl Eq for Coordinates {}

impl Hash for Coordinates {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.latitude.to_bits().hash(state);
        self.longitude.to_bits().hash(state);
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// The six daily times, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Prayer {
    Fajr,
    Sunrise,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl Prayer {
    pub const ALL: [Prayer; 6] = [
        Prayer::Fajr,
        Prayer::Sunrise,
        Prayer::Dhuhr,
        Prayer::Asr,
        Prayer::Maghrib,
        Prayer::Isha,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Fajr => "Fajr",
            Self::Sunrise => "Sunrise",
            Self::Dhuhr => "Dhuhr",
            Self::Asr => "Asr",
            Self::Maghrib => "Maghrib",
            Self::Isha => "Isha",
        }
    }

    /// SF Symbol style icon name used by the widget rows
    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::Fajr => "sunrise.fill",
            Self::Dhuhr => "sun.max.fill",
            Self::Asr => "sun.min.fill",
            Self::Maghrib => "sunset.fill",
            Self::Isha => "moon.stars.fill",
            Self::Sunrise => "clock.fill",
        }
    }
}

impl fmt::Display for Prayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One prayer instant inside an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrayerTime {
    pub prayer: Prayer,
    pub time: DateTime<Utc>,
    pub is_next: bool,
}

impl PrayerTime {
    pub fn new(prayer: Prayer, time: DateTime<Utc>) -> Self {
        Self {
            prayer,
            time,
            is_next: false,
        }
    }
}

/// Flag the first prayer strictly after `now`; clears any previous flag.
///
/// Returns the index of the flagged prayer, if any.
pub fn mark_next_prayer(prayers: &mut [PrayerTime], now: DateTime<Utc>) -> Option<usize> {
    let next = prayers.iter().position(|p| p.time > now);
    for (i, p) in prayers.iter_mut().enumerate() {
        p.is_next = Some(i) == next;
    }
    next
}

/// Immutable snapshot of prayer data destined for display.
///
/// Either a data entry (`error` is `None`) or an error entry (empty list,
/// `error` set).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub date: DateTime<Utc>,
    pub prayer_times: Vec<PrayerTime>,
    pub location: Option<String>,
    pub error: Option<String>,
}

impl Entry {
    pub fn data(date: DateTime<Utc>, prayer_times: Vec<PrayerTime>, location: Option<String>) -> Self {
        Self {
            date,
            prayer_times,
            location,
            error: None,
        }
    }

    pub fn error(date: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            date,
            prayer_times: Vec::new(),
            location: None,
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn next_prayer(&self) -> Option<&PrayerTime> {
        self.prayer_times.iter().find(|p| p.is_next)
    }
}

/// Error returned when a persisted enum value has no matching variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind}: {value}")]
pub struct ParseOptionError {
    pub kind: &'static str,
    pub value: String,
}

/// Named calculation presets offered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CalculationMethod {
    #[default]
    #[serde(rename = "Karachi")]
    Karachi,
    #[serde(rename = "Muslim World League")]
    MuslimWorldLeague,
    #[serde(rename = "Egyptian")]
    Egyptian,
    #[serde(rename = "North America")]
    NorthAmerica,
    #[serde(rename = "Kuwait")]
    Kuwait,
    #[serde(rename = "Qatar")]
    Qatar,
    #[serde(rename = "Singapore")]
    Singapore,
}

impl CalculationMethod {
    pub const ALL: [CalculationMethod; 7] = [
        Self::Karachi,
        Self::MuslimWorldLeague,
        Self::Egyptian,
        Self::NorthAmerica,
        Self::Kuwait,
        Self::Qatar,
        Self::Singapore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Karachi => "Karachi",
            Self::MuslimWorldLeague => "Muslim World League",
            Self::Egyptian => "Egyptian",
            Self::NorthAmerica => "North America",
            Self::Kuwait => "Kuwait",
            Self::Qatar => "Qatar",
            Self::Singapore => "Singapore",
        }
    }
}

/// Jurisprudential school, affects Asr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Madhab {
    #[default]
    Hanafi,
    Shafi,
}

impl Madhab {
    pub const ALL: [Madhab; 2] = [Self::Hanafi, Self::Shafi];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hanafi => "Hanafi",
            Self::Shafi => "Shafi",
        }
    }

    /// Shadow length factor used for Asr
    pub fn shadow_length(&self) -> f64 {
        match self {
            Self::Shafi => 1.0,
            Self::Hanafi => 2.0,
        }
    }
}

/// Fallback used where twilight never ends (high latitudes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum HighLatitudeRule {
    #[default]
    #[serde(rename = "Middle of the Night")]
    MiddleOfTheNight,
    #[serde(rename = "Seventh of the Night")]
    SeventhOfTheNight,
    #[serde(rename = "Twilight Angle")]
    TwilightAngle,
}

impl HighLatitudeRule {
    pub const ALL: [HighLatitudeRule; 3] = [
        Self::MiddleOfTheNight,
        Self::SeventhOfTheNight,
        Self::TwilightAngle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MiddleOfTheNight => "Middle of the Night",
            Self::SeventhOfTheNight => "Seventh of the Night",
            Self::TwilightAngle => "Twilight Angle",
        }
    }
}

macro_rules! display_from_str {
    ($ty:ty, $kind:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseOptionError;

            /// Accepts the display name, case-insensitively
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| ParseOptionError {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

display_from_str!(CalculationMethod, "calculation method");
display_from_str!(Madhab, "madhab");
display_from_str!(HighLatitudeRule, "high latitude rule");

/// Per-prayer minute offsets.
///
/// The configuration surface limits each value to [`ADJUSTMENT_RANGE`]; the
/// data layer stores whatever it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct PrayerAdjustments {
    pub fajr: i32,
    pub sunrise: i32,
    pub dhuhr: i32,
    pub asr: i32,
    pub maghrib: i32,
    pub isha: i32,
}

pub const ADJUSTMENT_RANGE: std::ops::RangeInclusive<i32> = -30..=30;

impl PrayerAdjustments {
    /// Same offset for every prayer
    pub fn uniform(minutes: i32) -> Self {
        Self {
            fajr: minutes,
            sunrise: minutes,
            dhuhr: minutes,
            asr: minutes,
            maghrib: minutes,
            isha: minutes,
        }
    }

    pub fn get(&self, prayer: Prayer) -> i32 {
        match prayer {
            Prayer::Fajr => self.fajr,
            Prayer::Sunrise => self.sunrise,
            Prayer::Dhuhr => self.dhuhr,
            Prayer::Asr => self.asr,
            Prayer::Maghrib => self.maghrib,
            Prayer::Isha => self.isha,
        }
    }

    pub fn set(&mut self, prayer: Prayer, minutes: i32) {
        let slot = match prayer {
            Prayer::Fajr => &mut self.fajr,
            Prayer::Sunrise => &mut self.sunrise,
            Prayer::Dhuhr => &mut self.dhuhr,
            Prayer::Asr => &mut self.asr,
            Prayer::Maghrib => &mut self.maghrib,
            Prayer::Isha => &mut self.isha,
        };
        *slot = minutes;
    }
}

/// Where prayer times are computed for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum LocationSetting {
    /// Use the last saved device coordinates (or the fallback)
    #[default]
    Auto,
    /// Free-text place name, forward geocoded on every refresh
    Named(String),
}

impl LocationSetting {
    pub const AUTO: &'static str = "Auto";

    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }
}

impl From<&str> for LocationSetting {
    fn from(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == Self::AUTO {
            Self::Auto
        } else {
            Self::Named(trimmed.to_string())
        }
    }
}

impl From<String> for LocationSetting {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<LocationSetting> for String {
    fn from(value: LocationSetting) -> Self {
        value.to_string()
    }
}

impl fmt::Display for LocationSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str(Self::AUTO),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// User-configurable calculation settings shared by the host app and widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Settings {
    pub calculation_method: CalculationMethod,
    pub madhab: Madhab,
    pub high_latitude_rule: HighLatitudeRule,
    pub adjustments: PrayerAdjustments,
    pub location: LocationSetting,
}

impl Settings {
    /// Prayers whose adjustment falls outside [`ADJUSTMENT_RANGE`]
    pub fn out_of_range_adjustments(&self) -> Vec<Prayer> {
        Prayer::ALL
            .into_iter()
            .filter(|p| !ADJUSTMENT_RANGE.contains(&self.adjustments.get(*p)))
            .collect()
    }
}
