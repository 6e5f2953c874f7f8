//! Prayer computation adapter.
//!
//! Turns the user's [`Settings`] into calculation parameters and asks the
//! [`astronomy`](crate::astronomy) module for one calendar day of instants.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use salah_core::CalculationError;

use crate::astronomy::SolarTime;
use crate::types::{
    mark_next_prayer, CalculationMethod, Coordinates, HighLatitudeRule, Prayer, PrayerAdjustments,
    PrayerTime, Settings,
};

/// Twilight angles and fixed offsets behind a named method
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MethodParams {
    pub fajr_angle: f64,
    pub isha_angle: f64,
    /// Minutes after Maghrib; when non-zero it replaces `isha_angle`
    pub isha_interval: u32,
    /// Offsets the method itself prescribes, added to the user's
    pub method_adjustments: PrayerAdjustments,
}

impl MethodParams {
    pub fn for_method(method: CalculationMethod) -> Self {
        let dhuhr_plus_one = PrayerAdjustments {
            dhuhr: 1,
            ..PrayerAdjustments::default()
        };
        let (fajr_angle, isha_angle, isha_interval, method_adjustments) = match method {
            CalculationMethod::MuslimWorldLeague => (18.0, 17.0, 0, dhuhr_plus_one),
            CalculationMethod::Egyptian => (19.5, 17.5, 0, dhuhr_plus_one),
            CalculationMethod::Karachi => (18.0, 18.0, 0, dhuhr_plus_one),
            CalculationMethod::NorthAmerica => (15.0, 15.0, 0, dhuhr_plus_one),
            CalculationMethod::Kuwait => (18.0, 17.5, 0, PrayerAdjustments::default()),
            CalculationMethod::Qatar => (18.0, 0.0, 90, PrayerAdjustments::default()),
            CalculationMethod::Singapore => (20.0, 18.0, 0, dhuhr_plus_one),
        };
        Self {
            fajr_angle,
            isha_angle,
            isha_interval,
            method_adjustments,
        }
    }

    /// Fractions of the night bounding Fajr (before sunrise) and Isha
    /// (after sunset)
    pub fn night_portions(&self, rule: HighLatitudeRule) -> (f64, f64) {
        match rule {
            HighLatitudeRule::MiddleOfTheNight => (1.0 / 2.0, 1.0 / 2.0),
            HighLatitudeRule::SeventhOfTheNight => (1.0 / 7.0, 1.0 / 7.0),
            HighLatitudeRule::TwilightAngle => (self.fajr_angle / 60.0, self.isha_angle / 60.0),
        }
    }
}

fn instant(midnight: DateTime<Utc>, hours: f64) -> Option<DateTime<Utc>> {
    if !hours.is_finite() {
        return None;
    }
    let seconds = (hours * 3600.0).floor() as i64;
    midnight.checked_add_signed(Duration::seconds(seconds))
}

fn scaled(duration: Duration, factor: f64) -> Duration {
    Duration::seconds((duration.num_seconds() as f64 * factor).round() as i64)
}

/// Round to the nearest minute, halves rounding up
fn round_to_minute(time: DateTime<Utc>) -> DateTime<Utc> {
    let secs = time.timestamp();
    let rem = secs.rem_euclid(60);
    let floor = secs - rem;
    let rounded = if rem >= 30 { floor + 60 } else { floor };
    DateTime::from_timestamp(rounded, 0).unwrap_or(time)
}

/// Compute the ordered prayer instants of `date` at `coordinates`.
///
/// Prayers the sun never defines for that day are left out. The call fails
/// when transit, sunrise or sunset cannot be found (polar day or night), or
/// when the coordinates are out of range.
pub fn compute(
    coordinates: Coordinates,
    date: NaiveDate,
    settings: &Settings,
) -> Result<Vec<(Prayer, DateTime<Utc>)>, CalculationError> {
    if !coordinates.is_valid() {
        return Err(CalculationError::InvalidCoordinates {
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
        });
    }
    let tomorrow = date
        .succ_opt()
        .ok_or_else(|| CalculationError::InvalidDate(date.to_string()))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| CalculationError::InvalidDate(date.to_string()))?
        .and_utc();
    let tomorrow_midnight = midnight + Duration::days(1);

    let params = MethodParams::for_method(settings.calculation_method);
    let solar = SolarTime::new(date, coordinates);
    let tomorrow_solar = SolarTime::new(tomorrow, coordinates);

    let unavailable = || CalculationError::Unavailable(format!("{date} at {coordinates}"));
    let dhuhr = instant(midnight, solar.transit).ok_or_else(unavailable)?;
    let sunrise = instant(midnight, solar.sunrise).ok_or_else(unavailable)?;
    let sunset = instant(midnight, solar.sunset).ok_or_else(unavailable)?;
    let tomorrow_sunrise =
        instant(tomorrow_midnight, tomorrow_solar.sunrise).ok_or_else(unavailable)?;

    let asr = instant(midnight, solar.afternoon(settings.madhab.shadow_length()));
    let night = tomorrow_sunrise - sunset;
    let (fajr_portion, isha_portion) = params.night_portions(settings.high_latitude_rule);

    let safe_fajr = sunrise - scaled(night, fajr_portion);
    let fajr = match instant(midnight, solar.hour_angle(-params.fajr_angle, false)) {
        Some(fajr) if fajr >= safe_fajr => fajr,
        _ => safe_fajr,
    };

    let isha = if params.isha_interval > 0 {
        sunset + Duration::minutes(i64::from(params.isha_interval))
    } else {
        let safe_isha = sunset + scaled(night, isha_portion);
        match instant(midnight, solar.hour_angle(-params.isha_angle, true)) {
            Some(isha) if isha <= safe_isha => isha,
            _ => safe_isha,
        }
    };

    let raw = [
        (Prayer::Fajr, Some(fajr)),
        (Prayer::Sunrise, Some(sunrise)),
        (Prayer::Dhuhr, Some(dhuhr)),
        (Prayer::Asr, asr),
        (Prayer::Maghrib, Some(sunset)),
        (Prayer::Isha, Some(isha)),
    ];

    let times = raw
        .into_iter()
        .filter_map(|(prayer, time)| {
            let offset = settings.adjustments.get(prayer) + params.method_adjustments.get(prayer);
            time.map(|t| (prayer, round_to_minute(t + Duration::minutes(i64::from(offset)))))
        })
        .collect();

    Ok(times)
}

/// Compute a day and flag the first prayer strictly after `now`.
///
/// Failures collapse into an empty list; the caller turns that into an
/// error entry.
pub fn prayer_times_for(
    coordinates: Coordinates,
    date: NaiveDate,
    settings: &Settings,
    now: DateTime<Utc>,
) -> Vec<PrayerTime> {
    match compute(coordinates, date, settings) {
        Ok(times) => {
            let mut prayers: Vec<PrayerTime> = times
                .into_iter()
                .map(|(prayer, time)| PrayerTime::new(prayer, time))
                .collect();
            mark_next_prayer(&mut prayers, now);
            prayers
        }
        Err(e) => {
            tracing::warn!("Prayer computation failed: {}", e);
            Vec::new()
        }
    }
}
