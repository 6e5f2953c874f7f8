//! Solar position for prayer time computation.
//!
//! Low-precision solar coordinates after Meeus, "Astronomical Algorithms"
//! (chapters 12, 13, 15, 22 and 25). All angles are degrees unless a name
//! says otherwise. Event times are fractional hours of UT counted from
//! midnight of the requested date and may fall outside 0..24; they are NaN
//! when the sun never reaches the requested altitude.

use chrono::{Datelike, NaiveDate};

use crate::types::Coordinates;

/// Apparent altitude of the sun's upper limb at sunrise/sunset,
/// including standard refraction.
const SUNRISE_ALTITUDE: f64 = -50.0 / 60.0;

/// J2000.0 epoch as a Julian day.
const J2000: f64 = 2_451_545.0;

fn unwind_angle(angle: f64) -> f64 {
    angle.rem_euclid(360.0)
}

fn closest_angle(angle: f64) -> f64 {
    if (-180.0..=180.0).contains(&angle) {
        angle
    } else {
        angle - 360.0 * (angle / 360.0).round()
    }
}

fn normalize_to_scale(value: f64, max: f64) -> f64 {
    value - max * (value / max).floor()
}

/// Julian day at `hours` UT on the given civil date.
pub fn julian_day(year: i32, month: u32, day: u32, hours: f64) -> f64 {
    let (y, m) = if month > 2 {
        (year, month as i32)
    } else {
        (year - 1, month as i32 + 12)
    };
    let d = f64::from(day) + hours / 24.0;
    let a = y / 100;
    let b = 2 - a + a / 4;
    let i0 = (365.25 * f64::from(y + 4716)).trunc();
    let i1 = (30.6001 * f64::from(m + 1)).trunc();
    i0 + i1 + d + f64::from(b) - 1524.5
}

pub fn julian_century(julian_day: f64) -> f64 {
    (julian_day - J2000) / 36525.0
}

fn mean_solar_longitude(t: f64) -> f64 {
    unwind_angle(280.466_456_7 + 36_000.769_83 * t + 0.000_303_2 * t * t)
}

fn mean_lunar_longitude(t: f64) -> f64 {
    unwind_angle(218.3165 + 481_267.8813 * t)
}

fn ascending_lunar_node_longitude(t: f64) -> f64 {
    unwind_angle(
        125.044_52 - 1_934.136_261 * t + 0.002_070_8 * t * t + t * t * t / 450_000.0,
    )
}

fn mean_solar_anomaly(t: f64) -> f64 {
    unwind_angle(357.529_11 + 35_999.050_29 * t - 0.000_153_7 * t * t)
}

fn solar_equation_of_the_center(t: f64, mean_anomaly: f64) -> f64 {
    let m = mean_anomaly.to_radians();
    (1.914_602 - 0.004_817 * t - 0.000_014 * t * t) * m.sin()
        + (0.019_993 - 0.000_101 * t) * (2.0 * m).sin()
        + 0.000_289 * (3.0 * m).sin()
}

fn apparent_solar_longitude(t: f64, mean_longitude: f64) -> f64 {
    let longitude = mean_longitude + solar_equation_of_the_center(t, mean_solar_anomaly(t));
    let omega = 125.04 - 1_934.136 * t;
    unwind_angle(longitude - 0.005_69 - 0.004_78 * omega.to_radians().sin())
}

fn mean_obliquity_of_the_ecliptic(t: f64) -> f64 {
    23.439_291 - 0.013_004_167 * t - 0.000_000_163_9 * t * t + 0.000_000_503_6 * t * t * t
}

fn apparent_obliquity_of_the_ecliptic(t: f64, mean_obliquity: f64) -> f64 {
    let o = 125.04 - 1_934.136 * t;
    mean_obliquity + 0.002_56 * o.to_radians().cos()
}

/// Mean sidereal time at Greenwich for the instant `t` (Julian centuries).
pub fn mean_sidereal_time(t: f64) -> f64 {
    let jd = t * 36525.0 + J2000;
    unwind_angle(
        280.460_618_37 + 360.985_647_366_29 * (jd - J2000) + 0.000_387_933 * t * t
            - t * t * t / 38_710_000.0,
    )
}

fn nutation_in_longitude(solar_longitude: f64, lunar_longitude: f64, node: f64) -> f64 {
    let l0 = solar_longitude.to_radians();
    let lp = lunar_longitude.to_radians();
    let omega = node.to_radians();
    (-17.2 / 3600.0) * omega.sin() - (1.32 / 3600.0) * (2.0 * l0).sin()
        - (0.23 / 3600.0) * (2.0 * lp).sin()
        + (0.21 / 3600.0) * (2.0 * omega).sin()
}

fn nutation_in_obliquity(solar_longitude: f64, lunar_longitude: f64, node: f64) -> f64 {
    let l0 = solar_longitude.to_radians();
    let lp = lunar_longitude.to_radians();
    let omega = node.to_radians();
    (9.2 / 3600.0) * omega.cos() + (0.57 / 3600.0) * (2.0 * l0).cos()
        + (0.10 / 3600.0) * (2.0 * lp).cos()
        - (0.09 / 3600.0) * (2.0 * omega).cos()
}

fn altitude_of_celestial_body(latitude: f64, declination: f64, hour_angle: f64) -> f64 {
    let phi = latitude.to_radians();
    let delta = declination.to_radians();
    let h = hour_angle.to_radians();
    (phi.sin() * delta.sin() + phi.cos() * delta.cos() * h.cos())
        .asin()
        .to_degrees()
}

fn interpolate(y2: f64, y1: f64, y3: f64, n: f64) -> f64 {
    let a = y2 - y1;
    let b = y3 - y2;
    let c = b - a;
    y2 + (n / 2.0) * (a + b + n * c)
}

fn interpolate_angles(y2: f64, y1: f64, y3: f64, n: f64) -> f64 {
    let a = unwind_angle(y2 - y1);
    let b = unwind_angle(y3 - y2);
    let c = b - a;
    y2 + (n / 2.0) * (a + b + n * c)
}

/// Apparent equatorial position of the sun at 0h UT of a Julian day.
#[derive(Debug, Clone, Copy)]
pub struct SolarCoordinates {
    pub declination: f64,
    pub right_ascension: f64,
    pub apparent_sidereal_time: f64,
}

impl SolarCoordinates {
    pub fn new(julian_day: f64) -> Self {
        let t = julian_century(julian_day);
        let l0 = mean_solar_longitude(t);
        let lp = mean_lunar_longitude(t);
        let omega = ascending_lunar_node_longitude(t);
        let lambda = apparent_solar_longitude(t, l0).to_radians();
        let theta0 = mean_sidereal_time(t);
        let delta_psi = nutation_in_longitude(l0, lp, omega);
        let delta_epsilon = nutation_in_obliquity(l0, lp, omega);
        let epsilon0 = mean_obliquity_of_the_ecliptic(t);
        let epsilon_apparent = apparent_obliquity_of_the_ecliptic(t, epsilon0).to_radians();

        let declination = (epsilon_apparent.sin() * lambda.sin()).asin().to_degrees();
        let right_ascension = unwind_angle(
            (epsilon_apparent.cos() * lambda.sin())
                .atan2(lambda.cos())
                .to_degrees(),
        );
        let apparent_sidereal_time =
            theta0 + delta_psi * (epsilon0 + delta_epsilon).to_radians().cos();

        Self {
            declination,
            right_ascension,
            apparent_sidereal_time,
        }
    }
}

/// Solar events for one date at one place.
#[derive(Debug, Clone)]
pub struct SolarTime {
    observer: Coordinates,
    solar: SolarCoordinates,
    prev_solar: SolarCoordinates,
    next_solar: SolarCoordinates,
    approx_transit: f64,
    pub transit: f64,
    pub sunrise: f64,
    pub sunset: f64,
}

impl SolarTime {
    pub fn new(date: NaiveDate, observer: Coordinates) -> Self {
        let jd = julian_day(date.year(), date.month(), date.day(), 0.0);
        let prev_solar = SolarCoordinates::new(jd - 1.0);
        let solar = SolarCoordinates::new(jd);
        let next_solar = SolarCoordinates::new(jd + 1.0);

        let approx_transit = normalize_to_scale(
            (solar.right_ascension - observer.longitude - solar.apparent_sidereal_time) / 360.0,
            1.0,
        );

        let mut time = Self {
            observer,
            solar,
            prev_solar,
            next_solar,
            approx_transit,
            transit: f64::NAN,
            sunrise: f64::NAN,
            sunset: f64::NAN,
        };
        time.transit = time.corrected_transit();
        time.sunrise = time.hour_angle(SUNRISE_ALTITUDE, false);
        time.sunset = time.hour_angle(SUNRISE_ALTITUDE, true);
        time
    }

    fn corrected_transit(&self) -> f64 {
        let m0 = self.approx_transit;
        let lw = -self.observer.longitude;
        let theta = unwind_angle(self.solar.apparent_sidereal_time + 360.985_647 * m0);
        let alpha = unwind_angle(interpolate_angles(
            self.solar.right_ascension,
            self.prev_solar.right_ascension,
            self.next_solar.right_ascension,
            m0,
        ));
        let h = closest_angle(theta - lw - alpha);
        (m0 + h / -360.0) * 24.0
    }

    /// Time at which the sun crosses `altitude`, before or after transit.
    pub fn hour_angle(&self, altitude: f64, after_transit: bool) -> f64 {
        let m0 = self.approx_transit;
        let lw = -self.observer.longitude;
        let phi = self.observer.latitude.to_radians();
        let delta2 = self.solar.declination.to_radians();

        let cos_h0 =
            (altitude.to_radians().sin() - phi.sin() * delta2.sin()) / (phi.cos() * delta2.cos());
        let h0 = cos_h0.acos().to_degrees();
        let m = if after_transit {
            m0 + h0 / 360.0
        } else {
            m0 - h0 / 360.0
        };

        let theta = unwind_angle(self.solar.apparent_sidereal_time + 360.985_647 * m);
        let alpha = unwind_angle(interpolate_angles(
            self.solar.right_ascension,
            self.prev_solar.right_ascension,
            self.next_solar.right_ascension,
            m,
        ));
        let delta = interpolate(
            self.solar.declination,
            self.prev_solar.declination,
            self.next_solar.declination,
            m,
        );
        let h = theta - lw - alpha;
        let altitude_at_m = altitude_of_celestial_body(self.observer.latitude, delta, h);
        let correction = (altitude_at_m - altitude)
            / (360.0 * delta.to_radians().cos() * phi.cos() * h.to_radians().sin());
        (m + correction) * 24.0
    }

    /// Time at which an object's shadow is `shadow_length` times its height
    /// plus the noon shadow.
    pub fn afternoon(&self, shadow_length: f64) -> f64 {
        let tangent = (self.observer.latitude - self.solar.declination).abs();
        let inverse = shadow_length + tangent.to_radians().tan();
        let angle = (1.0 / inverse).atan().to_degrees();
        self.hour_angle(angle, true)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} ± {tolerance}, got {actual}"
        );
    }

    #[test]
    fn test_julian_day_reference_dates() {
        // Meeus example 7.a and the J2000 epoch
        assert_close(julian_day(1957, 10, 4, 19.0 + 26.0 / 60.0 + 24.0 / 3600.0), 2_436_116.31, 0.001);
        assert_close(julian_day(2000, 1, 1, 12.0), J2000, 1e-9);
        assert_close(julian_day(1992, 10, 13, 0.0), 2_448_908.5, 1e-9);
    }

    #[test]
    fn test_mean_sidereal_time_meeus_12a() {
        let t = julian_century(2_446_895.5);
        assert_close(mean_sidereal_time(t), 197.693_195, 1e-4);
    }

    #[test]
    fn test_solar_coordinates_meeus_25a() {
        let solar = SolarCoordinates::new(2_448_908.5);
        assert_close(solar.declination, -7.785_07, 1e-3);
        assert_close(solar.right_ascension, 198.380_83, 1e-3);
    }

    #[test]
    fn test_angle_helpers() {
        assert_close(unwind_angle(-45.0), 315.0, 1e-9);
        assert_close(unwind_angle(725.0), 5.0, 1e-9);
        assert_close(closest_angle(350.0), -10.0, 1e-9);
        assert_close(closest_angle(-190.0), 170.0, 1e-9);
        assert_close(normalize_to_scale(1.25, 1.0), 0.25, 1e-9);
        assert_close(normalize_to_scale(-0.25, 1.0), 0.75, 1e-9);
    }

    #[test]
    fn test_dhaka_solstice_events() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let time = SolarTime::new(date, Coordinates::new(23.777176, 90.399452));

        // Local noon in Dhaka (UTC+6) is close to 06:00 UT
        assert!((5.8..6.2).contains(&time.transit), "transit {}", time.transit);
        assert!(time.sunrise < time.transit && time.transit < time.sunset);

        let day_length = time.sunset - time.sunrise;
        assert!((13.0..14.0).contains(&day_length), "day length {day_length}");
    }

    #[test]
    fn test_asr_follows_shadow_length() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let time = SolarTime::new(date, Coordinates::new(23.777176, 90.399452));
        let shafi = time.afternoon(1.0);
        let hanafi = time.afternoon(2.0);
        assert!(time.transit < shafi && shafi < hanafi && hanafi < time.sunset);
    }

    #[test]
    fn test_midnight_sun_has_no_sunset() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let time = SolarTime::new(date, Coordinates::new(69.6492, 18.9553));
        assert!(time.transit.is_finite());
        assert!(time.sunrise.is_nan());
        assert!(time.sunset.is_nan());
    }
}
