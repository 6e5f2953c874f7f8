//! Countdown math and plain-text widget layouts.

use chrono::{DateTime, Duration, Local, TimeZone, Utc};

use crate::types::{Entry, Prayer};

/// Default span of the countdown ring, in hours
pub const DEFAULT_COUNTDOWN_WINDOW_HOURS: i64 = 5;

const BAR_WIDTH: usize = 20;

/// State of the countdown toward the flagged prayer
#[derive(Debug, Clone, PartialEq)]
pub enum Countdown {
    Upcoming {
        prayer: Prayer,
        instant: DateTime<Utc>,
        remaining: Duration,
        /// Fraction of the window already elapsed, in `[0, 1]`
        progress: f64,
    },
    NoUpcomingPrayer,
}

/// Countdown for `entry` as seen at `render_time`.
///
/// Remaining time never goes negative; progress fills up as the prayer
/// approaches and is clamped to `[0, 1]`.
pub fn countdown(entry: &Entry, render_time: DateTime<Utc>, window: Duration) -> Countdown {
    let Some(next) = entry.next_prayer() else {
        return Countdown::NoUpcomingPrayer;
    };

    let remaining = (next.time - render_time).max(Duration::zero());
    let progress = if window <= Duration::zero() {
        1.0
    } else {
        let window_secs = window.num_milliseconds() as f64;
        let remaining_secs = remaining.num_milliseconds() as f64;
        ((window_secs - remaining_secs) / window_secs).clamp(0.0, 1.0)
    };

    Countdown::Upcoming {
        prayer: next.prayer,
        instant: next.time,
        remaining,
        progress,
    }
}

/// `HH:MM:SS`; hours are not wrapped at 24
pub fn format_remaining(remaining: Duration) -> String {
    let total = remaining.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// 12-hour clock in local time, e.g. `05:12am`
pub fn format_prayer_time(time: DateTime<Utc>) -> String {
    format_prayer_time_in(time, &Local)
}

pub fn format_prayer_time_in<Tz>(time: DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    time.with_timezone(tz).format("%I:%M%P").to_string()
}

fn progress_bar(progress: f64) -> String {
    let filled = ((progress * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    format!(
        "[{}{}] {:>3.0}%",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        progress * 100.0
    )
}

/// Small layout: next prayer, remaining time and progress
pub fn render_small(entry: &Entry, render_time: DateTime<Utc>, window: Duration) -> String {
    if let Some(error) = &entry.error {
        return error.clone();
    }

    match countdown(entry, render_time, window) {
        Countdown::Upcoming {
            prayer,
            remaining,
            progress,
            ..
        } => format!(
            "{}\nRemaining Time\n{}\n{}",
            prayer,
            format_remaining(remaining),
            progress_bar(progress)
        ),
        Countdown::NoUpcomingPrayer => "No upcoming prayer".to_string(),
    }
}

/// Medium layout: the small layout plus every prayer of the day
pub fn render_medium(entry: &Entry, render_time: DateTime<Utc>, window: Duration) -> String {
    render_medium_in(entry, render_time, window, &Local)
}

pub fn render_medium_in<Tz>(
    entry: &Entry,
    render_time: DateTime<Utc>,
    window: Duration,
    tz: &Tz,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    if let Some(error) = &entry.error {
        return error.clone();
    }

    let mut lines: Vec<String> = entry.location.iter().cloned().collect();
    lines.push(render_small(entry, render_time, window));
    lines.extend(entry.prayer_times.iter().map(|prayer| {
        let marker = if prayer.is_next { '>' } else { ' ' };
        format!(
            "{} {:<8} {}",
            marker,
            prayer.prayer.name(),
            format_prayer_time_in(prayer.time, tz)
        )
    }));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use crate::types::{mark_next_prayer, PrayerTime};
    use chrono::FixedOffset;

    fn window() -> Duration {
        Duration::hours(DEFAULT_COUNTDOWN_WINDOW_HOURS)
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 21, h, m, s).unwrap()
    }

    fn entry(now: DateTime<Utc>) -> Entry {
        let mut prayers = vec![
            PrayerTime::new(Prayer::Fajr, at(0, 0, 0)),
            PrayerTime::new(Prayer::Dhuhr, at(6, 0, 0)),
            PrayerTime::new(Prayer::Asr, at(10, 0, 0)),
        ];
        mark_next_prayer(&mut prayers, now);
        Entry::data(now, prayers, Some("Dhaka".to_string()))
    }

    #[test]
    fn test_countdown_remaining_and_progress() {
        let now = at(3, 30, 0);
        match countdown(&entry(now), now, window()) {
            Countdown::Upcoming {
                prayer,
                remaining,
                progress,
                ..
            } => {
                assert_eq!(prayer, Prayer::Dhuhr);
                assert_eq!(remaining, Duration::minutes(150));
                assert!((progress - 0.5).abs() < 1e-9);
            }
            Countdown::NoUpcomingPrayer => panic!("expected a countdown"),
        }
    }

    #[test]
    fn test_progress_clamps_for_distant_prayer() {
        let now = at(0, 30, 0);
        let Countdown::Upcoming { progress, .. } =
            countdown(&entry(now), now, window())
        else {
            panic!("expected a countdown");
        };
        assert_eq!(progress, 0.0);
    }

    #[test]
    fn test_remaining_never_negative() {
        // Entry generated at 05:00 but rendered after Dhuhr passed
        let generated = at(5, 0, 0);
        let Countdown::Upcoming {
            remaining,
            progress,
            ..
        } = countdown(&entry(generated), at(6, 10, 0), window())
        else {
            panic!("expected a countdown");
        };
        assert_eq!(remaining, Duration::zero());
        assert_eq!(progress, 1.0);
    }

    #[test]
    fn test_no_upcoming_prayer() {
        let now = at(11, 0, 0);
        assert_eq!(
            countdown(&entry(now), now, window()),
            Countdown::NoUpcomingPrayer
        );
        assert_eq!(
            render_small(&entry(now), now, window()),
            "No upcoming prayer"
        );
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::seconds(0)), "00:00:00");
        assert_eq!(format_remaining(Duration::seconds(3 * 3600 + 62)), "03:01:02");
        assert_eq!(format_remaining(Duration::hours(30)), "30:00:00");
        assert_eq!(format_remaining(Duration::seconds(-5)), "00:00:00");
    }

    #[test]
    fn test_format_prayer_time_is_lowercase_twelve_hour() {
        let dhaka = FixedOffset::east_opt(6 * 3600).unwrap();
        assert_eq!(format_prayer_time_in(at(6, 5, 0), &dhaka), "12:05pm");
        assert_eq!(format_prayer_time_in(at(22, 30, 0), &dhaka), "04:30am");
    }

    #[test]
    fn test_error_entry_renders_message() {
        let entry = Entry::error(at(1, 0, 0), "Location unavailable");
        assert_eq!(
            render_small(&entry, at(1, 0, 0), window()),
            "Location unavailable"
        );
        assert_eq!(
            render_medium(&entry, at(1, 0, 0), window()),
            "Location unavailable"
        );
    }

    #[test]
    fn test_medium_layout_marks_next_prayer() {
        let now = at(3, 30, 0);
        let utc = FixedOffset::east_opt(0).unwrap();
        let text = render_medium_in(&entry(now), now, window(), &utc);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Dhaka");
        assert_eq!(lines[1], "Dhuhr");
        assert_eq!(lines[3], "02:30:00");
        assert!(lines.contains(&"> Dhuhr    06:00am"));
        assert!(lines.contains(&"  Fajr     12:00am"));
        assert!(!text.ends_with('\n'));
    }
}
