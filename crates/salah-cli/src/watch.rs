//! Widget refresh loop.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use salah_times::{Geocoder, Timeline, TimelineProvider};

use crate::Size;

/// Shortest sleep between renders, so a stale reload deadline cannot spin
const MIN_SLEEP: std::time::Duration = std::time::Duration::from_secs(1);

/// Render the current entry until Ctrl-C, regenerating the timeline when its
/// reload deadline passes. Failures inside a pass only show up as error entries.
pub async fn run<G>(provider: &TimelineProvider<G>, window: Duration, size: Size) -> Result<()>
where
    G: Geocoder + ?Sized,
{
    let mut timeline = provider.timeline().await;
    tracing::info!("Watching {} entries", timeline.entries.len());

    loop {
        let now = Utc::now();
        if timeline.reload_at().map_or(true, |at| now >= at) {
            timeline = provider.timeline_at(now).await;
            tracing::debug!("Timeline regenerated at {}", now);
        }

        if let Some(entry) = timeline.entry_at(now) {
            println!("{}\n", size.render(entry, now, window));
        }

        let sleep = next_wake(&timeline, now)
            .to_std()
            .unwrap_or(MIN_SLEEP)
            .max(MIN_SLEEP);

        tokio::select! {
            _ = tokio::time::sleep(sleep) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopping refresh loop");
                return Ok(());
            }
        }
    }
}

/// Time until the next entry starts or the reload deadline, whichever is first
fn next_wake(timeline: &Timeline, now: DateTime<Utc>) -> Duration {
    let next_entry = timeline.entries.iter().map(|e| e.date).find(|d| *d > now);
    let wake = match (next_entry, timeline.reload_at()) {
        (Some(entry), Some(reload)) => entry.min(reload),
        (Some(at), None) | (None, Some(at)) => at,
        (None, None) => now,
    };
    wake - now
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use chrono::TimeZone;
    use salah_times::{Entry, ReloadPolicy};

    fn timeline(start: DateTime<Utc>, policy: ReloadPolicy) -> Timeline {
        Timeline {
            entries: (0..6)
                .map(|i| Entry::error(start + Duration::minutes(5 * i), "x"))
                .collect(),
            policy,
        }
    }

    #[test]
    fn test_wakes_for_reload_before_next_entry() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let t = timeline(start, ReloadPolicy::After(start + Duration::minutes(1)));
        assert_eq!(next_wake(&t, start), Duration::minutes(1));
    }

    #[test]
    fn test_wakes_for_next_entry_at_end_policy() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let t = timeline(start, ReloadPolicy::AtEnd);
        assert_eq!(next_wake(&t, start + Duration::minutes(7)), Duration::minutes(3));
    }

    #[test]
    fn test_past_everything_wakes_now() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let t = timeline(start, ReloadPolicy::AtEnd);
        let late = start + Duration::hours(1);
        assert!(next_wake(&t, late) <= Duration::zero());
    }
}
