//! Sliding-window arithmetic shared by every engine.
//!
//! A window is the half-open range `(now - window, now]`: the lower bound is
//! exclusive, the upper bound is `now` itself. Every window comparison in the
//! crate goes through these helpers so the interval checks, fraud detectors,
//! and rate limiters all agree on the boundary.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Exclusive lower bound of the window ending at `now`.
pub fn cutoff(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now - window
}

/// Count events whose timestamp falls strictly after `now - window`.
pub fn count_within<'a, T, F>(
    events: impl IntoIterator<Item = &'a T>,
    now: DateTime<Utc>,
    window: Duration,
    timestamp: F,
) -> usize
where
    T: 'a,
    F: Fn(&T) -> DateTime<Utc>,
{
    let cutoff = cutoff(now, window);
    events
        .into_iter()
        .filter(|event| timestamp(event) > cutoff)
        .count()
}

/// Most recent event whose timestamp falls strictly after `now - window`.
pub fn most_recent_within<'a, T, F>(
    events: impl IntoIterator<Item = &'a T>,
    now: DateTime<Utc>,
    window: Duration,
    timestamp: F,
) -> Option<&'a T>
where
    T: 'a,
    F: Fn(&T) -> DateTime<Utc>,
{
    let cutoff = cutoff(now, window);
    events
        .into_iter()
        .filter(|event| timestamp(event) > cutoff)
        .max_by_key(|event| timestamp(event))
}

/// Drop timestamps that have fallen out of the window ending at `now`.
///
/// The deque is expected to be in chronological order, which every caller in
/// this crate maintains by only pushing "now" onto the back.
pub fn prune_expired(timestamps: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) {
    let cutoff = cutoff(now, window);
    while let Some(oldest) = timestamps.front() {
        if *oldest <= cutoff {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}
