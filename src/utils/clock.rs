// src/utils/clock.rs

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Source of "now" for timing decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Used by tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Seconds left in an attempt: `duration - (now - started_at)`, never negative.
///
/// Recomputed from the anchor on every call so reloads, paused clocks and
/// throttled timers cannot drift it.
pub fn remaining_seconds(duration_minutes: i32, started_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let elapsed = (now - started_at).num_seconds();
    (i64::from(duration_minutes) * 60 - elapsed).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_counts_down_from_anchor() {
        let now = Utc::now();
        let started = now - Duration::seconds(600);
        let remaining = remaining_seconds(60, started, now);
        assert!((remaining - 3000).abs() <= 1);
    }

    #[test]
    fn remaining_is_clamped_at_zero() {
        let now = Utc::now();
        let started = now - Duration::minutes(90);
        assert_eq!(remaining_seconds(60, started, now), 0);
    }

    #[test]
    fn anchor_ahead_of_now_counts_as_negative_elapsed() {
        let now = Utc::now();
        let started = now + Duration::seconds(5);
        assert_eq!(remaining_seconds(1, started, now), 65);
    }

    #[test]
    fn manual_clock_moves_only_when_advanced() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(Duration::seconds(30));
        assert_eq!(clock.now(), start + Duration::seconds(30));
    }
}
