use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Unix epoch milliseconds. Signed so that malformed (negative) input is representable.
pub type Millis = i64;

/// Driver cadence for deadline checks and event draining.
pub const TICK_MS: u64 = 250;

pub const MS_PER_SEC: Millis = 1_000;

/// Source of "now" for the engine. Injected so tests can move time by hand.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> Millis;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: Millis) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start)),
        }
    }

    pub fn set(&self, at: Millis) {
        self.now.store(at, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Millis) {
        self.now.fetch_add(by, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}

/// Hour of day (fractional) and weekday (Monday = 0) at `ts`, shifted by `utc_offset_minutes`.
pub fn local_hour_weekday(ts: Millis, utc_offset_minutes: i32) -> (f32, u32) {
    use chrono::{Datelike, Timelike};

    let shifted = ts.saturating_add(utc_offset_minutes as Millis * 60 * MS_PER_SEC);
    match chrono::DateTime::<chrono::Utc>::from_timestamp_millis(shifted) {
        Some(at) => (
            at.hour() as f32 + at.minute() as f32 / 60.0,
            at.weekday().num_days_from_monday(),
        ),
        None => (0.0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(1_000);
        let other = clock.clone();
        clock.advance(500);
        assert_eq!(other.now_ms(), 1_500);
        other.set(10);
        assert_eq!(clock.now_ms(), 10);
    }

    #[test]
    fn hour_and_weekday_follow_offset() {
        // 1970-01-01 was a Thursday.
        let (hour, weekday) = local_hour_weekday(0, 0);
        assert_eq!(hour, 0.0);
        assert_eq!(weekday, 3);

        let (hour, weekday) = local_hour_weekday(0, -60);
        assert_eq!(hour, 23.0);
        assert_eq!(weekday, 2);
    }
}
