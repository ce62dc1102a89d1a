//! Small numeric and logging helpers shared across the crate.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Utc;
use log::Level;

/// Tolerance used when comparing prices for equality.
pub const EPSILON: f64 = 1e-12;

/// Round `value` to `decimals` places (half away from zero).
pub fn round_to_decimals(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Difference between two prices in basis points of `reference`.
pub fn bps_diff(reference: f64, other: f64) -> f64 {
    if reference == 0.0 {
        return 0.0;
    }
    (other - reference) / reference * 10_000.0
}

/// Wall clock in milliseconds since the epoch.
pub fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

pub fn prices_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON * a.abs().max(b.abs()).max(1.0)
}

/// Rate limiter for log lines keyed by a tag.
///
/// The first message for a tag is always emitted; later ones are dropped until
/// `interval` has elapsed. Suppressed messages are counted and reported with the
/// next emitted line for the same tag.
#[derive(Debug, Default)]
pub struct LogThrottle {
    entries: Mutex<HashMap<String, ThrottleEntry>>,
}

#[derive(Debug)]
struct ThrottleEntry {
    last: Instant,
    suppressed: u64,
}

impl LogThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Some(suppressed_count)` when a line for `tag` may be emitted now.
    pub fn should_log(&self, tag: &str, interval: Duration) -> Option<u64> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        match entries.get_mut(tag) {
            Some(entry) if now.duration_since(entry.last) < interval => {
                entry.suppressed += 1;
                None
            }
            Some(entry) => {
                let suppressed = entry.suppressed;
                entry.last = now;
                entry.suppressed = 0;
                Some(suppressed)
            }
            None => {
                entries.insert(
                    tag.to_string(),
                    ThrottleEntry {
                        last: now,
                        suppressed: 0,
                    },
                );
                Some(0)
            }
        }
    }

    /// Throttled log: emits `msg` at `level` at most once per `interval` for `tag`.
    pub fn tlog(&self, tag: &str, level: Level, interval: Duration, msg: &str) -> bool {
        match self.should_log(tag, interval) {
            Some(0) => {
                log::log!(level, "[{}] {}", tag, msg);
                true
            }
            Some(suppressed) => {
                log::log!(level, "[{}] {} ({} similar suppressed)", tag, msg, suppressed);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_decimals() {
        assert_eq!(round_to_decimals(1.23456, 2), 1.23);
        assert_eq!(round_to_decimals(1.235001, 2), 1.24);
        assert_eq!(round_to_decimals(99.999, 0), 100.0);
    }

    #[test]
    fn test_bps_diff() {
        assert!((bps_diff(100.0, 101.0) - 100.0).abs() < 1e-9);
        assert!((bps_diff(100.0, 99.5) + 50.0).abs() < 1e-9);
        assert_eq!(bps_diff(0.0, 1.0), 0.0);
    }

    #[test]
    fn test_prices_equal() {
        assert!(prices_equal(1.0, 1.0 + 1e-15));
        assert!(!prices_equal(1.0, 1.0001));
    }

    #[test]
    fn test_log_throttle_suppresses_within_interval() {
        let throttle = LogThrottle::new();
        let interval = Duration::from_secs(60);
        assert!(throttle.tlog("stale", Level::Warn, interval, "first"));
        assert!(!throttle.tlog("stale", Level::Warn, interval, "second"));
        assert!(!throttle.tlog("stale", Level::Warn, interval, "third"));
        // Independent tags do not share a window
        assert!(throttle.tlog("anomaly", Level::Warn, interval, "other"));
    }

    #[test]
    fn test_log_throttle_reports_suppressed_count() {
        let throttle = LogThrottle::new();
        assert_eq!(throttle.should_log("tag", Duration::ZERO), Some(0));
        assert_eq!(throttle.should_log("tag", Duration::ZERO), Some(0));

        let long = Duration::from_secs(3600);
        assert_eq!(throttle.should_log("slow", long), Some(0));
        assert_eq!(throttle.should_log("slow", long), None);
        assert_eq!(throttle.should_log("slow", long), None);
    }
}
