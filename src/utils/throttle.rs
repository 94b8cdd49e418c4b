//! Rate-limited logging gate
//!
//! Startup legitimately fails the same way for many seconds in a row; a
//! [`LogThrottle`] lets one line per key through per interval.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Per-key log gate
#[derive(Debug)]
pub struct LogThrottle {
    interval: Duration,
    last: Mutex<HashMap<&'static str, Instant>>,
}

impl LogThrottle {
    /// Allow one line per key every `interval`
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a line for `key` may be emitted now; records the emission
    pub fn allow(&self, key: &'static str) -> bool {
        self.allow_at(key, Instant::now())
    }

    fn allow_at(&self, key: &'static str, now: Instant) -> bool {
        let mut last = self.last.lock();
        match last.get(key) {
            Some(&at) if now.saturating_duration_since(at) < self.interval => false,
            _ => {
                last.insert(key, now);
                true
            }
        }
    }

    /// Forget every key, so the next failure of each kind is logged
    pub fn reset(&self) {
        self.last.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_line_per_interval() {
        let throttle = LogThrottle::new(Duration::from_secs(5));
        let start = Instant::now();

        assert!(throttle.allow_at("not_ready", start));
        assert!(!throttle.allow_at("not_ready", start + Duration::from_secs(1)));
        assert!(!throttle.allow_at("not_ready", start + Duration::from_millis(4999)));
        assert!(throttle.allow_at("not_ready", start + Duration::from_secs(5)));
    }

    #[test]
    fn test_keys_are_independent() {
        let throttle = LogThrottle::new(Duration::from_secs(5));
        let start = Instant::now();

        assert!(throttle.allow_at("a", start));
        assert!(throttle.allow_at("b", start));
        assert!(!throttle.allow_at("a", start));
    }

    #[test]
    fn test_reset() {
        let throttle = LogThrottle::new(Duration::from_secs(60));
        assert!(throttle.allow("a"));
        assert!(!throttle.allow("a"));
        throttle.reset();
        assert!(throttle.allow("a"));
    }
}
