//! Coalescing throttle for gesture-driven recomputes.
//!
//! At most one payload is released per interval. Payloads arriving inside the
//! interval replace the pending one instead of queueing behind it.

use instant::Instant;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Minimum spacing between two gesture recomputes
    pub gesture_interval_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            gesture_interval_ms: 120,
        }
    }
}

impl ThrottleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.gesture_interval_ms)
    }
}

#[derive(Debug, Clone)]
pub struct GestureThrottle<P> {
    interval: Duration,
    pending: Option<P>,
    last_run: Option<Instant>,
}

impl<P> GestureThrottle<P> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: None,
            last_run: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    fn interval_elapsed(&self, now: Instant) -> bool {
        match self.last_run {
            None => true,
            Some(last) => now.checked_duration_since(last).map_or(false, |d| d >= self.interval),
        }
    }

    /// Offers a payload. Returns it right away if the interval has passed,
    /// otherwise keeps it as the pending payload, superseding any earlier one.
    pub fn schedule(&mut self, payload: P, now: Instant) -> Option<P> {
        if self.interval_elapsed(now) {
            self.pending = None;
            self.last_run = Some(now);
            return Some(payload);
        }
        if self.pending.replace(payload).is_some() {
            log::trace!("gesture payload superseded");
        }
        None
    }

    /// Releases the pending payload once its deadline has passed
    pub fn poll(&mut self, now: Instant) -> Option<P> {
        if self.pending.is_some() && self.interval_elapsed(now) {
            self.last_run = Some(now);
            return self.pending.take();
        }
        None
    }

    /// Releases the pending payload immediately, e.g. when the gesture ends
    pub fn flush(&mut self, now: Instant) -> Option<P> {
        let payload = self.pending.take();
        if payload.is_some() {
            self.last_run = Some(now);
        }
        payload
    }

    /// Drops the pending payload
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending payload becomes due, for hosts that drive a timer
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref()?;
        Some(self.last_run.map_or_else(Instant::now, |last| last + self.interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_payload_runs_immediately() {
        let mut throttle = GestureThrottle::new(Duration::from_millis(100));
        let t0 = Instant::now();
        assert_eq!(throttle.schedule(1, t0), Some(1));
        assert!(!throttle.has_pending());
    }

    #[test]
    fn test_payloads_coalesce() {
        let mut throttle = GestureThrottle::new(Duration::from_millis(100));
        let t0 = Instant::now();
        throttle.schedule(1, t0);
        assert_eq!(throttle.schedule(2, t0 + Duration::from_millis(10)), None);
        assert_eq!(throttle.schedule(3, t0 + Duration::from_millis(20)), None);
        assert_eq!(throttle.deadline(), Some(t0 + Duration::from_millis(100)));

        assert_eq!(throttle.poll(t0 + Duration::from_millis(50)), None);
        assert_eq!(throttle.poll(t0 + Duration::from_millis(100)), Some(3));
        assert_eq!(throttle.poll(t0 + Duration::from_millis(300)), None);
    }

    #[test]
    fn test_flush_and_cancel() {
        let mut throttle = GestureThrottle::new(Duration::from_millis(100));
        let t0 = Instant::now();
        throttle.schedule("a", t0);
        throttle.schedule("b", t0 + Duration::from_millis(5));
        assert_eq!(throttle.flush(t0 + Duration::from_millis(6)), Some("b"));

        throttle.schedule("c", t0 + Duration::from_millis(7));
        assert!(throttle.cancel());
        assert!(throttle.deadline().is_none());
        assert_eq!(throttle.poll(t0 + Duration::from_secs(1)), None);
    }
}
