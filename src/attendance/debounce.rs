//! Duplicate-scan suppression.
//!
//! A badge held in front of the camera is decoded on every frame. The
//! gate lets the first read through and drops repeats of the same
//! identifier until the cooldown window has passed.

use super::Identifier;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

/// Entry count above which stale entries are swept on insert.
const SWEEP_THRESHOLD: usize = 256;

/// Per-identifier cooldown gate.
#[derive(Debug, Clone)]
pub struct DebounceGate {
    window: Duration,
    last_accepted: HashMap<Identifier, DateTime<Utc>>,
}

impl DebounceGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: HashMap::new(),
        }
    }

    /// Returns the cooldown window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns true and records `now` if `identifier` has not been
    /// accepted within the window around `now`.
    ///
    /// The distance is absolute, so a timestamp slightly behind the last
    /// acceptance is still a duplicate.
    pub fn accept(&mut self, identifier: &Identifier, now: DateTime<Utc>) -> bool {
        if let Some(&last) = self.last_accepted.get(identifier) {
            if !self.expired(last, now) {
                tracing::trace!(%identifier, "Scan suppressed by debounce window");
                return false;
            }
        }

        self.mark(identifier, now);
        true
    }

    /// Records `now` as an acceptance of `identifier` without checking
    /// the window.
    pub fn mark(&mut self, identifier: &Identifier, now: DateTime<Utc>) {
        if self.last_accepted.len() >= SWEEP_THRESHOLD {
            self.sweep(now);
        }
        self.last_accepted.insert(identifier.clone(), now);
    }

    /// Drops entries whose window has passed.
    pub fn sweep(&mut self, now: DateTime<Utc>) {
        let window = self.window;
        let before = self.last_accepted.len();
        self.last_accepted
            .retain(|_, &mut last| !is_expired(window, last, now));
        tracing::debug!(
            evicted = before - self.last_accepted.len(),
            remaining = self.last_accepted.len(),
            "Debounce entries swept"
        );
    }

    /// Number of tracked identifiers, stale ones included.
    pub fn len(&self) -> usize {
        self.last_accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_accepted.is_empty()
    }

    fn expired(&self, last: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        is_expired(self.window, last, now)
    }
}

fn is_expired(window: Duration, last: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let distance = u128::from((now - last).num_milliseconds().unsigned_abs());
    distance >= window.as_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    #[test]
    fn test_cooldown_scenario() {
        let mut gate = DebounceGate::new(Duration::from_secs(5));
        assert!(gate.accept(&id("123"), at(0)));
        assert!(!gate.accept(&id("123"), at(3)));
        assert!(gate.accept(&id("123"), at(6)));
    }

    #[test]
    fn test_rejected_scan_does_not_extend_window() {
        let mut gate = DebounceGate::new(Duration::from_secs(5));
        assert!(gate.accept(&id("7"), at(0)));
        assert!(!gate.accept(&id("7"), at(4)));
        // Window counts from the accepted scan at t=0, not the rejected one.
        assert!(gate.accept(&id("7"), at(5)));
    }

    #[test]
    fn test_identifiers_independent() {
        let mut gate = DebounceGate::new(Duration::from_secs(5));
        assert!(gate.accept(&id("1"), at(0)));
        assert!(gate.accept(&id("2"), at(1)));
        assert!(!gate.accept(&id("1"), at(2)));
    }

    #[test]
    fn test_earlier_timestamp_within_window_is_duplicate() {
        let mut gate = DebounceGate::new(Duration::from_secs(5));
        assert!(gate.accept(&id("9"), at(10)));
        assert!(!gate.accept(&id("9"), at(8)));
    }

    #[test]
    fn test_mark_starts_window_without_check() {
        let mut gate = DebounceGate::new(Duration::from_secs(5));
        assert!(gate.accept(&id("4"), at(0)));
        gate.mark(&id("4"), at(2));
        assert!(!gate.accept(&id("4"), at(6)));
        assert!(gate.accept(&id("4"), at(7)));
    }

    #[test]
    fn test_sweep_evicts_stale() {
        let mut gate = DebounceGate::new(Duration::from_secs(5));
        gate.accept(&id("1"), at(0));
        gate.accept(&id("2"), at(8));
        gate.sweep(at(10));
        assert_eq!(gate.len(), 1);
        assert!(!gate.accept(&id("2"), at(10)));
        assert!(gate.accept(&id("1"), at(10)));
    }

    #[test]
    fn test_sweep_on_growth() {
        let mut gate = DebounceGate::new(Duration::from_secs(1));
        for i in 0..SWEEP_THRESHOLD {
            gate.accept(&id(&i.to_string()), at(0));
        }
        assert_eq!(gate.len(), SWEEP_THRESHOLD);
        gate.accept(&id("late"), at(60));
        assert_eq!(gate.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_second_scan_within_window_rejected(
            t in 0i64..100_000,
            delta in -4_999i64..5_000,
        ) {
            let mut gate = DebounceGate::new(Duration::from_secs(5));
            let first = Utc.timestamp_millis_opt(t * 1000).unwrap();
            let second = first + chrono::Duration::milliseconds(delta);
            prop_assert!(gate.accept(&id("p"), first));
            prop_assert!(!gate.accept(&id("p"), second));
        }
    }
}
