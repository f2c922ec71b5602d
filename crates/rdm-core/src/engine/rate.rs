//! Per-route throughput tracking.
//!
//! Two metrics are kept from the same byte counts and never reconciled:
//! the route-level smoothed speed (the only input to worst/best route
//! selection) and the per-segment rolling display speed.

use dashmap::DashMap;
use std::collections::VecDeque;

/// Route-level smoothed speed table, keyed by route id. Shared by every
/// segment worker of one invocation; entries are updated per key, so
/// unrelated segments' ticks do not serialize on a table-wide lock.
#[derive(Debug, Default)]
pub(crate) struct RateTable {
    speeds: DashMap<String, u64>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a route at zero so it participates in comparisons from the start.
    pub fn track(&self, id: &str) {
        self.speeds.entry(id.to_string()).or_insert(0);
    }

    /// Fold in a positive sample: the first sample is taken as-is, later
    /// samples average with the prior value. Ticks with zero new bytes must
    /// not call this; a stalled route keeps its last known speed.
    pub fn record(&self, id: &str, sample: u64) {
        let mut entry = self.speeds.entry(id.to_string()).or_insert(0);
        *entry = if *entry == 0 {
            sample
        } else {
            (*entry + sample) / 2
        };
    }

    /// Smoothed speed for a route; 0 when untracked.
    pub fn speed(&self, id: &str) -> u64 {
        self.speeds.get(id).map(|v| *v).unwrap_or(0)
    }

    /// Snapshot of all (route id, speed) entries for selection scans.
    /// Connection counts are tens, not thousands; an O(K) copy per check
    /// is acceptable.
    pub fn entries(&self) -> Vec<(String, u64)> {
        self.speeds
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }
}

/// Rolling average of the last five one-second byte counts. Display-only;
/// reset at the start of every attempt.
#[derive(Debug, Default)]
pub(crate) struct RollingSpeed {
    window: VecDeque<u64>,
}

impl RollingSpeed {
    const WINDOW: usize = 5;

    pub fn new() -> Self {
        Self::default()
    }

    /// Push this tick's byte count and return the new average.
    pub fn push(&mut self, sample: u64) -> u64 {
        if self.window.len() == Self::WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(sample);
        let sum: u64 = self.window.iter().sum();
        sum / self.window.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_taken_as_is() {
        let rates = RateTable::new();
        rates.track("if:10.0.0.1");
        assert_eq!(rates.speed("if:10.0.0.1"), 0);
        rates.record("if:10.0.0.1", 1000);
        assert_eq!(rates.speed("if:10.0.0.1"), 1000);
    }

    #[test]
    fn later_samples_average_with_prior() {
        let rates = RateTable::new();
        rates.record("socks:127.0.0.1:9050", 1000);
        rates.record("socks:127.0.0.1:9050", 500);
        assert_eq!(rates.speed("socks:127.0.0.1:9050"), 750);
        rates.record("socks:127.0.0.1:9050", 250);
        assert_eq!(rates.speed("socks:127.0.0.1:9050"), 500);
    }

    #[test]
    fn untracked_route_reads_zero() {
        let rates = RateTable::new();
        assert_eq!(rates.speed("if:nope"), 0);
        assert!(rates.entries().is_empty());
    }

    #[test]
    fn rolling_speed_averages_window() {
        let mut rolling = RollingSpeed::new();
        assert_eq!(rolling.push(100), 100);
        assert_eq!(rolling.push(300), 200);
    }

    #[test]
    fn rolling_speed_drops_oldest_after_five() {
        let mut rolling = RollingSpeed::new();
        for _ in 0..5 {
            rolling.push(100);
        }
        // Window is [100; 5]; a burst of 600 evicts one 100.
        assert_eq!(rolling.push(600), 200);
    }
}
