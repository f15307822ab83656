use crate::ebpf::record::Snapshot;

/// Derives a packets-per-second rate from successive snapshots.
///
/// Single writer: the collector task feeds it in timestamp order. A counter
/// reset (producer restart) shows up as a negative packet delta and yields a
/// clamped 0.0 for that observation; the new snapshot still becomes the
/// baseline, so the next tick measures against the restarted producer.
#[derive(Debug, Default)]
pub struct RateTracker {
    previous: Option<Snapshot>,
}

impl RateTracker {
    pub fn new() -> Self {
        Self { previous: None }
    }

    /// Fold in a snapshot and return the packets/second rate since the
    /// previous one. Always >= 0; the first call establishes the baseline
    /// and returns 0.0.
    pub fn update(&mut self, snapshot: Snapshot) -> f64 {
        let rate = match self.previous {
            None => 0.0,
            Some(prev) => {
                // duration_since errs when the clock went backwards; both
                // that and an identical timestamp mean no usable interval.
                let dt = snapshot
                    .taken_at
                    .duration_since(prev.taken_at)
                    .map(|d| d.as_secs_f64())
                    .unwrap_or(0.0);

                if dt <= 0.0 {
                    0.0
                } else {
                    match snapshot
                        .record
                        .total_packets
                        .checked_sub(prev.record.total_packets)
                    {
                        Some(delta) => delta as f64 / dt,
                        // counter reset: clamp instead of reporting negative
                        None => 0.0,
                    }
                }
            }
        };

        self.previous = Some(snapshot);
        rate
    }

    /// Whether at least one snapshot has been observed.
    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ebpf::record::StatsRecord;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    fn snapshot(total_packets: u64, secs: u64) -> Snapshot {
        let record = StatsRecord {
            total_packets,
            ..Default::default()
        };
        Snapshot::at(record, UNIX_EPOCH + Duration::from_secs(secs))
    }

    #[test]
    fn first_update_returns_zero_rate() {
        let mut tracker = RateTracker::new();
        assert_eq!(tracker.update(snapshot(123_456, 10)), 0.0);
        assert!(tracker.has_baseline());
    }

    #[test]
    fn steady_increase_yields_per_second_rates() {
        let mut tracker = RateTracker::new();
        assert_eq!(tracker.update(snapshot(0, 0)), 0.0);
        assert_eq!(tracker.update(snapshot(100, 1)), 100.0);
        assert_eq!(tracker.update(snapshot(250, 2)), 150.0);
    }

    #[test]
    fn counter_reset_clamps_to_zero() {
        let mut tracker = RateTracker::new();
        tracker.update(snapshot(1000, 0));
        assert_eq!(tracker.update(snapshot(50, 1)), 0.0);
        // the reset snapshot became the new baseline
        assert_eq!(tracker.update(snapshot(150, 2)), 100.0);
    }

    #[test]
    fn identical_timestamps_yield_zero_rate() {
        let mut tracker = RateTracker::new();
        tracker.update(snapshot(10, 5));
        let rate = tracker.update(snapshot(10_000, 5));
        assert_eq!(rate, 0.0);
        assert!(rate.is_finite());
    }

    #[test]
    fn backwards_clock_yields_zero_rate() {
        let mut tracker = RateTracker::new();
        tracker.update(snapshot(10, 5));
        assert_eq!(tracker.update(snapshot(10_000, 3)), 0.0);
    }

    #[test]
    fn rates_are_never_negative() {
        let mut tracker = RateTracker::new();
        let totals = [0u64, 500, 300, 300, 1_000_000, 0, 42];
        for (i, total) in totals.into_iter().enumerate() {
            let rate = tracker.update(snapshot(total, i as u64));
            assert!(rate >= 0.0, "negative rate {rate} at step {i}");
        }
    }
}
