use crate::ebpf::record::{Snapshot, StatsRecord};
use crate::ebpf::source::StatsSource;
use crate::Result;
use std::time::Duration;
use tokio::signal;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::exporter::{PublishedStats, SharedStats};
use super::rate::RateTracker;

/// Periodic sampling loop: fetch, decode, derive the rate, publish.
///
/// One tick runs to completion before the next begins. Every per-tick
/// failure is logged and swallowed, leaving the previously published values
/// in place; only the next tick tries again.
pub struct StatsCollector {
    source: Box<dyn StatsSource>,
    tracker: RateTracker,
    stats: SharedStats,
    sample_interval: Duration,
}

impl StatsCollector {
    pub fn new(source: Box<dyn StatsSource>, stats: SharedStats, sample_interval: Duration) -> Self {
        Self {
            source,
            tracker: RateTracker::new(),
            stats,
            sample_interval,
        }
    }

    /// Run until Ctrl-C. An in-flight tick always completes before the loop
    /// exits, so shutdown never publishes a half-written sample.
    pub async fn run(mut self) -> Result<()> {
        let mut ticker = time::interval(self.sample_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let ctrl_c = signal::ctrl_c();
        tokio::pin!(ctrl_c);

        info!(
            "collecting from {} every {:?}",
            self.source.describe(),
            self.sample_interval
        );

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sample().await {
                        warn!("tick skipped: {}", e);
                    }
                }
            }
        }

        Ok(())
    }

    /// One collection tick: fetch the raw record, decode it, fold it into
    /// the rate state and publish the result.
    pub async fn sample(&mut self) -> Result<()> {
        let raw = self.source.fetch().await?;
        let record = StatsRecord::decode(&raw)?;

        if !record.consistent() {
            warn!(
                "breakdown counters exceed total_packets ({}): torn or stale map data",
                record.total_packets
            );
        }

        let rate = self.tracker.update(Snapshot::now(record));
        self.publish(record, rate);

        debug!(
            "total={} pkts {} bytes | ipv4={} ipv6={} | tcp={} udp={} icmp={} other={} | rate={:.2} pps",
            record.total_packets,
            record.total_bytes,
            record.ipv4_packets,
            record.ipv6_packets,
            record.tcp_packets,
            record.udp_packets,
            record.icmp_packets,
            record.other_packets,
            rate
        );

        Ok(())
    }

    fn publish(&self, record: StatsRecord, rate: f64) {
        if let Ok(mut stats) = self.stats.write() {
            *stats = PublishedStats { record, rate };
        }
    }

    /// Whether at least one sample has been folded into the rate state.
    pub fn has_baseline(&self) -> bool {
        self.tracker.has_baseline()
    }
}
