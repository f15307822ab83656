pub mod collector;
pub mod exporter;
pub mod rate;

pub use collector::StatsCollector;
pub use exporter::{OtlpExporter, PublishedStats, SharedStats};
pub use rate::RateTracker;
