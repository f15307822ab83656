pub mod bpftool;
pub mod record;
pub mod source;

pub use record::{Snapshot, StatsRecord, RECORD_SIZE};
pub use source::{JsonDumpSource, MapRef, StatsSource, TextDumpSource};
