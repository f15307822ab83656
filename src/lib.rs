pub mod cli;
pub mod config;
pub mod ebpf;
pub mod error;
pub mod metrics;

pub use error::{Result, XdpMeterError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
