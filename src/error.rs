use thiserror::Error;

/// Failure interpreting the raw bytes of a counter record.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("stats record too short: got {len} bytes, need at least 64")]
    TooShort { len: usize },
}

/// Failure obtaining the raw counter record from the kernel.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("BPF map not found: {0}")]
    NotFound(String),

    #[error("bpftool {operation} failed: {detail}")]
    ToolFailure {
        operation: &'static str,
        detail: String,
    },

    #[error("unexpected bpftool output: {0}")]
    MalformedOutput(String),
}

#[derive(Error, Debug)]
pub enum XdpMeterError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("metrics error: {0}")]
    Metrics(#[from] opentelemetry::metrics::MetricsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, XdpMeterError>;
