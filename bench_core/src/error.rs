use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum WorkerError {
    #[error("connection fault: {0}")]
    ConnectionFault(String),
    #[error("telemetry decode failed: {0}")]
    Decode(String),
    #[error("cyclogram load failed: {0}")]
    CycleLoad(String),
    #[error("no cyclogram data for the selected mode")]
    CycleDataMissing,
    #[error("log export failed: {0}")]
    Export(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing port opener")]
    MissingPortOpener,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
