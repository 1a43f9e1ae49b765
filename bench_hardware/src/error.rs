use thiserror::Error;

/// Serial link failures surfaced to the worker.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("serial write failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("serial read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to enumerate ports: {0}")]
    Enumerate(#[source] serialport::Error),
}
