use std::io;
use thiserror::Error;
#[derive(Debug, Error)]
pub enum LumosError {
    #[error("failed to open serial port {port}: {source}")]
    Connection {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("serial read failed: {0}")]
    Read(#[source] io::Error),
    #[error("unknown prediction kind: {0}")]
    UnknownPrediction(String),
    #[error("failed to list serial ports: {0}")]
    PortScan(#[from] serialport::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}
/// Terminal failure reasons for a prediction run. The display text is what
/// observers see in the failure event.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("not connected")]
    NotConnected,
    #[error("prediction already running")]
    AlreadyRunning,
    #[error("no data captured")]
    NoData,
    #[error("cancelled")]
    Cancelled,
    #[error("failed to save capture: {0}")]
    Persist(#[from] io::Error),
}
