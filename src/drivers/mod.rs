// src/drivers/mod.rs
pub mod buffer;
pub mod error;
pub mod source;
pub use buffer::CaptureBuffer;
pub use error::{LumosError, PredictionError};
pub use source::{LineSource, ManualSource, SerialLineSource, SimulatedSource};
