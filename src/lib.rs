// src/lib.rs
//! Serial acquisition, raw recording and timed prediction runs for the Lumos
//! optical sensor.
pub mod broadcast;
pub mod config;
pub mod controller;
pub mod drivers;
pub mod engine;
pub mod parser;
pub mod prediction;
pub mod recorder;
pub mod types;

pub use broadcast::{Broadcaster, EventHub};
pub use config::LumosConfig;
pub use controller::DeviceController;
pub use drivers::{LumosError, PredictionError};
pub use parser::parse_line;
pub use types::{Event, PredictionKind, Reading};
