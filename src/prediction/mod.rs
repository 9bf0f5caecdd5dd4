// src/prediction/mod.rs
pub mod predictor;
pub mod stages;
pub mod workflow;

pub use predictor::{PlaceholderPredictor, Predictor};
pub use stages::{percent_complete, stage_labels};
pub use workflow::{PredictionReport, PredictionState, PredictionWorkflow};
