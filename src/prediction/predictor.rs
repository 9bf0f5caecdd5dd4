use ndarray::Array2;

use crate::parser::parse_line;
use crate::types::{PredictionKind, PredictionResult, CHANNEL_COUNT};

/// Maps a captured window of raw lines to a labeled estimate.
///
/// Implementations must be pure and must not fail: input with no parseable
/// lines yields a result whose `value` is `None`.
pub trait Predictor: Send + Sync {
    fn predict(&self, kind: PredictionKind, raw_lines: &[String]) -> PredictionResult;
}

/// Largest value a channel can report.
const FULL_SCALE: f64 = 65_535.0;

/// Stand-in model: the mean of every channel value, scaled linearly into
/// the display range of the requested kind.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaceholderPredictor;

struct DisplayRange {
    low: f64,
    high: f64,
    decimals: i32,
    unit: &'static str,
}

impl DisplayRange {
    fn for_kind(kind: PredictionKind) -> Self {
        match kind {
            PredictionKind::Lactate => DisplayRange {
                low: 0.5,
                high: 20.0,
                decimals: 2,
                unit: "mmol/L",
            },
            PredictionKind::SkinTone => DisplayRange {
                low: 1.0,
                high: 6.0,
                decimals: 1,
                unit: "Fitzpatrick",
            },
        }
    }

    fn map(&self, normalized: f64) -> f64 {
        let value = self.low + normalized.clamp(0.0, 1.0) * (self.high - self.low);
        let scale = 10f64.powi(self.decimals);
        (value * scale).round() / scale
    }
}

/// Stacks the channel values of every parseable line into a samples x
/// channels matrix.
fn channel_matrix(raw_lines: &[String]) -> Array2<f64> {
    let rows: Vec<f64> = raw_lines
        .iter()
        .filter_map(|line| parse_line(line))
        .flat_map(|r| r.readings.map(|v| v as f64))
        .collect();
    let samples = rows.len() / CHANNEL_COUNT;
    Array2::from_shape_vec((samples, CHANNEL_COUNT), rows)
        .unwrap_or_else(|_| Array2::zeros((0, CHANNEL_COUNT)))
}

impl Predictor for PlaceholderPredictor {
    fn predict(&self, kind: PredictionKind, raw_lines: &[String]) -> PredictionResult {
        let range = DisplayRange::for_kind(kind);
        let matrix = channel_matrix(raw_lines);
        let Some(mean) = matrix.mean() else {
            return PredictionResult {
                value: None,
                unit: range.unit.to_string(),
                note: "no valid data".to_string(),
            };
        };
        PredictionResult {
            value: Some(range.map(mean / FULL_SCALE)),
            unit: range.unit.to_string(),
            note: format!("placeholder estimate from {} samples", matrix.nrows()),
        }
    }
}
