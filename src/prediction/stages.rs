//! Fixed progress scripts shown while a prediction runs. Stage 0 is
//! displayed for the whole capture window; the last stage is always
//! "Complete".

use crate::types::PredictionKind;

const LACTATE_STAGES: [&str; 10] = [
    "Capturing optical signal",
    "Filtering ambient light",
    "Normalizing LED channels",
    "Extracting absorbance features",
    "Compensating for skin tone",
    "Estimating tissue oxygenation",
    "Running lactate model",
    "Checking signal quality",
    "Finalizing estimate",
    "Complete",
];

const SKIN_TONE_STAGES: [&str; 6] = [
    "Capturing reflectance",
    "Calibrating LED intensities",
    "Measuring melanin index",
    "Classifying skin type",
    "Finalizing estimate",
    "Complete",
];

pub fn stage_labels(kind: PredictionKind) -> &'static [&'static str] {
    match kind {
        PredictionKind::Lactate => &LACTATE_STAGES,
        PredictionKind::SkinTone => &SKIN_TONE_STAGES,
    }
}

/// `round(index / max(total - 1, 1) * 100)`
pub fn percent_complete(index: usize, total: usize) -> u8 {
    let span = total.saturating_sub(1).max(1) as f64;
    ((index as f64 / span) * 100.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_over_ten_stages() {
        assert_eq!(percent_complete(0, 10), 0);
        assert_eq!(percent_complete(1, 10), 11);
        assert_eq!(percent_complete(5, 10), 56);
        assert_eq!(percent_complete(9, 10), 100);
    }

    #[test]
    fn single_stage_does_not_divide_by_zero() {
        assert_eq!(percent_complete(0, 1), 0);
        assert_eq!(percent_complete(1, 1), 100);
    }

    #[test]
    fn every_script_ends_with_complete() {
        for kind in [PredictionKind::Lactate, PredictionKind::SkinTone] {
            let labels = stage_labels(kind);
            assert!(labels.len() >= 2);
            assert_eq!(labels.last(), Some(&"Complete"));
        }
        assert_eq!(stage_labels(PredictionKind::Lactate).len(), 10);
    }
}
