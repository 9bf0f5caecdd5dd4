// src/types.rs
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::drivers::LumosError;

/// Number of raw sensor channels carried by every device line.
pub const CHANNEL_COUNT: usize = 11;

/// One decoded device line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reading {
    /// Device-relative boot timestamp, copied verbatim.
    pub boot_time: String,
    pub readings: [i64; CHANNEL_COUNT],
    #[serde(rename = "led_idx")]
    pub led_index: u32,
    pub intensity: u32,
    pub raw: String,
}

// Which prediction workflow to run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionKind {
    Lactate,
    SkinTone,
}

impl PredictionKind {
    /// Filename prefix for persisted capture windows.
    pub fn file_prefix(self) -> &'static str {
        match self {
            PredictionKind::Lactate => "Lactate",
            PredictionKind::SkinTone => "SkinTone",
        }
    }
}

impl fmt::Display for PredictionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionKind::Lactate => f.write_str("lactate"),
            PredictionKind::SkinTone => f.write_str("skin_tone"),
        }
    }
}

impl FromStr for PredictionKind {
    type Err = LumosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lactate" => Ok(PredictionKind::Lactate),
            "skin_tone" | "skintone" | "skin-tone" => Ok(PredictionKind::SkinTone),
            other => Err(LumosError::UnknownPrediction(other.to_string())),
        }
    }
}

/// Labeled estimate produced by a predictor.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PredictionResult {
    pub value: Option<f64>,
    pub unit: String,
    pub note: String,
}

// Events pushed to every observer
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Event {
    Reading(Reading),
    PredictionProgress {
        kind: PredictionKind,
        stage_index: usize,
        total_stages: usize,
        label: String,
        percent: u8,
    },
    PredictionCaptureTick {
        kind: PredictionKind,
        seconds_elapsed: u32,
        seconds_total: u32,
    },
    PredictionResult {
        kind: PredictionKind,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_path: Option<PathBuf>,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<PredictionResult>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Static device metadata shown by the front end.
#[derive(Clone, Debug, Serialize)]
pub struct DeviceInfo {
    pub programmed: String,
    pub storage: String,
    pub battery: String,
    pub user: String,
    pub id: String,
    pub mfg: String,
    pub sn: String,
}

pub static DEVICE_INFO: Lazy<DeviceInfo> = Lazy::new(|| DeviceInfo {
    programmed: "2024-08-15".to_owned(),
    storage: "512MB".to_owned(),
    battery: "88%".to_owned(),
    user: "Default_User".to_owned(),
    id: "LUMOS-V3".to_owned(),
    mfg: "Lumos Tech".to_owned(),
    sn: "SER-X99".to_owned(),
});

// Answer to a start-prediction request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PredictionRequest {
    Accepted,
    Rejected,
}
