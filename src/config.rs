// src/config.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Baud rate the firmware talks at.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LumosConfig {
    pub baud_rate: u32,
    /// Upper bound on a blocking serial read.
    pub read_timeout_ms: u64,
    /// Pause between polls when no complete line is waiting.
    pub poll_interval_ms: u64,
    pub records_dir: PathBuf,
    pub predictions_dir: PathBuf,
    /// Per-observer queue length before events are dropped.
    pub event_queue_capacity: usize,
    pub workflow: WorkflowTiming,
}

impl Default for LumosConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: 100,
            poll_interval_ms: 5,
            records_dir: PathBuf::from("Lumos_Records"),
            predictions_dir: PathBuf::from("Lumos_Predictions"),
            event_queue_capacity: 1024,
            workflow: WorkflowTiming::default(),
        }
    }
}

impl LumosConfig {
    /// Reads a JSON config file; missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Pacing of a prediction run. Only the capture window is a real measurement;
/// the stage delays are presentation.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WorkflowTiming {
    pub capture_seconds: u32,
    pub tick_ms: u64,
    pub stage_delay_ms: u64,
    pub final_stage_delay_ms: u64,
}

impl Default for WorkflowTiming {
    fn default() -> Self {
        Self {
            capture_seconds: 60,
            tick_ms: 1000,
            stage_delay_ms: 600,
            final_stage_delay_ms: 200,
        }
    }
}

impl WorkflowTiming {
    /// Same sequence of events with no waiting.
    pub fn instant() -> Self {
        Self {
            tick_ms: 0,
            stage_delay_ms: 0,
            final_stage_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn stage_delay(&self, is_last: bool) -> Duration {
        Duration::from_millis(if is_last {
            self.final_stage_delay_ms
        } else {
            self.stage_delay_ms
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "records_dir": "out/rec", "workflow": {{ "tick_ms": 10 }} }}"#
        )
        .unwrap();
        let config = LumosConfig::load(file.path()).unwrap();
        assert_eq!(config.records_dir, PathBuf::from("out/rec"));
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.workflow.tick_ms, 10);
        assert_eq!(config.workflow.capture_seconds, 60);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(LumosConfig::load(file.path()).is_err());
    }

    #[test]
    fn last_stage_uses_short_delay() {
        let timing = WorkflowTiming::default();
        assert_eq!(timing.stage_delay(false), Duration::from_millis(600));
        assert_eq!(timing.stage_delay(true), Duration::from_millis(200));
    }
}
