use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::broadcast::Broadcaster;
use crate::config::WorkflowTiming;
use crate::drivers::{CaptureBuffer, PredictionError};
use crate::prediction::stages::{percent_complete, stage_labels};
use crate::prediction::Predictor;
use crate::recorder::save_lines;
use crate::types::{Event, PredictionKind, PredictionResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PredictionState {
    Idle,
    Announced,
    Capturing,
    Staging(usize),
    Completed,
    Failed,
}

/// Outcome of a successful run.
#[derive(Clone, Debug, PartialEq)]
pub struct PredictionReport {
    pub kind: PredictionKind,
    pub file_path: PathBuf,
    pub result: PredictionResult,
}

/// Shared handles a run needs from the owning controller.
#[derive(Clone)]
pub struct PredictionContext {
    pub capture: Arc<CaptureBuffer>,
    pub events: Arc<dyn Broadcaster>,
    pub predictor: Arc<dyn Predictor>,
    pub connected: Arc<AtomicBool>,
    pub cancel: Arc<AtomicBool>,
    pub output_dir: PathBuf,
    pub timing: WorkflowTiming,
}

/// One prediction run: announce, capture a fixed window, walk the staged
/// progress script, then predict.
///
/// Every run ends with exactly one `PredictionResult` event, success or
/// failure.
pub struct PredictionWorkflow {
    kind: PredictionKind,
    ctx: PredictionContext,
    state: PredictionState,
}

impl PredictionWorkflow {
    pub fn new(kind: PredictionKind, ctx: PredictionContext) -> Self {
        Self {
            kind,
            ctx,
            state: PredictionState::Idle,
        }
    }

    pub fn state(&self) -> PredictionState {
        self.state
    }

    /// Runs to completion on the calling thread.
    pub fn run(&mut self) -> Result<PredictionReport, PredictionError> {
        let outcome = self.execute();
        let event = match &outcome {
            Ok(report) => Event::PredictionResult {
                kind: self.kind,
                ok: true,
                file_path: Some(report.file_path.clone()),
                result: Some(report.result.clone()),
                error: None,
            },
            Err(e) => {
                self.transition(PredictionState::Failed);
                log::warn!("Prediction {} failed: {e}", self.kind);
                Event::PredictionResult {
                    kind: self.kind,
                    ok: false,
                    file_path: None,
                    result: None,
                    error: Some(e.to_string()),
                }
            }
        };
        self.ctx.events.publish(event);
        outcome
    }

    fn execute(&mut self) -> Result<PredictionReport, PredictionError> {
        if !self.ctx.connected.load(Ordering::Acquire) {
            return Err(PredictionError::NotConnected);
        }
        let labels = stage_labels(self.kind);
        let total = labels.len();

        self.transition(PredictionState::Announced);
        self.emit_progress(0);

        self.transition(PredictionState::Capturing);
        let lines = self.capture_window()?;
        if lines.is_empty() {
            return Err(PredictionError::NoData);
        }
        let file_path = save_lines(&self.ctx.output_dir, self.kind.file_prefix(), &lines)?;
        log::info!(
            "Prediction capture saved: {} ({} lines)",
            file_path.display(),
            lines.len()
        );

        for index in 1..total {
            self.check_cancel()?;
            thread::sleep(self.ctx.timing.stage_delay(index == total - 1));
            self.transition(PredictionState::Staging(index));
            self.emit_progress(index);
        }

        self.check_cancel()?;
        let result = self.ctx.predictor.predict(self.kind, &lines);
        self.transition(PredictionState::Completed);
        Ok(PredictionReport {
            kind: self.kind,
            file_path,
            result,
        })
    }

    /// Collects raw lines for the configured window, ticking once a second.
    /// The buffer is inactive again on every exit path.
    fn capture_window(&mut self) -> Result<Vec<String>, PredictionError> {
        let seconds_total = self.ctx.timing.capture_seconds;
        self.ctx.capture.start();
        for seconds_elapsed in 1..=seconds_total {
            if let Err(e) = self.check_cancel() {
                self.ctx.capture.stop_and_take();
                return Err(e);
            }
            thread::sleep(self.ctx.timing.tick());
            self.ctx.events.publish(Event::PredictionCaptureTick {
                kind: self.kind,
                seconds_elapsed,
                seconds_total,
            });
        }
        Ok(self.ctx.capture.stop_and_take())
    }

    fn check_cancel(&self) -> Result<(), PredictionError> {
        if self.ctx.cancel.load(Ordering::Acquire) {
            Err(PredictionError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn emit_progress(&self, stage_index: usize) {
        let labels = stage_labels(self.kind);
        let percent = percent_complete(stage_index, labels.len());
        log::info!(
            "Prediction {} stage {}/{}: {} ({percent}%)",
            self.kind,
            stage_index + 1,
            labels.len(),
            labels[stage_index]
        );
        self.ctx.events.publish(Event::PredictionProgress {
            kind: self.kind,
            stage_index,
            total_stages: labels.len(),
            label: labels[stage_index].to_string(),
            percent,
        });
    }

    fn transition(&mut self, next: PredictionState) {
        log::debug!("Prediction {}: {:?} -> {:?}", self.kind, self.state, next);
        self.state = next;
    }
}
