// src/controller.rs
//! Operations the request surface triggers: port discovery, connect,
//! recording and prediction.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::broadcast::{Broadcaster, EventHub};
use crate::config::LumosConfig;
use crate::drivers::{
    CaptureBuffer, LineSource, LumosError, PredictionError, SerialLineSource, SimulatedSource,
};
use crate::engine::{AcquisitionLoop, Sinks};
use crate::prediction::workflow::PredictionContext;
use crate::prediction::{PlaceholderPredictor, PredictionWorkflow, Predictor};
use crate::recorder::RecordingSession;
use crate::types::{DeviceInfo, Event, PredictionKind, PredictionRequest, DEVICE_INFO};

/// Port name that selects the built-in simulated device.
pub const SIMULATED_PORT: &str = "sim";

pub struct DeviceController {
    config: LumosConfig,
    hub: Arc<EventHub>,
    recording: RecordingSession,
    capture: Arc<CaptureBuffer>,
    predictor: Arc<dyn Predictor>,
    link: Mutex<Option<AcquisitionLoop>>,
    connected: Arc<AtomicBool>,
    prediction_busy: Arc<AtomicBool>,
    prediction_cancel: Arc<AtomicBool>,
    prediction_thread: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceController {
    pub fn new(config: LumosConfig) -> Self {
        Self::with_predictor(config, Arc::new(PlaceholderPredictor))
    }

    pub fn with_predictor(config: LumosConfig, predictor: Arc<dyn Predictor>) -> Self {
        Self {
            hub: Arc::new(EventHub::new(config.event_queue_capacity)),
            recording: RecordingSession::new(config.records_dir.clone()),
            capture: Arc::new(CaptureBuffer::new()),
            predictor,
            link: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            prediction_busy: Arc::new(AtomicBool::new(false)),
            prediction_cancel: Arc::new(AtomicBool::new(false)),
            prediction_thread: Mutex::new(None),
            config,
        }
    }

    /// New observer of readings and prediction events.
    pub fn subscribe(&self) -> Receiver<Event> {
        self.hub.subscribe()
    }

    pub fn device_info(&self) -> &'static DeviceInfo {
        &DEVICE_INFO
    }

    pub fn list_ports(&self) -> Result<Vec<String>, LumosError> {
        let ports = serialport::available_ports()?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Opens `port` (or the simulated device) and starts acquisition. On
    /// failure the current link, if any, is left untouched.
    pub fn connect(&self, port: &str) -> Result<(), LumosError> {
        let source: Box<dyn LineSource> = if port == SIMULATED_PORT {
            Box::new(SimulatedSource::new(Duration::from_millis(50)))
        } else {
            Box::new(SerialLineSource::open(
                port,
                self.config.baud_rate,
                self.config.read_timeout(),
            )?)
        };
        self.connect_source(source)
    }

    /// Starts acquisition on an already opened source, replacing any
    /// running link. The old link is only stopped once the new loop is up.
    pub fn connect_source(&self, source: Box<dyn LineSource>) -> Result<(), LumosError> {
        let sinks = Sinks {
            events: Arc::clone(&self.hub) as Arc<dyn Broadcaster>,
            recording: self.recording.buffer(),
            capture: Arc::clone(&self.capture),
        };
        let mut link = self.link.lock();
        let acquisition = AcquisitionLoop::spawn(source, sinks, self.config.poll_interval())?;
        log::info!("Connected to {}", acquisition.source_name());
        if let Some(mut old) = link.replace(acquisition) {
            log::info!("Replaced link to {}", old.source_name());
            old.stop();
        }
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    pub fn disconnect(&self) {
        let mut link = self.link.lock();
        self.connected.store(false, Ordering::Release);
        if let Some(mut acquisition) = link.take() {
            acquisition.stop();
            log::info!("Disconnected from {}", acquisition.source_name());
        }
    }

    /// Returns the number of unsaved lines discarded by a restart.
    pub fn start_recording(&self) -> usize {
        self.recording.start()
    }

    pub fn stop_recording(&self) -> Result<Option<PathBuf>, LumosError> {
        Ok(self.recording.stop_and_save()?)
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_recording()
    }

    /// Launches a prediction run in the background. A request made while a
    /// run is in flight is rejected and observers get a failure event.
    pub fn start_prediction(&self, kind: PredictionKind) -> PredictionRequest {
        if self
            .prediction_busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::warn!("Rejected {kind} prediction: another run is in flight");
            self.hub.publish(Event::PredictionResult {
                kind,
                ok: false,
                file_path: None,
                result: None,
                error: Some(PredictionError::AlreadyRunning.to_string()),
            });
            return PredictionRequest::Rejected;
        }
        self.prediction_cancel.store(false, Ordering::Release);

        let ctx = PredictionContext {
            capture: Arc::clone(&self.capture),
            events: Arc::clone(&self.hub) as Arc<dyn Broadcaster>,
            predictor: Arc::clone(&self.predictor),
            connected: Arc::clone(&self.connected),
            cancel: Arc::clone(&self.prediction_cancel),
            output_dir: self.config.predictions_dir.clone(),
            timing: self.config.workflow.clone(),
        };
        let guard = RunGuard {
            kind,
            busy: Arc::clone(&self.prediction_busy),
            capture: Arc::clone(&self.capture),
            hub: Arc::clone(&self.hub),
        };
        let spawned = thread::Builder::new()
            .name(format!("predict-{kind}"))
            .spawn(move || {
                let _guard = guard;
                let _ = PredictionWorkflow::new(kind, ctx).run();
            });

        match spawned {
            Ok(handle) => {
                *self.prediction_thread.lock() = Some(handle);
                PredictionRequest::Accepted
            }
            Err(e) => {
                log::error!("Failed to start prediction thread: {e}");
                self.prediction_busy.store(false, Ordering::Release);
                self.hub.publish(Event::PredictionResult {
                    kind,
                    ok: false,
                    file_path: None,
                    result: None,
                    error: Some(e.to_string()),
                });
                PredictionRequest::Rejected
            }
        }
    }

    pub fn is_predicting(&self) -> bool {
        self.prediction_busy.load(Ordering::Acquire)
    }

    /// Asks the running prediction to stop at its next tick or stage.
    pub fn cancel_prediction(&self) {
        if self.is_predicting() {
            log::info!("Cancelling prediction");
            self.prediction_cancel.store(true, Ordering::Release);
        }
    }

    /// Blocks until the most recently started prediction thread finishes.
    pub fn wait_for_prediction(&self) {
        let handle = self.prediction_thread.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Prediction thread panicked");
            }
        }
    }
}

/// Frees the single prediction slot when a run thread exits, including by
/// panic. A panicking run still gets its terminal failure event.
struct RunGuard {
    kind: PredictionKind,
    busy: Arc<AtomicBool>,
    capture: Arc<CaptureBuffer>,
    hub: Arc<EventHub>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            log::error!("Prediction {} aborted by a panic", self.kind);
            self.capture.stop_and_take();
            self.hub.publish(Event::PredictionResult {
                kind: self.kind,
                ok: false,
                file_path: None,
                result: None,
                error: Some("prediction aborted".to_string()),
            });
        }
        self.busy.store(false, Ordering::Release);
    }
}

impl Drop for DeviceController {
    fn drop(&mut self) {
        self.cancel_prediction();
        self.wait_for_prediction();
        self.disconnect();
    }
}
