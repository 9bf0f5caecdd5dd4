// src/engine.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::broadcast::Broadcaster;
use crate::drivers::{CaptureBuffer, LineSource};
use crate::parser::parse_line;
use crate::types::Event;

/// Consumers fed by the acquisition loop.
#[derive(Clone)]
pub struct Sinks {
    pub events: Arc<dyn Broadcaster>,
    pub recording: Arc<CaptureBuffer>,
    pub capture: Arc<CaptureBuffer>,
}

/// Background thread that owns an open device link.
pub struct AcquisitionLoop {
    source_name: String,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AcquisitionLoop {
    /// Starts reading from `source` on a dedicated thread.
    pub fn spawn(
        mut source: Box<dyn LineSource>,
        sinks: Sinks,
        poll_interval: Duration,
    ) -> std::io::Result<Self> {
        let source_name = source.name().to_string();
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name(format!("acquire-{source_name}"))
            .spawn(move || {
                log::info!("Acquisition started on {}", source.name());
                let mut faults = FaultLog::default();
                while flag.load(Ordering::Acquire) {
                    match source.read_line() {
                        Ok(Some(line)) => {
                            faults.recovered(source.name());
                            handle_line(&line, &sinks);
                        }
                        Ok(None) => thread::sleep(poll_interval),
                        Err(e) => {
                            faults.record(source.name(), &e);
                            thread::sleep(poll_interval);
                        }
                    }
                }
                log::info!("Acquisition stopped on {}", source.name());
            })?;
        Ok(Self {
            source_name,
            running,
            handle: Some(handle),
        })
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clears the running flag and waits for the thread to notice. Returns
    /// within one read timeout plus one poll interval.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Acquisition thread for {} panicked", self.source_name);
            }
        }
    }
}

impl Drop for AcquisitionLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Consecutive read faults. Only the 1st, 2nd, 4th, 8th, ... of a run are
/// logged so an unplugged port does not flood the log.
#[derive(Debug, Default)]
struct FaultLog {
    consecutive: u64,
}

impl FaultLog {
    /// Returns whether this fault was logged.
    fn record(&mut self, source: &str, err: &dyn std::fmt::Display) -> bool {
        self.consecutive += 1;
        let logged = self.consecutive.is_power_of_two();
        if logged {
            log::warn!(
                "Serial read error on {source} ({} in a row): {err}",
                self.consecutive
            );
        }
        logged
    }

    fn recovered(&mut self, source: &str) {
        if self.consecutive > 0 {
            log::info!("Reads on {source} recovered after {} faults", self.consecutive);
            self.consecutive = 0;
        }
    }
}

fn handle_line(line: &str, sinks: &Sinks) {
    let Some(reading) = parse_line(line) else {
        log::debug!("Skipping unparseable line: {line:?}");
        return;
    };
    sinks.events.publish(Event::Reading(reading));
    sinks.recording.append(line);
    sinks.capture.append(line);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::EventHub;
    use crate::drivers::ManualSource;
    use std::io;
    use std::sync::mpsc::Receiver;

    const GOOD: &str = "00-00-04.094,0,0,0,1,0,0,0,0,0,1,167,[0],1000;";

    fn sinks(hub: &Arc<EventHub>) -> Sinks {
        Sinks {
            events: Arc::clone(hub) as Arc<dyn Broadcaster>,
            recording: Arc::new(CaptureBuffer::new()),
            capture: Arc::new(CaptureBuffer::new()),
        }
    }

    fn next_reading(rx: &Receiver<Event>) -> String {
        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            Event::Reading(r) => r.boot_time,
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn broadcasts_valid_lines_in_order_and_skips_faults() {
        let hub = Arc::new(EventHub::new(64));
        let rx = hub.subscribe();
        let source = ManualSource::with_script(vec![
            Ok(GOOD.replace("00-00-04.094", "a").into_bytes()),
            Ok(b"garbage\n".to_vec()),
            Err(io::Error::new(io::ErrorKind::Other, "unplugged for a moment")),
            Ok(GOOD.replace("00-00-04.094", "b").into_bytes()),
        ]);
        let mut acq =
            AcquisitionLoop::spawn(Box::new(source), sinks(&hub), Duration::from_millis(1)).unwrap();
        assert_eq!(next_reading(&rx), "a");
        assert_eq!(next_reading(&rx), "b");
        acq.stop();
        assert!(!acq.is_running());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn repeated_faults_are_logged_sparsely() {
        let mut faults = FaultLog::default();
        let logged = (0..200).filter(|_| faults.record("port", &"gone")).count();
        // 1, 2, 4, ..., 128
        assert_eq!(logged, 8);
        faults.recovered("port");
        assert!(faults.record("port", &"gone again"));
    }

    #[test]
    fn keeps_reading_through_a_burst_of_faults() {
        let hub = Arc::new(EventHub::new(64));
        let rx = hub.subscribe();
        let mut script: Vec<io::Result<Vec<u8>>> = (0..500)
            .map(|_| Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")))
            .collect();
        script.push(Ok(GOOD.as_bytes().to_vec()));
        let source = ManualSource::with_script(script);
        let mut acq =
            AcquisitionLoop::spawn(Box::new(source), sinks(&hub), Duration::ZERO).unwrap();
        assert_eq!(next_reading(&rx), "00-00-04.094");
        acq.stop();
    }

    #[test]
    fn appends_raw_lines_only_to_active_sessions() {
        let hub = Arc::new(EventHub::new(64));
        let rx = hub.subscribe();
        let sinks = sinks(&hub);
        sinks.recording.start();
        let source = ManualSource::new(vec![GOOD, "bad line", GOOD]);
        let mut acq =
            AcquisitionLoop::spawn(Box::new(source), sinks.clone(), Duration::from_millis(1))
                .unwrap();
        next_reading(&rx);
        next_reading(&rx);
        acq.stop();
        assert_eq!(sinks.recording.stop_and_take(), vec![GOOD, GOOD]);
        assert!(sinks.capture.is_empty());
    }

    #[test]
    fn both_sessions_receive_the_same_lines() {
        let hub = Arc::new(EventHub::new(64));
        let rx = hub.subscribe();
        let sinks = sinks(&hub);
        sinks.recording.start();
        sinks.capture.start();
        let source = ManualSource::new(vec![GOOD]);
        let mut acq =
            AcquisitionLoop::spawn(Box::new(source), sinks.clone(), Duration::from_millis(1))
                .unwrap();
        next_reading(&rx);
        acq.stop();
        assert_eq!(sinks.recording.stop_and_take(), vec![GOOD]);
        assert_eq!(sinks.capture.stop_and_take(), vec![GOOD]);
    }
}
