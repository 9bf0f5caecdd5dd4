use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;

use crate::drivers::CaptureBuffer;

const RECORDING_PREFIX: &str = "Recording";

/// Start/stop capture of raw device lines to a timestamped text file.
pub struct RecordingSession {
    buffer: Arc<CaptureBuffer>,
    output_dir: PathBuf,
}

impl RecordingSession {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            buffer: Arc::new(CaptureBuffer::new()),
            output_dir: output_dir.into(),
        }
    }

    /// Buffer the acquisition loop appends to.
    pub fn buffer(&self) -> Arc<CaptureBuffer> {
        Arc::clone(&self.buffer)
    }

    /// Starts (or restarts) recording. Unsaved lines from a previous start
    /// are discarded; the count is returned.
    pub fn start(&self) -> usize {
        let discarded = self.buffer.start();
        if discarded > 0 {
            log::warn!("Recording restarted, {discarded} unsaved lines discarded");
        }
        log::info!("Recording started");
        discarded
    }

    /// Stops recording and writes the captured lines. `Ok(None)` when nothing
    /// was captured; no file is created in that case.
    pub fn stop_and_save(&self) -> io::Result<Option<PathBuf>> {
        let lines = self.buffer.stop_and_take();
        if lines.is_empty() {
            log::info!("Recording stopped, nothing captured");
            return Ok(None);
        }
        match save_lines(&self.output_dir, RECORDING_PREFIX, &lines) {
            Ok(path) => {
                log::info!("Recording saved: {} ({} lines)", path.display(), lines.len());
                Ok(Some(path))
            }
            Err(e) => {
                log::error!("Failed to save recording, keeping {} lines: {e}", lines.len());
                self.buffer.restore(lines);
                Err(e)
            }
        }
    }

    pub fn is_recording(&self) -> bool {
        self.buffer.is_active()
    }
}

/// Writes `lines` one per row to `<dir>/<prefix>_<timestamp>.txt`, creating
/// `dir` if needed. Never overwrites an existing file; a partially written
/// file is removed on error.
pub fn save_lines(dir: &Path, prefix: &str, lines: &[String]) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
    let (path, file) = create_unique(dir, &format!("{prefix}_{stamp}"))?;
    if let Err(e) = write_lines(file, lines) {
        if let Err(rm) = fs::remove_file(&path) {
            log::warn!("Failed to remove partial file {}: {rm}", path.display());
        }
        return Err(e);
    }
    Ok(path)
}

fn write_lines(file: File, lines: &[String]) -> io::Result<()> {
    let mut w = BufWriter::new(file);
    for line in lines {
        writeln!(w, "{line}")?;
    }
    w.flush()?;
    w.get_ref().sync_all()
}

fn create_unique(dir: &Path, stem: &str) -> io::Result<(PathBuf, File)> {
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{stem}.txt")
        } else {
            format!("{stem}_{attempt}.txt")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}
