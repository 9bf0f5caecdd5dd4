use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader};
use std::time::{Duration, Instant};
use rand::Rng;
use crate::drivers::LumosError;
use crate::types::CHANNEL_COUNT;
/// Something that yields newline-delimited device lines.
///
/// `Ok(None)` means no complete line is available yet; the caller decides how
/// long to wait before asking again.
pub trait LineSource: Send {
    fn read_line(&mut self) -> Result<Option<String>, LumosError>;
    /// Human readable name for logs.
    fn name(&self) -> &str;
}
/// Decodes raw bytes permissively (invalid sequences become U+FFFD) and trims
/// the line ending.
pub fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}
/// Longest line kept while waiting for its `\n`.
pub const MAX_LINE_BYTES: usize = 4096;
/// Assembles newline-terminated lines from a byte stream whose reads may time
/// out mid-line. A line longer than `MAX_LINE_BYTES` is dropped whole.
struct LineReader<R> {
    reader: R,
    pending: Vec<u8>,
    overflowed: bool,
}
impl<R: BufRead> LineReader<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            pending: Vec::with_capacity(128),
            overflowed: false,
        }
    }
    fn read_line(&mut self) -> io::Result<Option<String>> {
        loop {
            let available = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                    return Ok(None)
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if available.is_empty() {
                return Ok(None);
            }
            let (used, complete) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, true),
                None => (available.len(), false),
            };
            self.pending.extend_from_slice(&available[..used]);
            self.reader.consume(used);
            if complete {
                let dropped = std::mem::replace(&mut self.overflowed, false);
                if !dropped {
                    let line = decode_line(&self.pending);
                    self.pending.clear();
                    return Ok(Some(line));
                }
                self.pending.clear();
            } else if self.pending.len() > MAX_LINE_BYTES {
                if !self.overflowed {
                    log::warn!(
                        "Discarding over-long line ({} bytes without a line ending)",
                        self.pending.len()
                    );
                }
                self.pending.clear();
                self.overflowed = true;
            }
        }
    }
}
/// Serial device opened at a fixed baud rate with a read timeout, so a read
/// blocks at most `timeout` when the device is silent.
pub struct SerialLineSource {
    port_name: String,
    lines: LineReader<BufReader<Box<dyn serialport::SerialPort>>>,
}
impl SerialLineSource {
    pub fn open(port_name: &str, baud_rate: u32, timeout: Duration) -> Result<Self, LumosError> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|source| LumosError::Connection {
                port: port_name.to_string(),
                source,
            })?;
        log::info!("Opened serial port {port_name} at {baud_rate} baud");
        Ok(Self {
            port_name: port_name.to_string(),
            lines: LineReader::new(BufReader::new(port)),
        })
    }
}
impl LineSource for SerialLineSource {
    fn read_line(&mut self) -> Result<Option<String>, LumosError> {
        // Partial lines survive a timeout and are completed on the next call.
        self.lines.read_line().map_err(LumosError::Read)
    }
    fn name(&self) -> &str {
        &self.port_name
    }
}
/// In-memory source useful for tests and deterministic playback.
/// Each entry is either the raw bytes of one line or a read fault.
pub struct ManualSource {
    queue: VecDeque<io::Result<Vec<u8>>>,
}
impl ManualSource {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_script(lines.into_iter().map(|l| Ok(l.into().into_bytes())))
    }
    pub fn with_script(script: impl IntoIterator<Item = io::Result<Vec<u8>>>) -> Self {
        Self {
            queue: script.into_iter().collect(),
        }
    }
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}
impl LineSource for ManualSource {
    fn read_line(&mut self) -> Result<Option<String>, LumosError> {
        match self.queue.pop_front() {
            Some(Ok(bytes)) => Ok(Some(decode_line(&bytes))),
            Some(Err(e)) => Err(LumosError::Read(e)),
            None => Ok(None),
        }
    }
    fn name(&self) -> &str {
        "manual"
    }
}
/// Fake device emitting one well-formed line per interval, for exercising the
/// front end without hardware.
pub struct SimulatedSource {
    interval: Duration,
    last_emit: Option<Instant>,
    count: u64,
}
impl SimulatedSource {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
            count: 0,
        }
    }
    fn next_line(&mut self) -> String {
        self.count += 1;
        let elapsed_ms = self.count * self.interval.as_millis() as u64;
        let boot_time = format!(
            "{:02}-{:02}-{:02}.{:03}",
            elapsed_ms / 3_600_000,
            (elapsed_ms / 60_000) % 60,
            (elapsed_ms / 1000) % 60,
            elapsed_ms % 1000
        );
        let mut rng = rand::thread_rng();
        let channels: Vec<String> = (0..CHANNEL_COUNT)
            .map(|i| (1000 * (i as i64 + 1) + rng.gen_range(-25..=25)).to_string())
            .collect();
        format!(
            "{boot_time},{},[{}],2048;",
            channels.join(","),
            self.count % 17
        )
    }
}
impl LineSource for SimulatedSource {
    fn read_line(&mut self) -> Result<Option<String>, LumosError> {
        let due = self
            .last_emit
            .map_or(true, |t| t.elapsed() >= self.interval);
        if !due {
            return Ok(None);
        }
        self.last_emit = Some(Instant::now());
        Ok(Some(self.next_line()))
    }
    fn name(&self) -> &str {
        "simulated"
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;
    #[test]
    fn manual_source_replays_script_then_runs_dry() {
        let mut source = ManualSource::with_script(vec![
            Ok(b"line one\r\n".to_vec()),
            Err(io::Error::new(io::ErrorKind::Other, "glitch")),
            Ok(vec![b'o', b'k', 0xff, b'\n']),
        ]);
        assert_eq!(source.read_line().unwrap().as_deref(), Some("line one"));
        assert!(matches!(source.read_line(), Err(LumosError::Read(_))));
        assert_eq!(source.read_line().unwrap().as_deref(), Some("ok\u{fffd}"));
        assert!(source.read_line().unwrap().is_none());
        assert_eq!(source.remaining(), 0);
    }
    /// Reader that hands out one scripted chunk per call and times out once
    /// the script runs dry, like a quiet serial port.
    struct ChunkedPort {
        chunks: VecDeque<io::Result<Vec<u8>>>,
    }
    impl io::Read for ChunkedPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(Ok(mut chunk)) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.chunks.push_front(Ok(chunk.split_off(n)));
                    }
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "quiet")),
            }
        }
    }
    fn line_reader(chunks: Vec<io::Result<Vec<u8>>>) -> LineReader<BufReader<ChunkedPort>> {
        LineReader::new(BufReader::new(ChunkedPort {
            chunks: chunks.into(),
        }))
    }
    #[test]
    fn partial_line_survives_a_timeout() {
        let mut lines = line_reader(vec![
            Ok(b"abc".to_vec()),
            Err(io::Error::new(io::ErrorKind::TimedOut, "quiet")),
            Ok(b"def\r\nnext".to_vec()),
        ]);
        assert_eq!(lines.read_line().unwrap(), None);
        assert_eq!(lines.read_line().unwrap().as_deref(), Some("abcdef"));
        assert_eq!(lines.read_line().unwrap(), None);
        assert!(lines.pending.len() <= MAX_LINE_BYTES);
    }
    #[test]
    fn over_long_line_is_dropped_and_memory_stays_bounded() {
        let mut chunks: Vec<io::Result<Vec<u8>>> =
            (0..8).map(|_| Ok(vec![b'x'; 1024])).collect();
        chunks.push(Ok(b"tail\nok\n".to_vec()));
        let mut lines = line_reader(chunks);
        assert_eq!(lines.read_line().unwrap().as_deref(), Some("ok"));
        assert!(lines.pending.capacity() <= 2 * (MAX_LINE_BYTES + 8192));
        assert!(!lines.overflowed);
    }
    #[test]
    fn hard_read_errors_are_reported() {
        let mut lines = line_reader(vec![Err(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "unplugged",
        ))]);
        assert_eq!(
            lines.read_line().unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );
    }
    #[test]
    fn simulated_lines_are_parseable() {
        let mut source = SimulatedSource::new(Duration::ZERO);
        for n in 1..=20u32 {
            let line = source.read_line().unwrap().unwrap();
            let reading = parse_line(&line).expect("simulated line should parse");
            assert_eq!(reading.led_index, n % 17);
            assert_eq!(reading.intensity, 2048);
            assert!((975..=1025).contains(&reading.readings[0]));
        }
    }
    #[test]
    fn simulated_source_waits_for_interval() {
        let mut source = SimulatedSource::new(Duration::from_secs(3600));
        assert!(source.read_line().unwrap().is_some());
        assert!(source.read_line().unwrap().is_none());
    }
}
