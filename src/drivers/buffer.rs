use parking_lot::Mutex;
/// Raw-line capture owned by one session (recording or prediction).
///
/// The `active` flag and the lines share a single lock, so an append racing a
/// stop either lands before the snapshot or is refused; it is never lost
/// between the two or counted twice.
#[derive(Debug, Default)]
pub struct CaptureBuffer {
    inner: Mutex<CaptureState>,
}
#[derive(Debug, Default)]
struct CaptureState {
    active: bool,
    lines: Vec<String>,
}
impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }
    /// Clears any leftover lines and starts accepting appends.
    /// Returns how many unsaved lines were discarded.
    pub fn start(&self) -> usize {
        let mut state = self.inner.lock();
        let discarded = state.lines.len();
        state.lines.clear();
        state.active = true;
        discarded
    }
    /// Appends a raw line if the session is active.
    pub fn append(&self, line: &str) -> bool {
        let mut state = self.inner.lock();
        if state.active {
            state.lines.push(line.to_string());
        }
        state.active
    }
    /// Deactivates the session and moves the captured lines out, leaving the
    /// buffer empty.
    pub fn stop_and_take(&self) -> Vec<String> {
        let mut state = self.inner.lock();
        state.active = false;
        std::mem::take(&mut state.lines)
    }
    /// Puts lines taken by `stop_and_take` back in front of anything appended
    /// since. The active flag is left as is.
    pub fn restore(&self, mut lines: Vec<String>) {
        let mut state = self.inner.lock();
        lines.append(&mut state.lines);
        state.lines = lines;
    }
    pub fn is_active(&self) -> bool {
        self.inner.lock().active
    }
    pub fn len(&self) -> usize {
        self.inner.lock().lines.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
