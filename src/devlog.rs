//! Developer ("level 6") log channel.
//!
//! Lines go to the `minq::dev6` log target at TRACE and, when a capture is active on the
//! current thread, into a thread-local buffer so tests can assert on them without racing
//! other tests through the global logger.

use std::cell::RefCell;

pub const TARGET: &str = "minq::dev6";

thread_local! {
    static CAPTURE: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Ends the capture started by [`capture`] when dropped.
#[must_use = "capture stops as soon as the guard is dropped"]
pub struct CaptureGuard(());

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        CAPTURE.with(|c| *c.borrow_mut() = None);
    }
}

/// Start capturing dev6 lines emitted on this thread.
pub fn capture() -> CaptureGuard {
    CAPTURE.with(|c| *c.borrow_mut() = Some(Vec::new()));
    CaptureGuard(())
}

pub fn record(line: &str) {
    CAPTURE.with(|c| {
        if let Some(buf) = c.borrow_mut().as_mut() {
            buf.push(line.to_owned());
        }
    });
}

/// Take the lines captured so far. Empty when no capture is active.
pub fn drain() -> Vec<String> {
    CAPTURE.with(|c| c.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
}

pub fn snapshot() -> Vec<String> {
    CAPTURE.with(|c| c.borrow().clone().unwrap_or_default())
}

/// Emit a dev6 line.
#[macro_export]
macro_rules! dev6 {
    ($($arg:tt)*) => {{
        let __line = format!($($arg)*);
        $crate::devlog::record(&__line);
        log::log!(target: $crate::devlog::TARGET, log::Level::Trace, "{}", __line);
    }};
}
