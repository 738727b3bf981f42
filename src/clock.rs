//! Virtual time for the stage: a shared millisecond clock, deadline-based
//! one-shot timers and the cancellable frame loop.
//!
//! Nothing here sleeps. The host advances the clock and then asks each timer
//! whether it is due, which keeps every component deterministic under test.

use std::cell::Cell;
use std::rc::Rc;

/// Shared monotonic clock in whole milliseconds.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    now_ms: Rc<Cell<u64>>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }

    pub fn now_secs(&self) -> f32 {
        self.now_ms.get() as f32 / 1000.0
    }

    /// Moves the clock forward. Going backwards is ignored.
    pub fn advance_to(&self, now_ms: u64) {
        if now_ms > self.now_ms.get() {
            self.now_ms.set(now_ms);
        }
    }
}

/// A one-shot timer. Re-arming replaces the previous deadline, which is how
/// debounce windows restart on every new input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OneShot {
    deadline_ms: Option<u64>,
}

impl OneShot {
    pub fn arm(&mut self, now_ms: u64, delay_ms: u64) {
        self.deadline_ms = Some(now_ms.saturating_add(delay_ms));
    }

    pub fn cancel(&mut self) {
        self.deadline_ms = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline_ms.is_some()
    }

    pub fn deadline_ms(&self) -> Option<u64> {
        self.deadline_ms
    }

    /// Disarms and returns `true` if the deadline has been reached.
    pub fn fire_if_due(&mut self, now_ms: u64) -> bool {
        match self.deadline_ms {
            Some(deadline) if now_ms >= deadline => {
                self.deadline_ms = None;
                true
            }
            _ => false,
        }
    }
}

/// Idempotent cancellation flag shared between the loop and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Rc<Cell<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// "Run one tick, then request the next" under a cancellation token.
#[derive(Debug, Clone)]
pub struct FrameLoop {
    interval_ms: f64,
    frame_index: u64,
    token: CancelToken,
}

impl FrameLoop {
    pub fn new(fps: u32, token: CancelToken) -> Self {
        Self {
            interval_ms: 1000.0 / f64::from(fps.max(1)),
            frame_index: 0,
            token,
        }
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Time of the next requested frame, or `None` once cancelled.
    pub fn next_frame_ms(&self) -> Option<u64> {
        if self.token.is_cancelled() {
            return None;
        }
        Some(self.frame_time_ms(self.frame_index))
    }

    /// Consumes the pending frame request if it is due and schedules the
    /// following one. Returns the index of the frame to run.
    pub fn take_due(&mut self, now_ms: u64) -> Option<u64> {
        let due = self.next_frame_ms()?;
        if now_ms < due {
            return None;
        }
        let index = self.frame_index;
        self.frame_index += 1;
        Some(index)
    }

    /// Scheduled time of frame `index`. Derived from the index rather than
    /// summed, so long runs do not drift.
    pub fn frame_time_ms(&self, index: u64) -> u64 {
        (index as f64 * self.interval_ms).round() as u64
    }
}
