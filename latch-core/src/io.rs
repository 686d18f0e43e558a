//! Platform capabilities consumed by the control loop.
//!
//! The controller touches exactly two pieces of hardware: the actuation pin it
//! drives and the status pin it samples. Both sit behind [`LatchIo`] so the
//! same loop runs against MCU GPIO, the host emulator, and scripted test
//! doubles. Timing goes through [`MonotonicClock`] for the same reason.

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;

/// Logic level applied to the actuation pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PinLevel {
    Low,
    High,
}

/// One observation of the status pin.
///
/// Observations are never cached across a control step; the pin is re-read
/// after every actuation and after every delay.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LatchState {
    Unlatched,
    Latched,
}

impl LatchState {
    /// Returns `true` when the latch was observed engaged.
    pub const fn is_engaged(self) -> bool {
        matches!(self, LatchState::Latched)
    }
}

/// Digital access to one latch circuit: a writable actuation line and a
/// readable status line.
///
/// The controller owns the actuation pin exclusively for the duration of a
/// run. Any `Err` aborts the run; the controller forces the actuation pin low
/// (best effort) before surfacing it.
pub trait LatchIo {
    type Error;

    /// Drives the actuation pin to the requested level.
    fn drive(&mut self, level: PinLevel) -> Result<(), Self::Error>;

    /// Samples the status pin. No debouncing is applied.
    fn status(&mut self) -> Result<LatchState, Self::Error>;
}

/// Monotonic microsecond clock with blocking delays.
pub trait MonotonicClock {
    /// Microseconds elapsed since an arbitrary epoch. Must never go
    /// backwards; wraparound is out of scope for the budgets used here.
    fn now_micros(&self) -> u64;

    /// Blocks the calling thread or task for the given duration.
    fn delay(&mut self, duration: Duration);
}

/// External abort request.
///
/// Polled once per outer control iteration and never mid-pulse, so an
/// actuation pulse in flight always completes before the run winds down.
pub trait CancelSignal {
    fn is_cancelled(&self) -> bool;
}

/// Signal that never requests cancellation.
#[derive(Copy, Clone, Debug, Default)]
pub struct NeverCancel;

impl NeverCancel {
    /// Creates the no-op cancellation signal.
    pub const fn new() -> Self {
        Self
    }
}

impl CancelSignal for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl CancelSignal for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_state_reports_engagement() {
        assert!(LatchState::Latched.is_engaged());
        assert!(!LatchState::Unlatched.is_engaged());
    }

    #[test]
    fn atomic_bool_acts_as_cancel_signal() {
        let flag = AtomicBool::new(false);
        assert!(!flag.is_cancelled());
        flag.store(true, Ordering::Relaxed);
        assert!(flag.is_cancelled());
    }
}
