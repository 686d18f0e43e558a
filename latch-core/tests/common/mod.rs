//! Scripted latch circuit and virtual clock shared by the integration tests.

#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use latch_core::io::{LatchIo, LatchState, MonotonicClock, PinLevel};

/// Virtual microseconds added per `now_micros` read so budget-bounded polling
/// makes progress without real sleeping.
pub const NOW_QUANTUM_MICROS: u64 = 10;

/// Virtual clock; delays advance time exactly, reads advance it by a quantum.
pub struct TestClock {
    now: Rc<Cell<u64>>,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(0)),
        }
    }

    /// Shared handle the scripted latch uses to timestamp pin edges.
    pub fn shared_now(&self) -> Rc<Cell<u64>> {
        Rc::clone(&self.now)
    }
}

impl MonotonicClock for TestClock {
    fn now_micros(&self) -> u64 {
        let next = self.now.get().saturating_add(NOW_QUANTUM_MICROS);
        self.now.set(next);
        next
    }

    fn delay(&mut self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.now.set(self.now.get().saturating_add(micros));
    }
}

/// Error injected by [`BenchLatch`] fault scripting.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IoFault;

/// Scripted latch circuit.
///
/// Measures how long the actuation pin is held high against the shared
/// virtual clock and engages once a pulse meets the configured threshold.
/// Every write to the actuation pin is recorded for post-run assertions.
pub struct BenchLatch {
    now: Rc<Cell<u64>>,
    engage_at: Option<Duration>,
    engaged: bool,
    high_since: Option<u64>,
    drop_out_at: Option<u64>,
    fail_status_after: Option<usize>,
    fail_drive_after: Option<usize>,
    status_reads: usize,
    drive_writes: usize,
    pub writes: Vec<PinLevel>,
}

impl BenchLatch {
    /// Latch that gives way once a pulse is held for `engage_at`; `None`
    /// models a mechanically stuck latch that never engages.
    pub fn new(now: Rc<Cell<u64>>, engage_at: Option<Duration>) -> Self {
        Self {
            now,
            engage_at,
            engaged: false,
            high_since: None,
            drop_out_at: None,
            fail_status_after: None,
            fail_drive_after: None,
            status_reads: 0,
            drive_writes: 0,
            writes: Vec::new(),
        }
    }

    /// Latch already engaged before the run starts.
    pub fn engaged_from_start(now: Rc<Cell<u64>>) -> Self {
        let mut latch = Self::new(now, None);
        latch.engaged = true;
        latch
    }

    /// Disengages once the virtual clock passes `at` (absolute microseconds),
    /// simulating a latch that pops back open mid-run.
    pub fn with_drop_out_at(mut self, at: Duration) -> Self {
        self.drop_out_at = Some(u64::try_from(at.as_micros()).unwrap_or(u64::MAX));
        self
    }

    /// Status reads past `reads` return [`IoFault`].
    pub fn with_status_fault_after(mut self, reads: usize) -> Self {
        self.fail_status_after = Some(reads);
        self
    }

    /// Drive writes past `writes` return [`IoFault`].
    pub fn with_drive_fault_after(mut self, writes: usize) -> Self {
        self.fail_drive_after = Some(writes);
        self
    }

    pub fn last_write(&self) -> Option<PinLevel> {
        self.writes.last().copied()
    }
}

impl LatchIo for BenchLatch {
    type Error = IoFault;

    fn drive(&mut self, level: PinLevel) -> Result<(), IoFault> {
        self.drive_writes += 1;
        // The forced safing write after a fault must still land, so only the
        // first write past the limit fails.
        if let Some(limit) = self.fail_drive_after
            && self.drive_writes == limit + 1
        {
            return Err(IoFault);
        }

        match level {
            PinLevel::High => {
                if self.high_since.is_none() {
                    self.high_since = Some(self.now.get());
                }
            }
            PinLevel::Low => {
                if let Some(started) = self.high_since.take()
                    && let Some(threshold) = self.engage_at
                {
                    let held = self.now.get().saturating_sub(started);
                    let threshold = u64::try_from(threshold.as_micros()).unwrap_or(u64::MAX);
                    if held >= threshold {
                        self.engaged = true;
                    }
                }
            }
        }

        self.writes.push(level);
        Ok(())
    }

    fn status(&mut self) -> Result<LatchState, IoFault> {
        self.status_reads += 1;
        if let Some(limit) = self.fail_status_after
            && self.status_reads > limit
        {
            return Err(IoFault);
        }

        if self.engaged
            && let Some(at) = self.drop_out_at
            && self.now.get() >= at
        {
            self.engaged = false;
            self.drop_out_at = None;
        }

        Ok(if self.engaged {
            LatchState::Latched
        } else {
            LatchState::Unlatched
        })
    }
}
