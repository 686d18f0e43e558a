//! Attempt log for controller runs.
//!
//! Mirrors every run event to defmt for live inspection during bring-up and
//! retains the most recent events in a bounded ring for post-run dumps. The
//! module takes its timestamps from the events themselves so it stays
//! host-testable.

#![allow(dead_code)]

use latch_core::telemetry::{EventLog, RunEvent, RunObserver};
#[cfg(any(test, target_os = "none"))]
use latch_core::telemetry::RunEventKind;

/// Events retained per controller run.
pub const ATTEMPT_LOG_CAPACITY: usize = 64;

/// Records run events into a fixed-size ring and mirrors them to defmt.
pub struct AttemptRecorder {
    log: EventLog<ATTEMPT_LOG_CAPACITY>,
}

impl AttemptRecorder {
    /// Creates a recorder with an empty history.
    pub const fn new() -> Self {
        Self {
            log: EventLog::new(),
        }
    }

    /// Discards the previous run's history.
    pub fn reset(&mut self) {
        self.log.clear();
    }

    /// Iterates over retained events in chronological order.
    pub fn events(&self) -> impl Iterator<Item = &RunEvent> {
        self.log.iter()
    }

    /// Returns the most recent event, if any.
    pub fn latest(&self) -> Option<&RunEvent> {
        self.log.latest()
    }

    /// Number of events currently retained.
    pub fn len(&self) -> usize {
        self.log.len()
    }

    /// Returns `true` when no events are retained.
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}

impl Default for AttemptRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl RunObserver for AttemptRecorder {
    fn record(&mut self, event: RunEvent) {
        #[cfg(target_os = "none")]
        defmt::trace!(
            "latch event: {} width {}ms at {}us",
            kind_label(event.kind),
            event.pulse_width.as_millis() as u32,
            event.at_micros,
        );
        self.log.push(event);
    }
}

#[cfg(target_os = "none")]
fn kind_label(kind: RunEventKind) -> &'static str {
    match kind {
        RunEventKind::PulseIssued => "pulse-issued",
        RunEventKind::Escalated => "escalated",
        RunEventKind::LatchConfirmed => "latch-confirmed",
        RunEventKind::EscalationExhausted => "escalation-exhausted",
        RunEventKind::EpisodeReopened => "episode-reopened",
    }
}
