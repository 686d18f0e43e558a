//! Run-event observability seam.
//!
//! The control loop reports what it does through [`RunObserver`] instead of
//! logging directly, so the firmware can mirror events to defmt while host
//! tooling collects them in memory. [`EventLog`] is a bounded ring usable on
//! both targets.

use core::time::Duration;

use heapless::Deque;

/// What happened at a given point in a controller run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunEventKind {
    /// An actuation pulse completed (drive high, hold, drive low, settle).
    PulseIssued,
    /// The pulse width was increased after a failed confirmation.
    Escalated,
    /// The status pin confirmed engagement during an active episode.
    LatchConfirmed,
    /// The width reached the ceiling without the latch engaging.
    EscalationExhausted,
    /// A previously engaged latch was observed unlatched again.
    EpisodeReopened,
}

/// One timestamped record emitted by the control loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RunEvent {
    pub kind: RunEventKind,
    /// Pulse width in effect when the event fired.
    pub pulse_width: Duration,
    /// Microseconds into the run at which the event fired.
    pub at_micros: u64,
}

impl RunEvent {
    pub const fn new(kind: RunEventKind, pulse_width: Duration, at_micros: u64) -> Self {
        Self {
            kind,
            pulse_width,
            at_micros,
        }
    }

    pub const fn pulse_issued(pulse_width: Duration, at_micros: u64) -> Self {
        Self::new(RunEventKind::PulseIssued, pulse_width, at_micros)
    }

    pub const fn escalated(pulse_width: Duration, at_micros: u64) -> Self {
        Self::new(RunEventKind::Escalated, pulse_width, at_micros)
    }

    pub const fn latch_confirmed(pulse_width: Duration, at_micros: u64) -> Self {
        Self::new(RunEventKind::LatchConfirmed, pulse_width, at_micros)
    }

    pub const fn escalation_exhausted(pulse_width: Duration, at_micros: u64) -> Self {
        Self::new(RunEventKind::EscalationExhausted, pulse_width, at_micros)
    }

    pub const fn episode_reopened(pulse_width: Duration, at_micros: u64) -> Self {
        Self::new(RunEventKind::EpisodeReopened, pulse_width, at_micros)
    }
}

/// Sink for [`RunEvent`]s emitted while the control loop executes.
pub trait RunObserver {
    fn record(&mut self, event: RunEvent);
}

/// Observer that drops every event.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopObserver;

impl NoopObserver {
    pub const fn new() -> Self {
        Self
    }
}

impl RunObserver for NoopObserver {
    fn record(&mut self, _: RunEvent) {}
}

/// Fixed-capacity event ring that retains the most recent records, evicting
/// the oldest once full.
#[derive(Clone, Debug)]
pub struct EventLog<const CAPACITY: usize> {
    events: Deque<RunEvent, CAPACITY>,
}

impl<const CAPACITY: usize> EventLog<CAPACITY> {
    /// Creates an empty log.
    pub const fn new() -> Self {
        Self {
            events: Deque::new(),
        }
    }

    /// Appends an event, evicting the oldest record when full.
    pub fn push(&mut self, event: RunEvent) {
        if self.events.is_full() {
            let _ = self.events.pop_front();
        }
        let _ = self.events.push_back(event);
    }

    /// Iterates over retained events in chronological order.
    pub fn iter(&self) -> impl Iterator<Item = &RunEvent> {
        self.events.iter()
    }

    /// Returns the most recent record, if any.
    pub fn latest(&self) -> Option<&RunEvent> {
        self.events.back()
    }

    /// Number of records currently retained.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` when no records are retained.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Discards all retained records.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl<const CAPACITY: usize> Default for EventLog<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAPACITY: usize> RunObserver for EventLog<CAPACITY> {
    fn record(&mut self, event: RunEvent) {
        self.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(at_micros: u64) -> RunEvent {
        RunEvent::pulse_issued(Duration::from_millis(100), at_micros)
    }

    #[test]
    fn log_retains_events_in_order() {
        let mut log: EventLog<4> = EventLog::new();
        assert!(log.is_empty());

        log.push(event(1));
        log.push(event(2));

        assert_eq!(log.len(), 2);
        let recorded: heapless::Vec<u64, 4> = log.iter().map(|e| e.at_micros).collect();
        assert_eq!(recorded.as_slice(), &[1, 2]);
        assert_eq!(log.latest().map(|e| e.at_micros), Some(2));
    }

    #[test]
    fn log_evicts_oldest_when_full() {
        let mut log: EventLog<2> = EventLog::new();
        log.push(event(1));
        log.push(event(2));
        log.push(event(3));

        assert_eq!(log.len(), 2);
        let recorded: heapless::Vec<u64, 2> = log.iter().map(|e| e.at_micros).collect();
        assert_eq!(recorded.as_slice(), &[2, 3]);
    }

    #[test]
    fn clear_discards_records() {
        let mut log: EventLog<2> = EventLog::new();
        log.push(event(1));
        log.clear();
        assert!(log.is_empty());
        assert!(log.latest().is_none());
    }
}
