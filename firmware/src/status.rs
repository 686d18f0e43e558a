#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! Lightweight atomics track whether a controller run is in flight and the
//! outcome of the most recent completed run, so a future command front-end
//! can surface status without touching the latch task's state directly.

use latch_core::controller::{RunReport, RunVerdict};
use portable_atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

const NO_VERDICT: u8 = 0;

/// Whether a controller run is currently in flight.
static RUN_ACTIVE: AtomicBool = AtomicBool::new(false);
/// Verdict of the most recent completed run (encoded, 0 == none yet).
static LAST_VERDICT: AtomicU8 = AtomicU8::new(NO_VERDICT);
/// Final pulse width of the most recent completed run, in milliseconds.
static LAST_WIDTH_MS: AtomicU32 = AtomicU32::new(0);
/// Pulses issued by the most recent completed run.
static LAST_PULSES: AtomicU32 = AtomicU32::new(0);

fn encode_verdict(verdict: RunVerdict) -> u8 {
    match verdict {
        RunVerdict::Latched => 1,
        RunVerdict::TimedOutLatched => 2,
        RunVerdict::TimedOutUnlatched => 3,
        RunVerdict::Cancelled => 4,
    }
}

fn decode_verdict(raw: u8) -> Option<RunVerdict> {
    match raw {
        1 => Some(RunVerdict::Latched),
        2 => Some(RunVerdict::TimedOutLatched),
        3 => Some(RunVerdict::TimedOutUnlatched),
        4 => Some(RunVerdict::Cancelled),
        _ => None,
    }
}

/// Marks a controller run as in flight.
pub fn record_run_started() {
    RUN_ACTIVE.store(true, Ordering::Relaxed);
}

/// Stores the outcome of a completed run and clears the in-flight flag.
pub fn record_run_finished(report: &RunReport) {
    let width_ms = u32::try_from(report.final_pulse_width.as_millis()).unwrap_or(u32::MAX);
    LAST_WIDTH_MS.store(width_ms, Ordering::Relaxed);
    LAST_PULSES.store(report.pulses_issued, Ordering::Relaxed);
    LAST_VERDICT.store(encode_verdict(report.verdict), Ordering::Relaxed);
    RUN_ACTIVE.store(false, Ordering::Relaxed);
}

/// Returns `true` while the latch task is executing a run.
pub fn run_active() -> bool {
    RUN_ACTIVE.load(Ordering::Relaxed)
}

/// Verdict of the most recent completed run, if any.
pub fn last_verdict() -> Option<RunVerdict> {
    decode_verdict(LAST_VERDICT.load(Ordering::Relaxed))
}

/// Final pulse width (ms) of the most recent completed run, if any.
pub fn last_final_width_ms() -> Option<u32> {
    last_verdict().map(|_| LAST_WIDTH_MS.load(Ordering::Relaxed))
}

/// Pulse count of the most recent completed run, if any.
pub fn last_pulses_issued() -> Option<u32> {
    last_verdict().map(|_| LAST_PULSES.load(Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    #[test]
    fn verdict_encoding_round_trips() {
        for verdict in [
            RunVerdict::Latched,
            RunVerdict::TimedOutLatched,
            RunVerdict::TimedOutUnlatched,
            RunVerdict::Cancelled,
        ] {
            assert_eq!(decode_verdict(encode_verdict(verdict)), Some(verdict));
        }
        assert_eq!(decode_verdict(NO_VERDICT), None);
        assert_eq!(decode_verdict(200), None);
    }

    #[test]
    fn finished_run_publishes_its_report() {
        record_run_started();
        assert!(run_active());

        let report = RunReport {
            verdict: RunVerdict::TimedOutLatched,
            final_pulse_width: Duration::from_millis(150),
            pulses_issued: 3,
            elapsed_micros: 2_000_000,
        };
        record_run_finished(&report);

        assert!(!run_active());
        assert_eq!(last_verdict(), Some(RunVerdict::TimedOutLatched));
        assert_eq!(last_final_width_ms(), Some(150));
        assert_eq!(last_pulses_issued(), Some(3));
    }
}
