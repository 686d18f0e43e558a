//! Simulated latch circuit and virtual clock backing the emulator.

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;
use std::time::Duration;

use latch_core::io::{LatchIo, LatchState, MonotonicClock, PinLevel};

/// Virtual microseconds added per clock read so budget-bounded polling makes
/// progress without real sleeping.
const NOW_QUANTUM_MICROS: u64 = 10;

/// Mechanical temperament of the simulated latch.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Profile {
    /// Gives way at the stock initial pulse width.
    Nominal,
    /// Needs the pulse escalated to 200 ms before it releases.
    Stiff,
    /// Never engages, no matter the pulse width.
    Stuck,
}

impl Profile {
    pub fn from_tag(tag: &str) -> Result<Self, String> {
        match tag.to_ascii_lowercase().as_str() {
            "nominal" => Ok(Profile::Nominal),
            "stiff" => Ok(Profile::Stiff),
            "stuck" => Ok(Profile::Stuck),
            other => Err(format!("unknown profile `{other}`")),
        }
    }

    /// Pulse hold time at which the simulated mechanism gives way.
    fn engage_threshold(self) -> Option<Duration> {
        match self {
            Profile::Nominal => Some(Duration::from_millis(100)),
            Profile::Stiff => Some(Duration::from_millis(200)),
            Profile::Stuck => None,
        }
    }
}

/// Virtual clock; delays advance time exactly, reads advance it by a quantum.
pub struct VirtualClock {
    now: Rc<Cell<u64>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(0)),
        }
    }

    /// Shared handle the simulated latch uses to timestamp pin edges.
    pub fn shared_now(&self) -> Rc<Cell<u64>> {
        Rc::clone(&self.now)
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for VirtualClock {
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

/// Simulated latch circuit. Measures how long the actuation pin is held high
/// against the shared virtual clock and engages once a pulse meets the
/// profile's threshold.
pub struct SimulatedLatch {
    now: Rc<Cell<u64>>,
    threshold: Option<Duration>,
    engaged: bool,
    high_since: Option<u64>,
    writes: Vec<PinLevel>,
}

impl SimulatedLatch {
    pub fn new(profile: Profile, now: Rc<Cell<u64>>) -> Self {
        Self {
            now,
            threshold: profile.engage_threshold(),
            engaged: false,
            high_since: None,
            writes: Vec::new(),
        }
    }

    /// Every write applied to the actuation pin, oldest first.
    pub fn writes(&self) -> &[PinLevel] {
        &self.writes
    }

    pub fn last_write(&self) -> Option<PinLevel> {
        self.writes.last().copied()
    }
}

impl LatchIo for SimulatedLatch {
    type Error = Infallible;

    fn drive(&mut self, level: PinLevel) -> Result<(), Infallible> {
        match level {
            PinLevel::High => {
                if self.high_since.is_none() {
                    self.high_since = Some(self.now.get());
                }
            }
            PinLevel::Low => {
                if let Some(started) = self.high_since.take()
                    && let Some(threshold) = self.threshold
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

    fn status(&mut self) -> Result<LatchState, Infallible> {
        Ok(if self.engaged {
            LatchState::Latched
        } else {
            LatchState::Unlatched
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latch_core::controller::{LatchController, RunVerdict};
    use latch_core::params::ControlParameters;

    fn params(test_duration: Duration) -> ControlParameters {
        ControlParameters::new(
            Duration::from_millis(100),
            Duration::from_millis(300),
            Duration::from_millis(25),
            Duration::from_millis(100),
            test_duration,
        )
        .expect("parameters are valid")
    }

    #[test]
    fn nominal_latch_engages_on_the_first_pulse() {
        let mut clock = VirtualClock::new();
        let mut latch = SimulatedLatch::new(Profile::Nominal, clock.shared_now());

        let report = LatchController::new(params(Duration::from_secs(1)))
            .run(&mut latch, &mut clock)
            .expect("run should complete");

        assert_eq!(report.verdict, RunVerdict::TimedOutLatched);
        assert_eq!(report.pulses_issued, 1);
        assert_eq!(report.final_pulse_width, Duration::from_millis(100));
        // Safing write, then exactly one high/low pulse.
        assert_eq!(
            latch.writes(),
            &[PinLevel::Low, PinLevel::High, PinLevel::Low]
        );
    }

    #[test]
    fn stiff_latch_needs_the_ladder() {
        let mut clock = VirtualClock::new();
        let mut latch = SimulatedLatch::new(Profile::Stiff, clock.shared_now());

        let report = LatchController::new(params(Duration::from_secs(5)))
            .run(&mut latch, &mut clock)
            .expect("run should complete");

        assert_eq!(report.verdict, RunVerdict::TimedOutLatched);
        assert_eq!(report.final_pulse_width, Duration::from_millis(200));
    }

    #[test]
    fn stuck_latch_times_out_disengaged() {
        let mut clock = VirtualClock::new();
        let mut latch = SimulatedLatch::new(Profile::Stuck, clock.shared_now());

        let report = LatchController::new(params(Duration::from_secs(5)))
            .run(&mut latch, &mut clock)
            .expect("run should complete");

        assert_eq!(report.verdict, RunVerdict::TimedOutUnlatched);
        assert_eq!(report.final_pulse_width, Duration::from_millis(300));
        assert_eq!(latch.last_write(), Some(PinLevel::Low));
    }

    #[test]
    fn profile_tags_parse_case_insensitively() {
        assert_eq!(Profile::from_tag("Nominal"), Ok(Profile::Nominal));
        assert_eq!(Profile::from_tag("STIFF"), Ok(Profile::Stiff));
        assert!(Profile::from_tag("wobbly").is_err());
    }
}
