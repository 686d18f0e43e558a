//! Latch actuation retry controller.
//!
//! The controller drives the latch release coil with a timed pulse, samples
//! the status pin to confirm the latch engaged, and widens the pulse after
//! each failed confirmation until it engages, the width hits the configured
//! ceiling, or the test-time budget runs out. Width escalation is scoped to a
//! single unlatch episode: once an engagement is confirmed and the latch later
//! drops out again, escalation restarts from the configured initial width.
//!
//! All delays are blocking, taken on the calling thread or task through
//! [`MonotonicClock::delay`]. Hitting the width ceiling without engagement is
//! a soft fail, not an error: the hardware fault is outside software's reach,
//! so the loop keeps pulsing at the ceiling until the budget expires and the
//! outcome is reported through [`RunVerdict::TimedOutUnlatched`].

use core::time::Duration;

use crate::io::{CancelSignal, LatchIo, LatchState, MonotonicClock, NeverCancel, PinLevel};
use crate::params::ControlParameters;
use crate::telemetry::{NoopObserver, RunEvent, RunObserver};

/// How the controller treats a confirmed engagement before the budget expires.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum ExitPolicy {
    /// Keep sampling for the full budget, re-actuating if the latch drops out
    /// again. Mirrors the continuous-monitoring test behavior.
    #[default]
    PollForFullDuration,
    /// Return as soon as an engagement is confirmed.
    ExitOnFirstSuccess,
}

/// Phase of the active unlatch episode.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EpisodePhase {
    /// Latch engaged; nothing to actuate.
    Idle,
    /// First pulse of the episode issued, awaiting the settle sample.
    Pulsing,
    /// Escalating pulse widths after failed confirmations.
    Retrying,
    /// Width reached the ceiling without engagement; pulsing continues there
    /// without further escalation.
    Exhausted,
}

impl EpisodePhase {
    /// Returns `true` while an unlatch episode is in progress.
    pub const fn is_active(self) -> bool {
        !matches!(self, EpisodePhase::Idle)
    }

    /// Phase reached after re-sampling the status pin.
    pub const fn after_sample(self, status: LatchState, at_ceiling: bool) -> Self {
        match (status, at_ceiling) {
            (LatchState::Latched, _) => EpisodePhase::Idle,
            (LatchState::Unlatched, true) => EpisodePhase::Exhausted,
            (LatchState::Unlatched, false) => match self {
                EpisodePhase::Idle => EpisodePhase::Idle,
                _ => EpisodePhase::Retrying,
            },
        }
    }
}

/// Terminal condition of a controller run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunVerdict {
    /// Engagement confirmed and [`ExitPolicy::ExitOnFirstSuccess`] was in
    /// effect.
    Latched,
    /// Budget expired with the latch engaged.
    TimedOutLatched,
    /// Budget expired without the latch holding. Soft fail: the stuck
    /// mechanism is a hardware fault, not a software error.
    TimedOutUnlatched,
    /// An external cancellation request stopped the run between control
    /// steps.
    Cancelled,
}

impl RunVerdict {
    const fn timed_out(status: LatchState) -> Self {
        match status {
            LatchState::Latched => RunVerdict::TimedOutLatched,
            LatchState::Unlatched => RunVerdict::TimedOutUnlatched,
        }
    }

    /// Returns `true` when the physical latch was engaged at run end.
    /// Cancelled runs report `false` regardless of the last observation.
    pub const fn engaged(self) -> bool {
        matches!(self, RunVerdict::Latched | RunVerdict::TimedOutLatched)
    }
}

/// Summary handed back when a run terminates normally.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RunReport {
    pub verdict: RunVerdict,
    /// Pulse width in effect when the run ended.
    pub final_pulse_width: Duration,
    /// Actuation pulses issued across the whole run.
    pub pulses_issued: u32,
    /// Wall-clock time consumed, in microseconds.
    pub elapsed_micros: u64,
}

/// Ephemeral per-run state. Created at controller start, mutated each
/// iteration, discarded at return; nothing persists across runs.
struct Run {
    width: Duration,
    phase: EpisodePhase,
    pulses_issued: u32,
    last_observed: LatchState,
}

impl Run {
    fn new(initial_width: Duration) -> Self {
        Self {
            width: initial_width,
            phase: EpisodePhase::Idle,
            pulses_issued: 0,
            last_observed: LatchState::Unlatched,
        }
    }

    /// Opens a fresh unlatch episode, restarting escalation from the base
    /// width.
    fn begin_episode(&mut self, initial_width: Duration) {
        self.width = initial_width;
        self.phase = EpisodePhase::Pulsing;
    }

    /// Widens the pulse by one step, clamped to the ceiling.
    fn escalate(&mut self, step: Duration, ceiling: Duration) {
        self.width = self.width.saturating_add(step).min(ceiling);
    }

    /// Folds a status observation into the episode phase. Returns the phase
    /// held before the observation.
    fn note_sample(&mut self, status: LatchState, ceiling: Duration) -> EpisodePhase {
        let before = self.phase;
        self.phase = before.after_sample(status, self.width >= ceiling);
        self.last_observed = status;
        before
    }

    fn report(&self, verdict: RunVerdict, elapsed_micros: u64) -> RunReport {
        RunReport {
            verdict,
            final_pulse_width: self.width,
            pulses_issued: self.pulses_issued,
            elapsed_micros,
        }
    }
}

/// Closed-loop latch actuation controller.
///
/// Owns no hardware; the caller lends pin access and a clock for the duration
/// of [`run`](LatchController::run). The actuation pin is driven low at run
/// entry and on every exit path, including I/O errors.
#[derive(Copy, Clone, Debug)]
pub struct LatchController {
    params: ControlParameters,
    policy: ExitPolicy,
}

impl LatchController {
    /// Creates a controller with the reference polling behavior
    /// ([`ExitPolicy::PollForFullDuration`]).
    pub const fn new(params: ControlParameters) -> Self {
        Self::with_policy(params, ExitPolicy::PollForFullDuration)
    }

    pub const fn with_policy(params: ControlParameters, policy: ExitPolicy) -> Self {
        Self { params, policy }
    }

    pub const fn params(&self) -> &ControlParameters {
        &self.params
    }

    /// Runs the control loop without telemetry or cancellation.
    pub fn run<Io, Clk>(&self, io: &mut Io, clock: &mut Clk) -> Result<RunReport, Io::Error>
    where
        Io: LatchIo,
        Clk: MonotonicClock,
    {
        self.run_with(io, clock, &mut NoopObserver::new(), &NeverCancel::new())
    }

    /// Runs the control loop, reporting progress through `observer` and
    /// honoring `cancel` between control steps.
    ///
    /// Blocks for up to `test_duration`, plus at most one pulse/settle cycle
    /// of overrun. Allocation-free; per-iteration state lives on the stack.
    pub fn run_with<Io, Clk, Obs, Cancel>(
        &self,
        io: &mut Io,
        clock: &mut Clk,
        observer: &mut Obs,
        cancel: &Cancel,
    ) -> Result<RunReport, Io::Error>
    where
        Io: LatchIo,
        Clk: MonotonicClock,
        Obs: RunObserver,
        Cancel: CancelSignal,
    {
        let result = self.drive_loop(io, clock, observer, cancel);
        if result.is_err() {
            // The actuator must never stay energized behind an error. Best
            // effort only; the original failure is what gets reported.
            let _ = io.drive(PinLevel::Low);
        }
        result
    }

    fn drive_loop<Io, Clk, Obs, Cancel>(
        &self,
        io: &mut Io,
        clock: &mut Clk,
        observer: &mut Obs,
        cancel: &Cancel,
    ) -> Result<RunReport, Io::Error>
    where
        Io: LatchIo,
        Clk: MonotonicClock,
        Obs: RunObserver,
        Cancel: CancelSignal,
    {
        let budget = micros(self.params.test_duration());

        // Known-inactive starting point for the coil.
        io.drive(PinLevel::Low)?;

        let started_at = clock.now_micros();
        let mut run = Run::new(self.params.pulse_width());
        let mut elapsed = 0_u64;

        while elapsed < budget {
            if cancel.is_cancelled() {
                let elapsed = elapsed_since(clock, started_at);
                return Ok(run.report(RunVerdict::Cancelled, elapsed));
            }

            match self.sample(io, clock, &mut run, observer, started_at)? {
                LatchState::Latched => {
                    if matches!(self.policy, ExitPolicy::ExitOnFirstSuccess) {
                        let elapsed = elapsed_since(clock, started_at);
                        return Ok(run.report(RunVerdict::Latched, elapsed));
                    }
                }
                LatchState::Unlatched => {
                    if run.phase == EpisodePhase::Idle {
                        let reopened = run.pulses_issued > 0;
                        run.begin_episode(self.params.pulse_width());
                        if reopened {
                            observer.record(RunEvent::episode_reopened(
                                run.width,
                                elapsed_since(clock, started_at),
                            ));
                        }
                    }
                    self.actuate(io, clock, &mut run, observer, started_at)?;
                }
            }

            elapsed = elapsed_since(clock, started_at);
        }

        Ok(run.report(RunVerdict::timed_out(run.last_observed), elapsed))
    }

    /// One pulse at the current width, then escalate-and-retry while the
    /// latch stays disengaged, headroom remains, and the budget allows.
    fn actuate<Io, Clk, Obs>(
        &self,
        io: &mut Io,
        clock: &mut Clk,
        run: &mut Run,
        observer: &mut Obs,
        started_at: u64,
    ) -> Result<(), Io::Error>
    where
        Io: LatchIo,
        Clk: MonotonicClock,
        Obs: RunObserver,
    {
        let budget = micros(self.params.test_duration());
        let ceiling = self.params.max_pulse_width();

        self.pulse(io, clock, run, observer, started_at)?;
        let mut status = self.sample(io, clock, run, observer, started_at)?;

        while status == LatchState::Unlatched && run.width < ceiling {
            if elapsed_since(clock, started_at) >= budget {
                break;
            }
            clock.delay(self.params.retry_interval());
            run.escalate(self.params.pulse_step(), ceiling);
            observer.record(RunEvent::escalated(
                run.width,
                elapsed_since(clock, started_at),
            ));
            self.pulse(io, clock, run, observer, started_at)?;
            status = self.sample(io, clock, run, observer, started_at)?;
        }

        Ok(())
    }

    /// Drives the coil high for the current width, returns it low, then holds
    /// through the settle interval so mechanical motion can complete.
    fn pulse<Io, Clk, Obs>(
        &self,
        io: &mut Io,
        clock: &mut Clk,
        run: &mut Run,
        observer: &mut Obs,
        started_at: u64,
    ) -> Result<(), Io::Error>
    where
        Io: LatchIo,
        Clk: MonotonicClock,
        Obs: RunObserver,
    {
        io.drive(PinLevel::High)?;
        clock.delay(run.width);
        io.drive(PinLevel::Low)?;
        clock.delay(self.params.max_pulse_width());

        run.pulses_issued = run.pulses_issued.saturating_add(1);
        observer.record(RunEvent::pulse_issued(
            run.width,
            elapsed_since(clock, started_at),
        ));
        Ok(())
    }

    /// Samples the status pin and advances the episode phase, emitting
    /// confirmation and exhaustion events on the transitions.
    fn sample<Io, Clk, Obs>(
        &self,
        io: &mut Io,
        clock: &Clk,
        run: &mut Run,
        observer: &mut Obs,
        started_at: u64,
    ) -> Result<LatchState, Io::Error>
    where
        Io: LatchIo,
        Clk: MonotonicClock,
        Obs: RunObserver,
    {
        let status = io.status()?;
        let before = run.note_sample(status, self.params.max_pulse_width());

        if status.is_engaged() && before.is_active() {
            observer.record(RunEvent::latch_confirmed(
                run.width,
                elapsed_since(clock, started_at),
            ));
        } else if run.phase == EpisodePhase::Exhausted && before != EpisodePhase::Exhausted {
            observer.record(RunEvent::escalation_exhausted(
                run.width,
                elapsed_since(clock, started_at),
            ));
        }

        Ok(status)
    }
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

fn elapsed_since<Clk: MonotonicClock>(clock: &Clk, started_at: u64) -> u64 {
    clock.now_micros().saturating_sub(started_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CEILING: Duration = Duration::from_millis(300);

    #[test]
    fn sample_transitions_follow_episode_rules() {
        // Confirmed engagement closes the episode from any active phase.
        for phase in [
            EpisodePhase::Pulsing,
            EpisodePhase::Retrying,
            EpisodePhase::Exhausted,
        ] {
            assert_eq!(
                phase.after_sample(LatchState::Latched, false),
                EpisodePhase::Idle
            );
        }

        // Failed confirmation with headroom left keeps escalating.
        assert_eq!(
            EpisodePhase::Pulsing.after_sample(LatchState::Unlatched, false),
            EpisodePhase::Retrying
        );
        assert_eq!(
            EpisodePhase::Retrying.after_sample(LatchState::Unlatched, false),
            EpisodePhase::Retrying
        );

        // Hitting the ceiling while disengaged exhausts escalation.
        assert_eq!(
            EpisodePhase::Retrying.after_sample(LatchState::Unlatched, true),
            EpisodePhase::Exhausted
        );
        assert_eq!(
            EpisodePhase::Exhausted.after_sample(LatchState::Unlatched, true),
            EpisodePhase::Exhausted
        );

        // An idle sample never opens an episode by itself.
        assert_eq!(
            EpisodePhase::Idle.after_sample(LatchState::Unlatched, false),
            EpisodePhase::Idle
        );
    }

    #[test]
    fn idle_is_the_only_inactive_phase() {
        assert!(!EpisodePhase::Idle.is_active());
        assert!(EpisodePhase::Pulsing.is_active());
        assert!(EpisodePhase::Retrying.is_active());
        assert!(EpisodePhase::Exhausted.is_active());
    }

    #[test]
    fn escalation_clamps_at_ceiling() {
        let mut run = Run::new(Duration::from_millis(290));
        run.escalate(Duration::from_millis(25), CEILING);
        assert_eq!(run.width, CEILING);
        run.escalate(Duration::from_millis(25), CEILING);
        assert_eq!(run.width, CEILING);
    }

    #[test]
    fn fresh_episode_restarts_from_base_width() {
        let mut run = Run::new(Duration::from_millis(100));
        run.escalate(Duration::from_millis(25), CEILING);
        run.escalate(Duration::from_millis(25), CEILING);
        assert_eq!(run.width, Duration::from_millis(150));

        run.note_sample(LatchState::Latched, CEILING);
        assert_eq!(run.phase, EpisodePhase::Idle);

        run.begin_episode(Duration::from_millis(100));
        assert_eq!(run.width, Duration::from_millis(100));
        assert_eq!(run.phase, EpisodePhase::Pulsing);
    }

    #[test]
    fn verdict_maps_final_observation() {
        assert_eq!(
            RunVerdict::timed_out(LatchState::Latched),
            RunVerdict::TimedOutLatched
        );
        assert_eq!(
            RunVerdict::timed_out(LatchState::Unlatched),
            RunVerdict::TimedOutUnlatched
        );
        assert!(RunVerdict::Latched.engaged());
        assert!(RunVerdict::TimedOutLatched.engaged());
        assert!(!RunVerdict::TimedOutUnlatched.engaged());
        assert!(!RunVerdict::Cancelled.engaged());
    }

    #[test]
    fn micros_saturates_oversized_durations() {
        assert_eq!(micros(Duration::from_micros(1_000)), 1_000);
        assert_eq!(micros(Duration::MAX), u64::MAX);
    }
}
