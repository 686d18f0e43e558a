//! GPIO and clock adapters bridging the MCU to `latch-core`.
//!
//! The controller sees the latch circuit through the `LatchIo` trait and the
//! Embassy time base through `MonotonicClock`; nothing else in the firmware
//! touches the actuation pin.

use core::convert::Infallible;
use core::time::Duration;

use embassy_stm32::gpio::{Input, Output};
use embassy_time::{Duration as EmbassyDuration, Instant, block_for};
use latch_core::io::{LatchIo, LatchState, MonotonicClock, PinLevel};

/// One latch circuit: a push-pull output driving the release coil and a
/// pulled-down input reading the status microswitch.
pub struct LatchCircuit<'d> {
    actuation: Output<'d>,
    status: Input<'d>,
}

impl<'d> LatchCircuit<'d> {
    pub fn new(actuation: Output<'d>, status: Input<'d>) -> Self {
        Self { actuation, status }
    }
}

impl LatchIo for LatchCircuit<'_> {
    type Error = Infallible;

    fn drive(&mut self, level: PinLevel) -> Result<(), Infallible> {
        match level {
            PinLevel::High => self.actuation.set_high(),
            PinLevel::Low => self.actuation.set_low(),
        }
        Ok(())
    }

    fn status(&mut self) -> Result<LatchState, Infallible> {
        Ok(if self.status.is_high() {
            LatchState::Latched
        } else {
            LatchState::Unlatched
        })
    }
}

/// Monotonic clock over the Embassy time driver. Delays deliberately block
/// the executor thread; the latch task owns it for the duration of a run.
pub struct EmbassyClock;

impl MonotonicClock for EmbassyClock {
    fn now_micros(&self) -> u64 {
        Instant::now().as_micros()
    }

    fn delay(&mut self, duration: Duration) {
        block_for(embassy_duration(duration));
    }
}

fn embassy_duration(duration: Duration) -> EmbassyDuration {
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    EmbassyDuration::from_micros(micros)
}
