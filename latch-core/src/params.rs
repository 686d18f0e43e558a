//! Validated control parameters for the latch actuation loop.
//!
//! Every field is checked once at construction and immutable afterwards, so
//! the control loop never has to re-validate mid-run. Invalid values are
//! rejected with a descriptive [`ParameterError`] instead of being silently
//! replaced by a default.

use core::fmt;
use core::time::Duration;

/// Shortest actuation pulse the hardware is specified for.
pub const MIN_PULSE_WIDTH: Duration = Duration::from_millis(1);
/// Hard ceiling on the pulse width; longer pulses risk coil overheating.
pub const MAX_PULSE_WIDTH_LIMIT: Duration = Duration::from_millis(300);
/// Shortest settle interval allowed between a failed confirmation and the
/// next escalated pulse.
pub const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Stock initial pulse width.
pub const DEFAULT_PULSE_WIDTH: Duration = Duration::from_millis(100);
/// Stock escalation increment.
pub const DEFAULT_PULSE_STEP: Duration = Duration::from_millis(25);
/// Stock wall-clock budget for one test pass.
pub const DEFAULT_TEST_DURATION: Duration = Duration::from_secs(10);

/// Immutable, pre-validated configuration for a controller run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ControlParameters {
    pulse_width: Duration,
    max_pulse_width: Duration,
    pulse_step: Duration,
    retry_interval: Duration,
    test_duration: Duration,
}

impl ControlParameters {
    /// Validates and constructs a parameter set.
    ///
    /// Constraints:
    /// - `MIN_PULSE_WIDTH <= pulse_width < max_pulse_width`
    /// - `max_pulse_width <= MAX_PULSE_WIDTH_LIMIT`
    /// - `0 < pulse_step < max_pulse_width - pulse_width`
    /// - `retry_interval >= MIN_RETRY_INTERVAL`
    /// - `test_duration > 0`
    pub fn new(
        pulse_width: Duration,
        max_pulse_width: Duration,
        pulse_step: Duration,
        retry_interval: Duration,
        test_duration: Duration,
    ) -> Result<Self, ParameterError> {
        if max_pulse_width > MAX_PULSE_WIDTH_LIMIT {
            return Err(ParameterError::CeilingAboveLimit {
                requested: max_pulse_width,
            });
        }
        if pulse_width < MIN_PULSE_WIDTH || pulse_width >= max_pulse_width {
            return Err(ParameterError::PulseWidthOutOfRange {
                requested: pulse_width,
                ceiling: max_pulse_width,
            });
        }
        let headroom = max_pulse_width - pulse_width;
        if pulse_step.is_zero() || pulse_step >= headroom {
            return Err(ParameterError::PulseStepOutOfRange {
                requested: pulse_step,
                headroom,
            });
        }
        if retry_interval < MIN_RETRY_INTERVAL {
            return Err(ParameterError::RetryIntervalTooShort {
                requested: retry_interval,
            });
        }
        if test_duration.is_zero() {
            return Err(ParameterError::ZeroTestDuration);
        }

        Ok(Self {
            pulse_width,
            max_pulse_width,
            pulse_step,
            retry_interval,
            test_duration,
        })
    }

    /// Stock parameter set used when no overrides are supplied.
    pub const fn defaults() -> Self {
        Self {
            pulse_width: DEFAULT_PULSE_WIDTH,
            max_pulse_width: MAX_PULSE_WIDTH_LIMIT,
            pulse_step: DEFAULT_PULSE_STEP,
            retry_interval: MIN_RETRY_INTERVAL,
            test_duration: DEFAULT_TEST_DURATION,
        }
    }

    /// Initial actuation pulse duration.
    pub const fn pulse_width(&self) -> Duration {
        self.pulse_width
    }

    /// Ceiling the pulse width escalates towards. Doubles as the settle
    /// interval after each pulse.
    pub const fn max_pulse_width(&self) -> Duration {
        self.max_pulse_width
    }

    /// Increment applied to the pulse width after each failed confirmation.
    pub const fn pulse_step(&self) -> Duration {
        self.pulse_step
    }

    /// Delay between a failed confirmation and the next escalated pulse.
    pub const fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Total wall-clock budget for the control loop.
    pub const fn test_duration(&self) -> Duration {
        self.test_duration
    }
}

impl Default for ControlParameters {
    fn default() -> Self {
        Self::defaults()
    }
}

/// A supplied parameter violated its constraint.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ParameterError {
    /// `pulse_width` is below the minimum or not below the ceiling.
    PulseWidthOutOfRange {
        requested: Duration,
        ceiling: Duration,
    },
    /// `max_pulse_width` exceeds [`MAX_PULSE_WIDTH_LIMIT`].
    CeilingAboveLimit { requested: Duration },
    /// `pulse_step` is zero or leaves no escalation headroom.
    PulseStepOutOfRange {
        requested: Duration,
        headroom: Duration,
    },
    /// `retry_interval` is below [`MIN_RETRY_INTERVAL`].
    RetryIntervalTooShort { requested: Duration },
    /// `test_duration` is zero.
    ZeroTestDuration,
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterError::PulseWidthOutOfRange { requested, ceiling } => write!(
                f,
                "pulse width {}ms must be at least {}ms and below the {}ms ceiling",
                requested.as_millis(),
                MIN_PULSE_WIDTH.as_millis(),
                ceiling.as_millis()
            ),
            ParameterError::CeilingAboveLimit { requested } => write!(
                f,
                "max pulse width {}ms exceeds the {}ms hardware limit",
                requested.as_millis(),
                MAX_PULSE_WIDTH_LIMIT.as_millis()
            ),
            ParameterError::PulseStepOutOfRange { requested, headroom } => write!(
                f,
                "pulse step {}ms must be non-zero and below the {}ms headroom",
                requested.as_millis(),
                headroom.as_millis()
            ),
            ParameterError::RetryIntervalTooShort { requested } => write!(
                f,
                "retry interval {}ms is below the {}ms minimum",
                requested.as_millis(),
                MIN_RETRY_INTERVAL.as_millis()
            ),
            ParameterError::ZeroTestDuration => write!(f, "test duration must be non-zero"),
        }
    }
}
