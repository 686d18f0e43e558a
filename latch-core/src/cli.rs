//! Flag-surface adapter for host tooling.
//!
//! Parses the historical flag set (`--test_time`, `--pulse_width`,
//! `--max_pulse_width`, `--pulse_step`, `--retry_interval`, plus their short
//! forms) into [`ControlParameters`], starting from the stock defaults. Value
//! literals are bare integers with an optional `ms`/`s` suffix; without a
//! suffix, `--test_time` counts seconds and everything else milliseconds.
//!
//! Unknown flags, missing values, malformed literals, and constraint
//! violations are all reported as errors rather than silently ignored.

use core::fmt;
use core::time::Duration;

use winnow::Parser;
use winnow::ascii::digit1;
use winnow::combinator::{alt, opt};
use winnow::error::ContextError;

use crate::params::{
    ControlParameters, DEFAULT_PULSE_STEP, DEFAULT_PULSE_WIDTH, DEFAULT_TEST_DURATION,
    MAX_PULSE_WIDTH_LIMIT, MIN_RETRY_INTERVAL, ParameterError,
};

/// Unit assumed for a value literal without an explicit suffix.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum DefaultUnit {
    Seconds,
    Millis,
}

/// A flag argument could not be turned into control parameters.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ArgsError<'a> {
    UnknownFlag { flag: &'a str },
    MissingValue { flag: &'a str },
    InvalidValue { flag: &'a str, value: &'a str },
    Invalid(ParameterError),
}

impl fmt::Display for ArgsError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::UnknownFlag { flag } => write!(f, "unrecognized flag `{flag}`"),
            ArgsError::MissingValue { flag } => write!(f, "flag `{flag}` expects a value"),
            ArgsError::InvalidValue { flag, value } => {
                write!(f, "invalid value `{value}` for `{flag}`")
            }
            ArgsError::Invalid(err) => write!(f, "{err}"),
        }
    }
}

impl From<ParameterError> for ArgsError<'_> {
    fn from(err: ParameterError) -> Self {
        ArgsError::Invalid(err)
    }
}

/// Parses an argument list into a validated parameter set.
pub fn parse_args<'a, I>(args: I) -> Result<ControlParameters, ArgsError<'a>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut pulse_width = DEFAULT_PULSE_WIDTH;
    let mut max_pulse_width = MAX_PULSE_WIDTH_LIMIT;
    let mut pulse_step = DEFAULT_PULSE_STEP;
    let mut retry_interval = MIN_RETRY_INTERVAL;
    let mut test_duration = DEFAULT_TEST_DURATION;

    let mut args = args.into_iter();
    while let Some(flag) = args.next() {
        let target = match flag {
            "-tt" | "--test_time" => &mut test_duration,
            "-pw" | "--pulse_width" => &mut pulse_width,
            "-mpw" | "--max_pulse_width" => &mut max_pulse_width,
            "-ps" | "--pulse_step" => &mut pulse_step,
            "-ri" | "--retry_interval" => &mut retry_interval,
            other => return Err(ArgsError::UnknownFlag { flag: other }),
        };
        let unit = if flag == "-tt" || flag == "--test_time" {
            DefaultUnit::Seconds
        } else {
            DefaultUnit::Millis
        };

        let raw = args.next().ok_or(ArgsError::MissingValue { flag })?;
        *target = parse_duration(raw, unit).ok_or(ArgsError::InvalidValue { flag, value: raw })?;
    }

    ControlParameters::new(
        pulse_width,
        max_pulse_width,
        pulse_step,
        retry_interval,
        test_duration,
    )
    .map_err(ArgsError::from)
}

/// Parses `<digits>[ms|s]` into a [`Duration`].
fn parse_duration(raw: &str, unit: DefaultUnit) -> Option<Duration> {
    let mut literal = (digit1::<&str, ContextError>, opt(alt(("ms", "s"))));
    let (digits, suffix) = literal.parse(raw).ok()?;
    let magnitude: u64 = digits.parse().ok()?;

    match suffix {
        Some("ms") => Some(Duration::from_millis(magnitude)),
        Some(_) => Some(Duration::from_secs(magnitude)),
        None => match unit {
            DefaultUnit::Seconds => Some(Duration::from_secs(magnitude)),
            DefaultUnit::Millis => Some(Duration::from_millis(magnitude)),
        },
    }
}
