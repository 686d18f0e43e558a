mod rig;

use std::env;
use std::process;

use latch_core::cli;
use latch_core::controller::{ExitPolicy, LatchController, RunVerdict};
use latch_core::io::NeverCancel;
use latch_core::telemetry::{EventLog, RunEventKind};

use rig::{Profile, SimulatedLatch, VirtualClock};

const EVENT_LOG_CAPACITY: usize = 64;

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let (profile, policy, rest) = split_local_flags(&args).unwrap_or_else(|err| {
        eprintln!("{err}");
        usage();
        process::exit(2);
    });

    let params = cli::parse_args(rest.iter().copied()).unwrap_or_else(|err| {
        eprintln!("{err}");
        usage();
        process::exit(2);
    });

    let mut clock = VirtualClock::new();
    let mut latch = SimulatedLatch::new(profile, clock.shared_now());
    let mut log: EventLog<EVENT_LOG_CAPACITY> = EventLog::new();

    println!(
        "latch control test: profile {profile:?}, pulse {}ms step {}ms ceiling {}ms retry {}ms budget {}us",
        params.pulse_width().as_millis(),
        params.pulse_step().as_millis(),
        params.max_pulse_width().as_millis(),
        params.retry_interval().as_millis(),
        params.test_duration().as_micros(),
    );

    let controller = LatchController::with_policy(params, policy);
    let report = match controller.run_with(&mut latch, &mut clock, &mut log, &NeverCancel::new()) {
        Ok(report) => report,
        Err(err) => match err {},
    };

    println!("verdict: {}", verdict_label(report.verdict));
    println!("final pulse width: {}ms", report.final_pulse_width.as_millis());
    println!("pulses issued: {}", report.pulses_issued);
    println!("elapsed: {}us", report.elapsed_micros);

    if !log.is_empty() {
        println!("events:");
        for event in log.iter() {
            println!(
                "  {} width={}ms at={}us",
                kind_label(event.kind),
                event.pulse_width.as_millis(),
                event.at_micros,
            );
        }
    }

    process::exit(if report.verdict.engaged() { 0 } else { 1 });
}

/// Peels off the emulator-only flags, leaving the controller flag surface for
/// `latch_core::cli`.
fn split_local_flags(args: &[String]) -> Result<(Profile, ExitPolicy, Vec<&str>), String> {
    let mut profile = Profile::Nominal;
    let mut policy = ExitPolicy::PollForFullDuration;
    let mut rest = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(tag) = arg.strip_prefix("--profile=") {
            profile = Profile::from_tag(tag)?;
        } else if arg == "--profile" {
            let tag = iter
                .next()
                .ok_or_else(|| "expected value after --profile".to_string())?;
            profile = Profile::from_tag(tag)?;
        } else if arg == "--exit-on-success" {
            policy = ExitPolicy::ExitOnFirstSuccess;
        } else {
            rest.push(arg.as_str());
        }
    }

    Ok((profile, policy, rest))
}

fn usage() {
    eprintln!(
        "Usage: latch-emulator [--profile <nominal|stiff|stuck>] [--exit-on-success] \
         [--test_time N] [--pulse_width N] [--max_pulse_width N] [--pulse_step N] \
         [--retry_interval N]"
    );
}

fn verdict_label(verdict: RunVerdict) -> &'static str {
    match verdict {
        RunVerdict::Latched => "latched (early exit)",
        RunVerdict::TimedOutLatched => "timed out, latch engaged",
        RunVerdict::TimedOutUnlatched => "timed out, latch never engaged",
        RunVerdict::Cancelled => "cancelled",
    }
}

fn kind_label(kind: RunEventKind) -> &'static str {
    match kind {
        RunEventKind::PulseIssued => "pulse-issued",
        RunEventKind::Escalated => "escalated",
        RunEventKind::LatchConfirmed => "latch-confirmed",
        RunEventKind::EscalationExhausted => "escalation-exhausted",
        RunEventKind::EpisodeReopened => "episode-reopened",
    }
}
