use defmt::{info, warn};

use latch_core::controller::{LatchController, RunVerdict};
use latch_core::io::NeverCancel;

use crate::hw::{EmbassyClock, LatchCircuit};
use crate::runtime::RequestReceiver;
use crate::status;
use crate::telemetry::AttemptRecorder;

#[embassy_executor::task]
pub async fn run(mut circuit: LatchCircuit<'static>, requests: RequestReceiver<'static>) -> ! {
    let mut clock = EmbassyClock;
    let mut recorder = AttemptRecorder::new();

    loop {
        let request = requests.receive().await;
        info!(
            "latch run: pulse {}ms step {}ms ceiling {}ms budget {}us",
            request.params.pulse_width().as_millis() as u32,
            request.params.pulse_step().as_millis() as u32,
            request.params.max_pulse_width().as_millis() as u32,
            request.params.test_duration().as_micros() as u64,
        );

        recorder.reset();
        status::record_run_started();
        let controller = LatchController::with_policy(request.params, request.policy);

        // Blocks this executor thread for the whole test pass, by contract.
        let report =
            match controller.run_with(&mut circuit, &mut clock, &mut recorder, &NeverCancel::new())
            {
                Ok(report) => report,
                Err(err) => match err {},
            };
        status::record_run_finished(&report);

        match report.verdict {
            RunVerdict::Latched | RunVerdict::TimedOutLatched => info!(
                "latch engaged: final width {}ms after {} pulses in {}us",
                report.final_pulse_width.as_millis() as u32,
                report.pulses_issued,
                report.elapsed_micros,
            ),
            RunVerdict::TimedOutUnlatched => warn!(
                "latch never engaged: held at {}ms for {} pulses over {}us",
                report.final_pulse_width.as_millis() as u32,
                report.pulses_issued,
                report.elapsed_micros,
            ),
            RunVerdict::Cancelled => warn!(
                "latch run cancelled after {} pulses",
                report.pulses_issued
            ),
        }
    }
}
