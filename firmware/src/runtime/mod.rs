use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver};

use latch_core::controller::ExitPolicy;
use latch_core::params::ControlParameters;

use crate::hw::LatchCircuit;

mod latch_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Depth of the run-request queue feeding the latch task.
pub const REQUEST_QUEUE_DEPTH: usize = 4;

/// One controller run waiting to be serviced.
#[derive(Copy, Clone, Debug)]
pub struct RunRequest {
    pub params: ControlParameters,
    pub policy: ExitPolicy,
}

pub type RequestQueue = Channel<ThreadModeRawMutex, RunRequest, REQUEST_QUEUE_DEPTH>;
pub type RequestReceiver<'a> = Receiver<'a, ThreadModeRawMutex, RunRequest, REQUEST_QUEUE_DEPTH>;

pub(super) static RUN_REQUESTS: RequestQueue = Channel::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals { PA2, PA4, .. } = hal::init(config);

    // PA2 drives the relay that feeds the latch release coil; PA4 reads the
    // latch status microswitch. The coil idles de-energized.
    let circuit = LatchCircuit::new(
        Output::new(PA2, Level::Low, Speed::Low),
        Input::new(PA4, Pull::Down),
    );

    spawner
        .spawn(latch_task::run(circuit, RUN_REQUESTS.receiver()))
        .expect("failed to spawn latch control task");

    // One test pass with the stock parameters at boot; later requests can be
    // queued by whatever front-end grows around this.
    RUN_REQUESTS
        .send(RunRequest {
            params: ControlParameters::defaults(),
            policy: ExitPolicy::PollForFullDuration,
        })
        .await;

    core::future::pending::<()>().await;
}
