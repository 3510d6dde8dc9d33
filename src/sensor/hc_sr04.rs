use crate::sensor::Config;
use defmt::{debug, info};
use embassy_executor::{SendSpawner, SpawnError};
use embassy_futures::select::{Either3, select3};
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::Output;
use embassy_time::{Delay, Duration, Instant, Timer};
use sonar_core::{EchoCapture, EchoChannel, TriggerDriver};

pub type Trigger = TriggerDriver<Output<'static>, Delay>;

/// HC-SR04 ultrasonic ranger: a trigger line we pulse and an echo line we time.
pub struct HcSr04 {
    trigger: Trigger,
    echo_pin: ExtiInput<'static>,
    echo_timeout: Duration,
}

impl HcSr04 {
    pub fn init_new(config: Config) -> Self {
        info!("Initializing HC-SR04 ultrasonic sensor");
        let timing = config.timing_config;
        let Ok(trigger) = TriggerDriver::new(config.trigger_pin, Delay, timing.trigger_pulse);
        debug!(
            "  trigger pulse {} us, echo timeout {} us",
            timing.trigger_pulse.as_micros(),
            timing.echo_timeout.as_micros()
        );
        Self {
            trigger,
            echo_pin: config.echo_pin,
            echo_timeout: timing.echo_timeout,
        }
    }

    /// Move the echo line to the capture task on `spawner` and hand back the trigger.
    ///
    /// `spawner` should belong to an executor running above thread mode, so the capture
    /// preempts the supervisor like an interrupt handler would.
    pub fn start_capture(
        self,
        spawner: SendSpawner,
        channel: &'static EchoChannel,
    ) -> Result<Trigger, SpawnError> {
        spawner.spawn(echo_capture_task(self.echo_pin, channel, self.echo_timeout)?);
        info!("Echo capture running");
        Ok(self.trigger)
    }
}

/// Embassy task timing the echo pulse
///
/// Waits on any edge of the echo line, the pending timeout alarm and rearm requests from
/// the trigger, whichever comes first, and feeds the result to the capture state machine.
#[embassy_executor::task]
async fn echo_capture_task(
    mut echo_pin: ExtiInput<'static>,
    channel: &'static EchoChannel,
    timeout: Duration,
) -> ! {
    let mut capture = EchoCapture::new(channel, timeout);
    debug!("Echo capture task running");

    loop {
        // Catch up on an edge that came while we were not waiting on the line.
        capture.on_level(echo_pin.is_high(), Instant::now());

        let deadline = capture.alarm();
        let alarm = async move {
            match deadline {
                Some(at) => Timer::at(at).await,
                None => core::future::pending().await,
            }
        };

        let event = select3(echo_pin.wait_for_any_edge(), alarm, channel.rearmed()).await;
        match event {
            // Echo pulses last far longer than our wake-up latency, so the level
            // still tells which edge it was.
            Either3::First(()) => capture.on_level(echo_pin.is_high(), Instant::now()),
            Either3::Second(()) => capture.on_alarm(),
            Either3::Third(()) => capture.rearm(),
        }
    }
}
