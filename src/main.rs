#![no_std]
#![no_main]

mod sensor;
mod serial_console;

use defmt::*;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_stm32::exti::{self, ExtiInput};
use embassy_stm32::gpio::{Level, Output, Pull, Speed};
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_stm32::{bind_interrupts, interrupt, peripherals, usart};
use embassy_time::{Instant, Timer};
use sonar_core::{BANNER, Console, EchoChannel, Supervisor, TimingConfig, WallClock, supervisor};
use {defmt_rtt as _, panic_probe as _};

use crate::sensor::hc_sr04::HcSr04;

bind_interrupts!(
    pub struct Irqs {
        EXTI15_10 => exti::InterruptHandler<interrupt::typelevel::EXTI15_10>;
        USART2 => usart::BufferedInterruptHandler<peripherals::USART2>;
    }
);

static ECHO: EchoChannel = EchoChannel::new();

// Echo capture runs here, preempting the thread-mode supervisor.
static EXECUTOR_ECHO: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn UART4() {
    unsafe { EXECUTOR_ECHO.on_interrupt() }
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_stm32::init(Default::default());
    info!("Sonar booting");

    let timing_config = TimingConfig::default();
    let clock = WallClock::default();
    info!("Wall clock starts at {}", Display2Format(&clock.datetime()));

    let uart = serial_console::init_console(p.USART2, p.PA3, p.PA2, Irqs);
    let (tx, mut rx) = uart.split();
    let mut console = Console::new(tx);

    // Trigger on D7, echo on D6 of the Arduino header.
    let hc_sr04 = HcSr04::init_new(sensor::Config {
        timing_config,
        trigger_pin: Output::new(p.PA8, Level::Low, Speed::VeryHigh),
        echo_pin: ExtiInput::new(p.PB10, p.EXTI10, Pull::Down, Irqs),
    });

    Timer::after(timing_config.boot_delay).await;
    if let Err(e) = console.write_line(BANNER).await {
        warn!("Failed to write banner: {}", e);
    }

    interrupt::UART4.set_priority(Priority::P6);
    let echo_spawner = EXECUTOR_ECHO.start(interrupt::UART4);
    let mut trigger = unwrap!(hc_sr04.start_capture(echo_spawner, &ECHO));

    let supervisor = Supervisor::new(timing_config, clock, Instant::now());
    info!("Send 'start' or 'stop' on the console");
    supervisor::run(supervisor, &mut rx, &mut console, &mut trigger, &ECHO).await
}
