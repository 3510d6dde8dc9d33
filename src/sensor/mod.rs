use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::Output;
use sonar_core::TimingConfig;

pub mod hc_sr04;

/// Configuration for the HC-SR04 ultrasonic sensor
pub struct Config {
    pub timing_config: TimingConfig,
    /// Trigger line, push-pull, idles low
    pub trigger_pin: Output<'static>,
    /// Echo line on an EXTI channel, watched on both edges
    pub echo_pin: ExtiInput<'static>,
}
