use embassy_time::Duration;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::echo::EchoChannel;

/// Drives the sensor's trigger line.
pub struct TriggerDriver<P, D> {
    pin: P,
    delay: D,
    pulse_us: u32,
}

impl<P: OutputPin, D: DelayNs> TriggerDriver<P, D> {
    /// Take the trigger pin and drive it low, so every later state can assume it starts low.
    pub fn new(mut pin: P, delay: D, pulse: Duration) -> Result<Self, P::Error> {
        pin.set_low()?;
        // Widths past u32::MAX microseconds saturate.
        let pulse_us = u32::try_from(pulse.as_micros()).unwrap_or(u32::MAX);
        Ok(Self {
            pin,
            delay,
            pulse_us,
        })
    }

    /// Reset the echo result to `Pending`, then emit one active-high pulse.
    ///
    /// Blocks for the pulse width only; it does not wait for the echo.
    pub fn fire(&mut self, echo: &EchoChannel) -> Result<(), P::Error> {
        echo.rearm();
        self.pin.set_high()?;
        self.delay.delay_us(self.pulse_us);
        self.pin.set_low()
    }
}
