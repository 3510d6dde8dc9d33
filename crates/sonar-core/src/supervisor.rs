//! The cooperative supervisor: command intake, clock upkeep and measurement pacing.
//!
//! [`Supervisor`] holds the foreground state and makes every decision; [`Supervisor::step`]
//! is one pass of the loop that feeds it from the console, the clock and the echo channel.

use embassy_time::{Instant, with_timeout};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_io_async::{Read, Write};

use crate::clock::{ClockService, WallClock};
use crate::command::{Command, CommandIntake, Reply};
use crate::config::{LINE_CAPACITY, TimingConfig};
use crate::console::{self, Console};
use crate::echo::{EchoChannel, EchoResult};
use crate::report::Report;
use crate::trigger::TriggerDriver;

pub struct Supervisor {
    config: TimingConfig,
    active: bool,
    clock: ClockService,
    intake: CommandIntake,
    last_measurement: Instant,
}

impl Supervisor {
    pub fn new(config: TimingConfig, clock: WallClock, now: Instant) -> Self {
        Self {
            config,
            active: false,
            clock: ClockService::new(clock, config.clock_tick, now),
            intake: CommandIntake::new(),
            last_measurement: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Advance the wall clock if a tick is due.
    pub fn tick_clock(&mut self, now: Instant) -> bool {
        self.clock.poll(now)
    }

    /// Feed one console byte; a completed line is executed and answered.
    pub fn feed(&mut self, byte: u8) -> Option<Reply> {
        let line = self.intake.push(byte)?;
        if line.truncated {
            warn!("command longer than {} bytes, truncated", LINE_CAPACITY - 1);
        }
        let reply = match line.command() {
            Command::Start => {
                self.active = true;
                Reply::Started
            }
            Command::Stop => {
                self.active = false;
                Reply::Paused
            }
            Command::Unknown(text) => Reply::Unknown(text),
        };
        info!("command: {}", reply);
        Some(reply)
    }

    pub fn measurement_due(&self, now: Instant) -> bool {
        self.is_active()
            && now.saturating_duration_since(self.last_measurement)
                >= self.config.measurement_period
    }

    /// Record the trigger instant; the next measurement is due one period later.
    pub fn begin_measurement(&mut self, now: Instant) {
        self.last_measurement = now;
    }

    /// Turn the echo result of the cycle into the line to print.
    pub fn finish_measurement(&self, result: EchoResult) -> Report {
        let reading = result.distance();
        match &reading {
            Ok(distance) => debug!("echo {} -> {}", result, distance),
            Err(e) => warn!("measurement failed: {}", e),
        }
        Report::new(self.clock.stamp(), reading)
    }

    /// One pass of the supervisor loop.
    ///
    /// Polls the console for one byte, upkeeps the clock, executes a finished command and,
    /// while active and due, fires the trigger and reports the echo.
    pub async fn step<R, W, P, D>(
        &mut self,
        rx: &mut R,
        console: &mut Console<W>,
        trigger: &mut TriggerDriver<P, D>,
        echo: &EchoChannel,
    ) where
        R: Read,
        W: Write,
        P: OutputPin,
        D: DelayNs,
    {
        let received = match with_timeout(self.config.console_poll, console::read_byte(rx)).await
        {
            Ok(Ok(byte)) => byte,
            Ok(Err(e)) => {
                warn!("console read failed: {}", e);
                None
            }
            Err(_) => None,
        };

        let now = Instant::now();
        self.tick_clock(now);

        if let Some(reply) = received.and_then(|byte| self.feed(byte)) {
            if let Err(e) = console.write_line(&reply).await {
                warn!("console write failed: {}", e);
            }
        }

        if self.measurement_due(now) {
            if trigger.fire(echo).is_err() {
                warn!("trigger pin error");
            }
            self.begin_measurement(now);

            // The capture settles within the echo timeout; past the wait it counts as no echo.
            if with_timeout(self.config.echo_wait, echo.settled()).await.is_err() {
                debug!("no terminal echo result after {}", self.config.echo_wait);
            }
            let report = self.finish_measurement(echo.take());
            if let Err(e) = console.write_line(&report).await {
                warn!("console write failed: {}", e);
            }
        }
    }
}

/// Supervisor loop. Never returns.
pub async fn run<R, W, P, D>(
    mut supervisor: Supervisor,
    rx: &mut R,
    console: &mut Console<W>,
    trigger: &mut TriggerDriver<P, D>,
    echo: &EchoChannel,
) -> !
where
    R: Read,
    W: Write,
    P: OutputPin,
    D: DelayNs,
{
    loop {
        supervisor.step(rx, console, trigger, echo).await;
    }
}
