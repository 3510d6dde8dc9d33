//! Wall clock used to stamp the output lines.
//!
//! The clock is advanced in software from monotonic time; it is never read back from hardware.

use core::fmt;

use chrono::{NaiveDateTime, TimeDelta, Timelike};
use embassy_time::{Duration, Instant};

use crate::config;

/// `HH:MM:SS` value printed at the start of every measurement line
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stamp {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

/// Calendar time kept one second at a time. The date rolls over at midnight, the stamp wraps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WallClock {
    now: NaiveDateTime,
}

impl WallClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now }
    }

    /// Advance by exactly one second, carrying into minutes, hours and the date.
    pub fn tick(&mut self) {
        if let Some(next) = self.now.checked_add_signed(TimeDelta::seconds(1)) {
            self.now = next;
        }
    }

    pub fn stamp(&self) -> Stamp {
        Stamp {
            hour: self.now.hour() as u8,
            minute: self.now.minute() as u8,
            second: self.now.second() as u8,
        }
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.now
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new(config::start_time())
    }
}

/// Ticks a [`WallClock`] once per elapsed `period` of monotonic time.
pub struct ClockService {
    clock: WallClock,
    period: Duration,
    last_tick: Instant,
}

impl ClockService {
    pub fn new(clock: WallClock, period: Duration, now: Instant) -> Self {
        Self {
            clock,
            period,
            last_tick: now,
        }
    }

    /// Tick at most once if a full period has elapsed since the last tick.
    ///
    /// The last-tick instant moves forward by one period rather than to `now`, so a late
    /// poll does not make the clock drift; after a long stall it catches up one tick per call.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_tick) < self.period {
            return false;
        }
        self.clock.tick();
        self.last_tick += self.period;
        true
    }

    pub fn stamp(&self) -> Stamp {
        self.clock.stamp()
    }
}
