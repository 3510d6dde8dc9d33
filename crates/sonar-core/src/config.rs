use chrono::{NaiveDate, NaiveDateTime};
use embassy_time::Duration;

/// Speed of sound at 20 °C, sea level, in centimeters per microsecond.
pub const SPEED_OF_SOUND_CM_PER_US: f32 = 0.0343;

/// Command line buffer size. One slot stays free, so a line holds at most `LINE_CAPACITY - 1` bytes.
pub const LINE_CAPACITY: usize = 20;

/// Wall-clock value at boot (year, month, day, hour, minute, second).
pub const START_TIME: (i32, u32, u32, u32, u32, u32) = (2025, 3, 16, 21, 30, 0);

/// Timing of the measurement cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingConfig {
    /// Width of the active-high trigger pulse (HC-SR04 needs at least 10 µs)
    pub trigger_pulse: Duration,
    /// Longest echo accepted between rising and falling edge
    pub echo_timeout: Duration,
    /// How long the supervisor waits for a result after firing
    pub echo_wait: Duration,
    /// Minimum time between two measurements
    pub measurement_period: Duration,
    /// Wall-clock resolution
    pub clock_tick: Duration,
    /// Deadline of a single console poll
    pub console_poll: Duration,
    /// Delay between reset and the banner
    pub boot_delay: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            trigger_pulse: Duration::from_micros(10),
            echo_timeout: Duration::from_micros(30_000),
            echo_wait: Duration::from_millis(50),
            measurement_period: Duration::from_secs(1),
            clock_tick: Duration::from_secs(1),
            console_poll: Duration::from_millis(1),
            boot_delay: Duration::from_secs(2),
        }
    }
}

/// The boot wall-clock value, or the epoch if `START_TIME` is not a valid date.
pub fn start_time() -> NaiveDateTime {
    let (year, month, day, hour, min, sec) = START_TIME;
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, min, sec))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn start_time_is_valid() {
        let t = start_time();
        assert_eq!((t.year(), t.month(), t.day()), (2025, 3, 16));
        assert_eq!((t.hour(), t.minute(), t.second()), (21, 30, 0));
    }

    #[test]
    fn echo_wait_covers_echo_timeout() {
        let config = TimingConfig::default();
        assert!(config.echo_wait > config.echo_timeout);
        assert!(config.echo_wait < config.measurement_period);
    }
}
