use core::fmt;

use embassy_time::Instant;
#[allow(unused_imports)]
use micromath::F32Ext;

use crate::config::SPEED_OF_SOUND_CM_PER_US;
use crate::error::MeasurementError;

/// Distance to the obstacle in centimeters
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Distance(f32);

impl Distance {
    /// Distance for a round trip of `duration_us` microseconds: half the path sound travels.
    pub fn from_duration_us(duration_us: u64) -> Result<Self, MeasurementError> {
        if duration_us == 0 {
            return Err(MeasurementError::InvalidPulse);
        }
        Ok(Self(duration_us as f32 * SPEED_OF_SOUND_CM_PER_US / 2.0))
    }

    /// Distance for an echo pulse that rose at `rise` and fell at `fall`.
    pub fn from_echo(rise: Instant, fall: Instant) -> Result<Self, MeasurementError> {
        let width = fall
            .checked_duration_since(rise)
            .ok_or(MeasurementError::InvalidPulse)?;
        Self::from_duration_us(width.as_micros())
    }

    /// Nearest whole centimeter, as printed on the console.
    pub fn rounded_cm(&self) -> u32 {
        self.0.round() as u32
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cm", self.rounded_cm())
    }
}
