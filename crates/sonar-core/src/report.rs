use core::fmt;

use crate::clock::Stamp;
use crate::distance::Distance;
use crate::error::MeasurementError;

/// Printed once after boot
pub const BANNER: &str = "Escreva um dos comandos: 'start', 'stop'";

/// One measurement line: `HH:MM:SS - N cm` or `HH:MM:SS - Falha`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Report {
    pub stamp: Stamp,
    pub reading: Result<Distance, MeasurementError>,
}

impl Report {
    pub fn new(stamp: Stamp, reading: Result<Distance, MeasurementError>) -> Self {
        Self { stamp, reading }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reading {
            Ok(distance) => write!(f, "{} - {}", self.stamp, distance),
            Err(_) => write!(f, "{} - Falha", self.stamp),
        }
    }
}
