use embedded_io::ErrorKind;

/// Why a measurement cycle produced no distance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MeasurementError {
    /// Rising edge seen, but no falling edge within the echo timeout
    EchoTimeout,
    /// No rising edge before the supervisor stopped waiting
    NoEcho,
    /// Falling edge not after the rising edge
    InvalidPulse,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleError {
    Read(ErrorKind),
    Write(ErrorKind),
    /// A line did not fit the output buffer
    Format,
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConsoleError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConsoleError::Read(kind) => defmt::write!(f, "Read({})", defmt::Debug2Format(kind)),
            ConsoleError::Write(kind) => defmt::write!(f, "Write({})", defmt::Debug2Format(kind)),
            ConsoleError::Format => defmt::write!(f, "Format"),
        }
    }
}
