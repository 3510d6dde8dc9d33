//! Measurement state machine for an HC-SR04 ultrasonic ranger reporting over a serial console.
//!
//! Everything here is independent of the board: pins, delays and the console are reached
//! through `embedded-hal` / `embedded-io-async` traits, and time through `embassy-time`.
#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
#[macro_use]
mod fmt;

pub mod clock;
pub mod command;
pub mod config;
pub mod console;
pub mod distance;
pub mod echo;
pub mod error;
pub mod report;
pub mod supervisor;
pub mod trigger;

pub use clock::{ClockService, Stamp, WallClock};
pub use command::{Command, CommandIntake, Line, Reply};
pub use config::TimingConfig;
pub use console::Console;
pub use distance::Distance;
pub use echo::{Edge, EchoCapture, EchoChannel, EchoResult};
pub use error::{ConsoleError, MeasurementError};
pub use report::{Report, BANNER};
pub use supervisor::Supervisor;
pub use trigger::TriggerDriver;
