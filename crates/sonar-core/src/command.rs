//! Console command intake: one byte at a time into a bounded line, dispatched on `\r`/`\n`.

use core::fmt;

use heapless::{String, Vec};

use crate::config::LINE_CAPACITY;

/// Verbs listed in the help line
pub const HELP: &str = "Comandos disponíveis: 'start', 'stop'";

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command<const N: usize = LINE_CAPACITY> {
    Start,
    Stop,
    Unknown(String<N>),
}

/// A dispatched line.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Line<const N: usize = LINE_CAPACITY> {
    pub text: String<N>,
    /// Characters were dropped because the buffer was full
    pub truncated: bool,
}

impl<const N: usize> Line<N> {
    pub fn command(&self) -> Command<N> {
        if self.text.eq_ignore_ascii_case("start") {
            Command::Start
        } else if self.text.eq_ignore_ascii_case("stop") {
            Command::Stop
        } else {
            Command::Unknown(self.text.clone())
        }
    }
}

/// Accumulates console bytes until a line delimiter.
///
/// Holds at most `N - 1` bytes; anything past that is dropped until the delimiter.
pub struct CommandIntake<const N: usize = LINE_CAPACITY> {
    buf: Vec<u8, N>,
    truncated: bool,
}

impl<const N: usize> CommandIntake<N> {
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            truncated: false,
        }
    }

    /// Feed one byte. Returns the finished line when `byte` ends a non-empty one.
    pub fn push(&mut self, byte: u8) -> Option<Line<N>> {
        match byte {
            b'\r' | b'\n' => {
                if self.buf.is_empty() {
                    self.truncated = false;
                    return None;
                }
                let line = Line {
                    text: self.text(),
                    truncated: self.truncated,
                };
                self.buf.clear();
                self.truncated = false;
                Some(line)
            }
            _ if self.buf.len() < N.saturating_sub(1) => {
                // Cannot fail: length checked above.
                let _ = self.buf.push(byte);
                None
            }
            _ => {
                self.truncated = true;
                None
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.buf.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Buffered bytes as text, cut at the first invalid UTF-8 sequence.
    fn text(&self) -> String<N> {
        let valid = match core::str::from_utf8(&self.buf) {
            Ok(s) => s,
            Err(e) => core::str::from_utf8(&self.buf[..e.valid_up_to()]).unwrap_or_default(),
        };
        let mut text = String::new();
        // Fits: `valid` is a prefix of `buf`, which holds fewer than N bytes.
        let _ = text.push_str(valid);
        text
    }
}

impl<const N: usize> Default for CommandIntake<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Confirmation or diagnostic printed in answer to a command
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reply<const N: usize = LINE_CAPACITY> {
    Started,
    Paused,
    Unknown(String<N>),
}

impl<const N: usize> fmt::Display for Reply<N> {
    /// Multi-line replies are separated by `\r\n`; the console adds the final terminator.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Started => f.write_str("Sistema iniciado. Medindo distancia."),
            Reply::Paused => f.write_str("Sistema pausado."),
            Reply::Unknown(cmd) => write!(f, "Comando desconhecido: {}\r\n{}", cmd, HELP),
        }
    }
}
