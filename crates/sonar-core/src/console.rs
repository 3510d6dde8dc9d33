use core::fmt::{self, Write as _};

use embedded_io::Error as _;
use embedded_io_async::{Read, Write};
use heapless::String;

use crate::error::ConsoleError;

/// Line terminator on the wire
pub const LINE_END: &str = "\r\n";

const LINE_BUFFER: usize = 128;

/// Line-oriented writer over the serial console
pub struct Console<W> {
    tx: W,
}

impl<W: Write> Console<W> {
    pub fn new(tx: W) -> Self {
        Self { tx }
    }

    /// Format `line`, append the terminator and send it.
    ///
    /// A line longer than the buffer is sent truncated and reported as `Format`.
    pub async fn write_line(&mut self, line: impl fmt::Display) -> Result<(), ConsoleError> {
        let mut buf: String<LINE_BUFFER> = String::new();
        let formatted = write!(buf, "{}", line);
        self.send(buf.as_bytes()).await?;
        self.send(LINE_END.as_bytes()).await?;
        formatted.map_err(|_| ConsoleError::Format)
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), ConsoleError> {
        self.tx
            .write_all(bytes)
            .await
            .map_err(|e| ConsoleError::Write(e.kind()))?;
        self.tx.flush().await.map_err(|e| ConsoleError::Write(e.kind()))
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.tx
    }
}

/// Read one byte. `Ok(None)` when the reader reports end of stream.
pub async fn read_byte<R: Read>(rx: &mut R) -> Result<Option<u8>, ConsoleError> {
    let mut byte = [0u8; 1];
    match rx.read(&mut byte).await {
        Ok(0) => Ok(None),
        Ok(_) => Ok(Some(byte[0])),
        Err(e) => Err(ConsoleError::Read(e.kind())),
    }
}
