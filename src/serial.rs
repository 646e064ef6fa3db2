//! Thread-blocking transport over a serial port
//!
//! Each transaction discards stale buffers, writes one frame and then reads
//! byte by byte until the terminator, relying on the port's own read timeout.

use crate::config::SerialSettings;
use crate::error::{BreatheError, Result};
use crate::protocol::EOL;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::sync::{Mutex, MutexGuard};

/// A byte link the blocking transport can drive
///
/// Reads must give up with `TimedOut` (or return 0) once the link's
/// timeout window passes without data.
pub trait SerialLink: Read + Write + Send {
    /// Drop any bytes buffered in either direction
    fn discard_buffers(&mut self) -> io::Result<()>;
}

impl SerialLink for Box<dyn SerialPort> {
    fn discard_buffers(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::All).map_err(io::Error::from)
    }
}

/// Open a serial port with the amplifier's line settings (8N1)
pub fn open_port(path: &str, settings: &SerialSettings) -> Result<Box<dyn SerialPort>> {
    tracing::info!("Opening {} at {} baud", path, settings.baud_rate);

    let port = serialport::new(path, settings.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(settings.timeout())
        .open()?;

    Ok(port)
}

/// Blocking transport owning one serial link
///
/// Only one transaction runs at a time; callers on other threads wait on the
/// link lock.
pub struct BlockingTransport<L> {
    link: Mutex<L>,
}

impl<L: SerialLink> BlockingTransport<L> {
    pub fn new(link: L) -> Self {
        Self {
            link: Mutex::new(link),
        }
    }

    /// Take exclusive use of the link for one or more transactions
    pub fn lock(&self) -> BlockingSession<'_, L> {
        // A panic mid-transaction leaves nothing to repair: the next
        // transaction discards the link buffers anyway.
        let link = self.link.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        BlockingSession { link }
    }

    /// Run a single transaction
    pub fn transact(&self, request: &[u8], skip: usize) -> Result<String> {
        self.lock().transact(request, skip)
    }

    /// Give back the underlying link
    pub fn into_inner(self) -> L {
        self.link
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Exclusive access to a blocking link
pub struct BlockingSession<'a, L> {
    link: MutexGuard<'a, L>,
}

impl<L: SerialLink> BlockingSession<'_, L> {
    /// Send `request` and read until the reply ends with the terminator
    ///
    /// The terminator is only honoured once more than `skip` bytes have
    /// been received.
    pub fn transact(&mut self, request: &[u8], skip: usize) -> Result<String> {
        tracing::debug!("Sending {:?}", String::from_utf8_lossy(request));

        self.link.discard_buffers()?;
        self.link.write_all(request)?;
        self.link.flush()?;

        let mut result = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.link.read(&mut byte) {
                Ok(0) => return Err(BreatheError::Timeout { received: result }),
                Ok(_) => {
                    result.push(byte[0]);
                    if result.len() > skip && result.ends_with(EOL) {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) =>
                {
                    tracing::warn!(
                        "Timeout waiting for reply to {:?}, received {:?}",
                        String::from_utf8_lossy(request),
                        String::from_utf8_lossy(&result)
                    );
                    return Err(BreatheError::Timeout { received: result });
                }
                Err(e) => return Err(e.into()),
            }
        }

        let reply = String::from_utf8_lossy(&result).into_owned();
        tracing::debug!("Received {:?}", reply);
        Ok(reply)
    }
}
