//! Cooperative transport driven by a push queue
//!
//! Inbound bytes are pushed into an unbounded queue by whatever owns the
//! physical link (a reader task, a reader thread, or a test double). A
//! transaction drains that queue while holding an async mutex, so only one
//! request is ever in flight.

use crate::config::SerialSettings;
use crate::error::{BreatheError, Result};
use crate::protocol::EOL;
use crate::serial::open_port;
use serialport::ClearBuffer;
use std::io::{self, Read, Write};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio::time::timeout;

/// Push side of the inbound byte queue
#[derive(Clone, Debug)]
pub struct InboundSink {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl InboundSink {
    /// Append received bytes. Returns `false` once the transport is gone.
    pub fn push(&self, data: &[u8]) -> bool {
        if data.is_empty() {
            return !self.tx.is_closed();
        }
        self.tx.send(data.to_vec()).is_ok()
    }

    /// Whether the transport has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Device-facing end of a push-driven link
///
/// Frames written by the transport arrive on `outbound`; bytes read from the
/// device go into `inbound`.
pub struct LinkEnd {
    pub outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    pub inbound: InboundSink,
}

/// Async transport with one-at-a-time transactions
pub struct AsyncTransport {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    timeout: Duration,
}

impl AsyncTransport {
    /// Create a transport and the link end that feeds it
    pub fn channel(timeout: Duration) -> (Self, LinkEnd) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let transport = Self {
            outbound: outbound_tx,
            inbound: Mutex::new(inbound_rx),
            timeout,
        };
        let link = LinkEnd {
            outbound: outbound_rx,
            inbound: InboundSink { tx: inbound_tx },
        };
        (transport, link)
    }

    /// Drive the transport over any async byte stream
    ///
    /// Spawns a writer task and a reader task on the current runtime.
    pub fn from_stream<S>(stream: S, timeout: Duration) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut read, mut write) = tokio::io::split(stream);
        let (transport, LinkEnd { mut outbound, inbound }) = Self::channel(timeout);

        // Spawn task to forward outgoing frames to the stream
        tokio::spawn(async move {
            while let Some(frame) = outbound.recv().await {
                if let Err(e) = write.write_all(&frame).await {
                    tracing::error!("Failed to write frame: {}", e);
                    break;
                }
                if let Err(e) = write.flush().await {
                    tracing::error!("Failed to flush frame: {}", e);
                    break;
                }
            }
        });

        // Spawn task to push received bytes into the queue
        tokio::spawn(async move {
            let mut buf = [0u8; 256];
            loop {
                match read.read(&mut buf).await {
                    Ok(0) => {
                        tracing::info!("Link closed by peer");
                        break;
                    }
                    Ok(n) => {
                        if !inbound.push(&buf[..n]) {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Link read error: {}", e);
                        break;
                    }
                }
            }
        });

        transport
    }

    /// Open a serial port and drive it from two background threads
    pub fn open(path: &str, settings: &SerialSettings) -> Result<Self> {
        let mut writer = open_port(path, settings)?;
        let mut reader = writer.try_clone()?;
        let (transport, LinkEnd { mut outbound, inbound }) = Self::channel(settings.timeout());

        std::thread::Builder::new()
            .name("breatheaudio-tx".to_string())
            .spawn(move || {
                while let Some(frame) = outbound.blocking_recv() {
                    let written = writer
                        .clear(ClearBuffer::All)
                        .map_err(io::Error::from)
                        .and_then(|_| writer.write_all(&frame))
                        .and_then(|_| writer.flush());
                    if let Err(e) = written {
                        tracing::error!("Failed to write frame: {}", e);
                        break;
                    }
                }
            })?;

        std::thread::Builder::new()
            .name("breatheaudio-rx".to_string())
            .spawn(move || {
                let mut buf = [0u8; 64];
                while !inbound.is_closed() {
                    match reader.read(&mut buf) {
                        Ok(n) => {
                            if !inbound.push(&buf[..n]) {
                                break;
                            }
                        }
                        Err(e)
                            if matches!(
                                e.kind(),
                                io::ErrorKind::TimedOut
                                    | io::ErrorKind::WouldBlock
                                    | io::ErrorKind::Interrupted
                            ) => {}
                        Err(e) => {
                            tracing::error!("Serial read error: {}", e);
                            break;
                        }
                    }
                }
            })?;

        Ok(transport)
    }

    /// Take exclusive use of the link for one or more transactions
    pub async fn lock(&self) -> AsyncSession<'_> {
        AsyncSession {
            transport: self,
            inbound: self.inbound.lock().await,
        }
    }

    /// Run a single transaction
    pub async fn transact(&self, request: &[u8], skip: usize) -> Result<String> {
        self.lock().await.transact(request, skip).await
    }
}

/// Exclusive access to an async link
pub struct AsyncSession<'a> {
    transport: &'a AsyncTransport,
    inbound: MutexGuard<'a, mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl AsyncSession<'_> {
    /// Send `request` and wait until the reply ends with the terminator
    ///
    /// Each chunk must arrive within the transport timeout. Bytes received
    /// before a timeout are returned in the error and otherwise dropped.
    pub async fn transact(&mut self, request: &[u8], skip: usize) -> Result<String> {
        // Only one transaction at a time; anything queued now is stale
        while self.inbound.try_recv().is_ok() {}

        tracing::debug!("Sending {:?}", String::from_utf8_lossy(request));
        self.transport
            .outbound
            .send(request.to_vec())
            .map_err(|_| BreatheError::ConnectionClosed)?;

        let mut result = Vec::new();
        loop {
            match timeout(self.transport.timeout, self.inbound.recv()).await {
                Ok(Some(chunk)) => {
                    result.extend_from_slice(&chunk);
                    if result.len() > skip && result.ends_with(EOL) {
                        break;
                    }
                }
                Ok(None) => return Err(BreatheError::ConnectionClosed),
                Err(_) => {
                    tracing::error!(
                        "Timeout during receiving response for command {:?}, received {:?}",
                        String::from_utf8_lossy(request),
                        String::from_utf8_lossy(&result)
                    );
                    return Err(BreatheError::Timeout { received: result });
                }
            }
        }

        let reply = String::from_utf8_lossy(&result).into_owned();
        tracing::debug!("Received {:?}", reply);
        Ok(reply)
    }
}
