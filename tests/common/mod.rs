#![allow(dead_code)]

use breatheaudio::{LinkEnd, SerialLink};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// State of one simulated zone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimZone {
    pub power: bool,
    pub mute: bool,
    pub native_volume: u8,
    pub source: u8,
}

impl Default for SimZone {
    fn default() -> Self {
        Self {
            power: false,
            mute: false,
            native_volume: 20,
            source: 1,
        }
    }
}

/// In-memory model of the amplifier's command handling
#[derive(Debug, Default)]
pub struct SimAmplifier {
    pub zones: [SimZone; 6],
    pub frames: Vec<String>,
    /// Stop answering entirely
    pub silent: bool,
}

impl SimAmplifier {
    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::default()))
    }

    pub fn zone(&self, zone: u8) -> SimZone {
        self.zones[usize::from(zone) - 1]
    }

    /// Apply a frame and produce the reply bytes
    pub fn handle(&mut self, frame: &[u8]) -> Option<Vec<u8>> {
        let text = String::from_utf8_lossy(frame).into_owned();
        self.frames.push(text.clone());
        if self.silent {
            return None;
        }

        let body = text.strip_prefix("*Z0")?.strip_suffix('\r')?;
        let zone: u8 = body.get(..1)?.parse().ok()?;
        let state = self.zones.get_mut(usize::from(zone).checked_sub(1)?)?;
        let command = &body[1..];

        match command {
            "CONSR" => {
                let report = if !state.power {
                    format!("#Z0{}PWROFF", zone)
                } else {
                    let volume = if state.mute {
                        "MT".to_string()
                    } else {
                        format!("{:02}", state.native_volume)
                    };
                    format!(
                        "#Z0{}PWRON,SRC{},GRP1,VOL-{},POFF",
                        zone, state.source, volume
                    )
                };
                // Status reports start with a bare terminator
                return Some(format!("\r{}\r", report).into_bytes());
            }
            "ON" => state.power = true,
            "OFF" => state.power = false,
            "MTON" => state.mute = true,
            "MTOFF" => state.mute = false,
            other => {
                if let Some(volume) = other.strip_prefix("VOL") {
                    state.native_volume = volume.parse().ok()?;
                } else if let Some(source) = other.strip_prefix("SRC") {
                    state.source = source.parse().ok()?;
                } else {
                    return None;
                }
            }
        }
        Some(b"\r".to_vec())
    }
}

/// Blocking link wired to a simulated amplifier
pub struct SimLink {
    pub amp: Arc<Mutex<SimAmplifier>>,
    pending: Vec<u8>,
    input: VecDeque<u8>,
}

impl SimLink {
    pub fn new(amp: Arc<Mutex<SimAmplifier>>) -> Self {
        Self {
            amp,
            pending: Vec::new(),
            input: VecDeque::new(),
        }
    }
}

impl Read for SimLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.input.pop_front() {
            Some(b) => {
                buf[0] = b;
                Ok(1)
            }
            None => Err(io::ErrorKind::TimedOut.into()),
        }
    }
}

impl Write for SimLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        if self.pending.ends_with(b"\r") {
            let frame = std::mem::take(&mut self.pending);
            if let Some(reply) = self.amp.lock().unwrap().handle(&frame) {
                self.input.extend(reply);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialLink for SimLink {
    fn discard_buffers(&mut self) -> io::Result<()> {
        self.input.clear();
        Ok(())
    }
}

/// Serve a push-driven link from a simulated amplifier
///
/// Replies are pushed in three-byte chunks to exercise reassembly.
pub fn spawn_device(link: LinkEnd, amp: Arc<Mutex<SimAmplifier>>) -> JoinHandle<()> {
    let LinkEnd {
        mut outbound,
        inbound,
    } = link;
    tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let reply = amp.lock().unwrap().handle(&frame);
            if let Some(reply) = reply {
                for chunk in reply.chunks(3) {
                    inbound.push(chunk);
                    tokio::task::yield_now().await;
                }
            }
        }
    })
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
