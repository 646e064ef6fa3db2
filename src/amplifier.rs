use crate::config::AmplifierConfig;
use crate::error::{BreatheError, Result};
use crate::protocol::{decode_status, Command};
use crate::serial::{open_port, BlockingSession, BlockingTransport, SerialLink};
use crate::snapshot::SnapshotStore;
use crate::types::{validate_zone, ZoneId, ZoneStatus};
use serialport::SerialPort;

/// Thread-blocking amplifier controller
///
/// Every call blocks the calling thread for one full transaction. Calls from
/// several threads are serialized on the transport lock, so replies are
/// always matched to their own request.
///
/// # Example
///
/// ```no_run
/// use breatheaudio::{Amplifier, AmplifierConfig};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let amp = Amplifier::open(&AmplifierConfig::new("/dev/ttyUSB0"))?;
///     amp.set_power(1, true)?;
///     amp.set_volume(1, 40)?;
///     if let Some(status) = amp.zone_status(1)? {
///         println!("Zone 1 volume: {:.0}%", status.volume);
///     }
///     Ok(())
/// }
/// ```
pub struct Amplifier<L> {
    transport: BlockingTransport<L>,
    snapshots: SnapshotStore,
}

impl Amplifier<Box<dyn SerialPort>> {
    /// Open the configured serial port
    pub fn open(config: &AmplifierConfig) -> Result<Self> {
        config.validate()?;
        let port = open_port(&config.port, &config.serial)?;
        Ok(Self::new(port))
    }
}

impl<L: SerialLink> Amplifier<L> {
    /// Wrap an already open link
    pub fn new(link: L) -> Self {
        Self {
            transport: BlockingTransport::new(link),
            snapshots: SnapshotStore::new(),
        }
    }

    /// Query the status of a zone
    ///
    /// Returns `None` when the reply cannot be decoded or the read times out;
    /// callers should keep their last known state in that case.
    pub fn zone_status(&self, zone: ZoneId) -> Result<Option<ZoneStatus>> {
        let zone = validate_zone(zone)?;
        match send(&mut self.transport.lock(), zone, Command::Status) {
            Ok(reply) => Ok(status_for(zone, &reply)),
            Err(BreatheError::Timeout { received }) => {
                tracing::warn!(
                    "Could not update zone {}: timed out after {} bytes",
                    zone,
                    received.len()
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Turn a zone on or off
    pub fn set_power(&self, zone: ZoneId, power: bool) -> Result<()> {
        self.command(zone, Command::Power(power))
    }

    /// Mute or unmute a zone
    pub fn set_mute(&self, zone: ZoneId, mute: bool) -> Result<()> {
        self.command(zone, Command::Mute(mute))
    }

    /// Set zone volume in percent; values outside 0..100 are clamped
    pub fn set_volume(&self, zone: ZoneId, volume: i32) -> Result<()> {
        self.command(zone, Command::volume_percent(volume))
    }

    /// Select a zone's source; values outside 0..6 are clamped
    pub fn set_source(&self, zone: ZoneId, source: i32) -> Result<()> {
        self.command(zone, Command::source(source))
    }

    /// Capture the current zone status for a later `restore`
    ///
    /// An unreadable status leaves any previous capture in place.
    pub fn snapshot(&self, zone: ZoneId) -> Result<Option<ZoneStatus>> {
        let status = self.zone_status(zone)?;
        if let Some(status) = status {
            self.snapshots.capture(status);
        }
        Ok(status)
    }

    /// Replay the captured status of a zone
    ///
    /// Returns `false` without touching the link when nothing was captured.
    pub fn restore(&self, zone: ZoneId) -> Result<bool> {
        let zone = validate_zone(zone)?;
        let Some(status) = self.snapshots.get(zone) else {
            tracing::debug!("No snapshot for zone {}", zone);
            return Ok(false);
        };

        let mut session = self.transport.lock();
        for command in Command::restore_sequence(&status) {
            send(&mut session, zone, command)?;
        }
        Ok(true)
    }

    /// The captured status of a zone, if any
    pub fn snapshot_of(&self, zone: ZoneId) -> Option<ZoneStatus> {
        self.snapshots.get(zone)
    }

    /// Check that the amplifier answers at all
    ///
    /// Unlike `zone_status`, a timeout is returned as an error so a caller
    /// can report the device as not ready.
    pub fn probe(&self) -> Result<()> {
        send(&mut self.transport.lock(), 1, Command::Status)?;
        Ok(())
    }

    fn command(&self, zone: ZoneId, command: Command) -> Result<()> {
        let zone = validate_zone(zone)?;
        send(&mut self.transport.lock(), zone, command)?;
        Ok(())
    }

    /// Give back the underlying link
    pub fn into_inner(self) -> L {
        self.transport.into_inner()
    }
}

fn send<L: SerialLink>(
    session: &mut BlockingSession<'_, L>,
    zone: ZoneId,
    command: Command,
) -> Result<String> {
    session.transact(&command.encode(zone), command.skip())
}

/// Decode a status reply, dropping replies that name a different zone
pub(crate) fn status_for(zone: ZoneId, reply: &str) -> Option<ZoneStatus> {
    let status = decode_status(reply)?;
    if status.zone != zone {
        tracing::warn!("Reply for zone {} while querying zone {}", status.zone, zone);
        return None;
    }
    Some(status)
}
