use crate::amplifier::status_for;
use crate::config::AmplifierConfig;
use crate::connection::{AsyncSession, AsyncTransport};
use crate::error::{BreatheError, Result};
use crate::protocol::Command;
use crate::snapshot::SnapshotStore;
use crate::types::{validate_zone, SourceTable, ZoneId, ZoneStatus, ZONE_IDS};
use crate::zone::Zone;
use std::sync::Arc;

/// Async client for a BreatheAudio amplifier
///
/// Cloning is cheap; all clones share one transport and one snapshot store.
/// Transactions from any clone run strictly one after another.
#[derive(Clone)]
pub struct AmplifierClient {
    transport: Arc<AsyncTransport>,
    snapshots: Arc<SnapshotStore>,
}

impl AmplifierClient {
    /// Open the configured serial port
    ///
    /// # Example
    ///
    /// ```no_run
    /// use breatheaudio::{AmplifierClient, AmplifierConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let config = AmplifierConfig::new("/dev/ttyUSB0").with_source(1, "Streamer");
    ///     let client = AmplifierClient::open(&config)?;
    ///     client.probe().await?;
    ///
    ///     client.set_power(2, true).await?;
    ///     client.set_source(2, 1).await?;
    ///     if let Some(status) = client.zone_status(2).await? {
    ///         println!("Zone 2: {:?}", status);
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub fn open(config: &AmplifierConfig) -> Result<Self> {
        config.validate()?;
        let transport = AsyncTransport::open(&config.port, &config.serial)?;
        Ok(Self::new(transport))
    }

    /// Use an existing transport
    pub fn new(transport: AsyncTransport) -> Self {
        Self {
            transport: Arc::new(transport),
            snapshots: Arc::new(SnapshotStore::new()),
        }
    }

    /// Query the status of a zone
    ///
    /// Returns `None` when the reply cannot be decoded or the read times out.
    pub async fn zone_status(&self, zone: ZoneId) -> Result<Option<ZoneStatus>> {
        let zone = validate_zone(zone)?;
        let mut session = self.transport.lock().await;
        match send(&mut session, zone, Command::Status).await {
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
    pub async fn set_power(&self, zone: ZoneId, power: bool) -> Result<()> {
        self.command(zone, Command::Power(power)).await
    }

    /// Mute or unmute a zone
    pub async fn set_mute(&self, zone: ZoneId, mute: bool) -> Result<()> {
        self.command(zone, Command::Mute(mute)).await
    }

    /// Set zone volume in percent; values outside 0..100 are clamped
    pub async fn set_volume(&self, zone: ZoneId, volume: i32) -> Result<()> {
        self.command(zone, Command::volume_percent(volume)).await
    }

    /// Select a zone's source; values outside 0..6 are clamped
    pub async fn set_source(&self, zone: ZoneId, source: i32) -> Result<()> {
        self.command(zone, Command::source(source)).await
    }

    /// Capture the current zone status for a later `restore`
    ///
    /// An unreadable status leaves any previous capture in place.
    pub async fn snapshot(&self, zone: ZoneId) -> Result<Option<ZoneStatus>> {
        let status = self.zone_status(zone).await?;
        if let Some(status) = status {
            self.snapshots.capture(status);
        }
        Ok(status)
    }

    /// Replay the captured status of a zone
    ///
    /// Returns `false` without touching the link when nothing was captured.
    pub async fn restore(&self, zone: ZoneId) -> Result<bool> {
        let zone = validate_zone(zone)?;
        let Some(status) = self.snapshots.get(zone) else {
            tracing::debug!("No snapshot for zone {}", zone);
            return Ok(false);
        };

        let mut session = self.transport.lock().await;
        for command in Command::restore_sequence(&status) {
            send(&mut session, zone, command).await?;
        }
        Ok(true)
    }

    /// The captured status of a zone, if any
    pub fn snapshot_of(&self, zone: ZoneId) -> Option<ZoneStatus> {
        self.snapshots.get(zone)
    }

    /// Check that the amplifier answers at all
    ///
    /// A timeout is returned as an error so a caller can report the device
    /// as not ready.
    pub async fn probe(&self) -> Result<()> {
        let mut session = self.transport.lock().await;
        send(&mut session, 1, Command::Status).await?;
        Ok(())
    }

    /// Handles for all six zones
    pub fn zones(&self, sources: &SourceTable) -> Vec<Zone> {
        let sources = Arc::new(sources.clone());
        ZONE_IDS
            .map(|id| {
                tracing::debug!("Adding zone {}", id);
                Zone::new(self.clone(), id, sources.clone())
            })
            .collect()
    }

    async fn command(&self, zone: ZoneId, command: Command) -> Result<()> {
        let zone = validate_zone(zone)?;
        let mut session = self.transport.lock().await;
        send(&mut session, zone, command).await?;
        Ok(())
    }
}

async fn send(session: &mut AsyncSession<'_>, zone: ZoneId, command: Command) -> Result<String> {
    session.transact(&command.encode(zone), command.skip()).await
}
