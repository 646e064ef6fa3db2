use crate::client::AmplifierClient;
use crate::error::Result;
use crate::types::{SourceTable, ZoneId, ZoneStatus};
use std::sync::{Arc, Mutex};

/// Step used by `volume_up` / `volume_down`, in percent
pub const VOLUME_STEP: i32 = 10;

/// Interface for controlling one amplifier zone
///
/// A `Zone` keeps the last status it read so that a poller can present
/// stable state between updates, and translates source names through the
/// configured [`SourceTable`].
#[derive(Clone)]
pub struct Zone {
    client: AmplifierClient,
    id: ZoneId,
    sources: Arc<SourceTable>,
    last: Arc<Mutex<Option<ZoneStatus>>>,
}

/// Presentation state of a zone
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneState {
    pub power: bool,
    pub mute: bool,

    /// Volume as 0.0..=1.0
    pub volume_level: f64,

    /// Name of the selected source, if it is configured
    pub source_name: Option<String>,
}

impl Zone {
    pub(crate) fn new(client: AmplifierClient, id: ZoneId, sources: Arc<SourceTable>) -> Self {
        Self {
            client,
            id,
            sources,
            last: Arc::new(Mutex::new(None)),
        }
    }

    pub fn id(&self) -> ZoneId {
        self.id
    }

    /// Display name, e.g. "Zone 3"
    pub fn name(&self) -> String {
        format!("Zone {}", self.id)
    }

    /// Stable id within a host namespace
    pub fn unique_id(&self, namespace: &str) -> String {
        format!("{}_{}", namespace, self.id)
    }

    /// Configured source names, ordered by source id
    pub fn source_list(&self) -> &[String] {
        self.sources.names()
    }

    /// Last status read by `update`
    pub fn last_status(&self) -> Option<ZoneStatus> {
        *self.lock()
    }

    /// Last known state, or `None` before the first successful update
    pub fn state(&self) -> Option<ZoneState> {
        self.last_status().map(|status| ZoneState {
            power: status.power,
            mute: status.mute,
            volume_level: status.volume_level(),
            source_name: self.sources.name(status.source).map(str::to_string),
        })
    }

    /// Poll the amplifier for fresh state
    ///
    /// Keeps the previous state when the reply is missing or unreadable.
    /// Returns whether the state was refreshed.
    pub async fn update(&self) -> Result<bool> {
        match self.client.zone_status(self.id).await? {
            Some(status) => {
                *self.lock() = Some(status);
                Ok(true)
            }
            None => {
                tracing::debug!("Could not update zone {}", self.id);
                Ok(false)
            }
        }
    }

    pub async fn turn_on(&self) -> Result<()> {
        self.client.set_power(self.id, true).await
    }

    pub async fn turn_off(&self) -> Result<()> {
        self.client.set_power(self.id, false).await
    }

    pub async fn mute_volume(&self, mute: bool) -> Result<()> {
        self.client.set_mute(self.id, mute).await
    }

    /// Set volume from a 0.0..=1.0 level
    pub async fn set_volume_level(&self, level: f64) -> Result<()> {
        let volume = (level * 100.0) as i32;
        tracing::debug!(
            "Zone {} volume: current {:?}, new {}",
            self.id,
            self.last_status().map(|s| s.volume),
            volume
        );
        self.client.set_volume(self.id, volume).await
    }

    /// Raise volume by one step; does nothing while volume is unknown
    pub async fn volume_up(&self) -> Result<()> {
        self.step_volume(VOLUME_STEP).await
    }

    /// Lower volume by one step; does nothing while volume is unknown
    pub async fn volume_down(&self) -> Result<()> {
        self.step_volume(-VOLUME_STEP).await
    }

    async fn step_volume(&self, delta: i32) -> Result<()> {
        let Some(status) = self.last_status() else {
            return Ok(());
        };
        let volume = (status.volume_percent() + delta).clamp(0, 100);
        self.client.set_volume(self.id, volume).await
    }

    /// Select a source by display name; unknown names are ignored
    pub async fn select_source(&self, name: &str) -> Result<()> {
        let Some(id) = self.sources.id(name) else {
            tracing::debug!("Unknown source {:?} for zone {}", name, self.id);
            return Ok(());
        };
        self.client.set_source(self.id, i32::from(id)).await
    }

    /// Save the zone's current state
    pub async fn snapshot(&self) -> Result<Option<ZoneStatus>> {
        self.client.snapshot(self.id).await
    }

    /// Restore the saved state and refresh
    pub async fn restore(&self) -> Result<bool> {
        let restored = self.client.restore(self.id).await?;
        if restored {
            self.update().await?;
        }
        Ok(restored)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ZoneStatus>> {
        self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
