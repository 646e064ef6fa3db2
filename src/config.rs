use crate::error::{BreatheError, Result};
use crate::types::{SourceId, SourceTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default baud rate of the amplifier's RS-232 port
pub const BAUD_RATE: u32 = 9600;

/// Default serial read/write timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Serial line settings
///
/// The amplifier always runs 8 data bits, no parity, one stop bit; only the
/// baud rate and timeout are adjustable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Per-byte read and write timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl SerialSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_baud_rate() -> u32 {
    BAUD_RATE
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

/// Amplifier configuration supplied by the host at startup
///
/// ```json
/// { "port": "/dev/ttyUSB0", "sources": { "1": "Streamer", "2": "TV" } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmplifierConfig {
    /// Serial port path or URL, e.g. `/dev/ttyUSB0`
    pub port: String,

    /// Source id -> display name
    #[serde(default)]
    pub sources: BTreeMap<SourceId, String>,

    #[serde(default)]
    pub serial: SerialSettings,
}

impl AmplifierConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            sources: BTreeMap::new(),
            serial: SerialSettings::default(),
        }
    }

    /// Add a named source
    pub fn with_source(mut self, id: SourceId, name: impl Into<String>) -> Self {
        self.sources.insert(id, name.into());
        self
    }

    /// Parse a JSON configuration document
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check port and source ids
    pub fn validate(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            return Err(BreatheError::InvalidConfig("port is empty".to_string()));
        }
        if let Some(id) = self.sources.keys().find(|id| !(1..=6).contains(*id)) {
            return Err(BreatheError::InvalidConfig(format!(
                "source id {} outside 1..6",
                id
            )));
        }
        if self.serial.timeout_ms == 0 {
            return Err(BreatheError::InvalidConfig("timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// Build the source lookup table
    pub fn source_table(&self) -> Result<SourceTable> {
        self.validate()?;
        Ok(SourceTable::new(self.sources.clone()))
    }
}
