use crate::error::{BreatheError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::time::Duration;

/// Zone identifier (1..6)
pub type ZoneId = u8;

/// Source identifier (1..6 on read, 0..6 on write)
pub type SourceId = u8;

/// Number of zones on the amplifier
pub const ZONE_COUNT: usize = 6;

/// All valid zone ids
pub const ZONE_IDS: RangeInclusive<ZoneId> = 1..=6;

/// Highest step of the amplifier's native volume scale
pub const MAX_VOLUME: u8 = 78;

/// Interval at which callers are expected to poll zone status
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Check that a zone id is in range
pub fn validate_zone(zone: ZoneId) -> Result<ZoneId> {
    if ZONE_IDS.contains(&zone) {
        Ok(zone)
    } else {
        Err(BreatheError::InvalidZone(zone))
    }
}

/// Status of a single zone as reported by the amplifier
///
/// Built fresh from every status reply; never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneStatus {
    pub zone: ZoneId,

    pub power: bool,

    pub mute: bool,

    /// Volume percentage (0.0..=100.0), rescaled from the native 0..78 steps
    pub volume: f64,

    /// Selected source. Reported as 1 when the zone is off.
    pub source: SourceId,
}

impl ZoneStatus {
    /// Volume as a 0.0..=1.0 level
    pub fn volume_level(&self) -> f64 {
        self.volume / 100.0
    }

    /// Volume rounded to a whole percentage, suitable for `set_volume`
    pub fn volume_percent(&self) -> i32 {
        self.volume.round() as i32
    }
}

/// Mapping between source ids and their display names
///
/// Built once from configuration and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceTable {
    id_name: BTreeMap<SourceId, String>,
    name_id: BTreeMap<String, SourceId>,
    names: Vec<String>,
}

impl SourceTable {
    /// Build a table from an id -> name mapping
    pub fn new(sources: BTreeMap<SourceId, String>) -> Self {
        let name_id: BTreeMap<String, SourceId> = sources
            .iter()
            .map(|(id, name)| (name.clone(), *id))
            .collect();

        // Ordered by source id; a name used twice keeps its last id
        let mut names: Vec<String> = name_id.keys().cloned().collect();
        names.sort_by_key(|name| name_id[name]);

        Self {
            id_name: sources,
            name_id,
            names,
        }
    }

    /// Display name for a source id
    pub fn name(&self, id: SourceId) -> Option<&str> {
        self.id_name.get(&id).map(String::as_str)
    }

    /// Source id for a display name
    pub fn id(&self, name: &str) -> Option<SourceId> {
        self.name_id.get(name).copied()
    }

    /// All source names, ordered by source id
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.id_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SourceTable {
        let mut sources = BTreeMap::new();
        sources.insert(3, "TV".to_string());
        sources.insert(1, "Streamer".to_string());
        sources.insert(2, "Turntable".to_string());
        SourceTable::new(sources)
    }

    #[test]
    fn source_table_lookups() {
        let table = table();
        assert_eq!(table.name(1), Some("Streamer"));
        assert_eq!(table.name(6), None);
        assert_eq!(table.id("TV"), Some(3));
        assert_eq!(table.id("Radio"), None);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn source_names_follow_id_order() {
        assert_eq!(table().names(), ["Streamer", "Turntable", "TV"]);
    }

    #[test]
    fn zone_validation() {
        assert!(validate_zone(1).is_ok());
        assert!(validate_zone(6).is_ok());
        assert!(matches!(validate_zone(0), Err(BreatheError::InvalidZone(0))));
        assert!(matches!(validate_zone(7), Err(BreatheError::InvalidZone(7))));
    }

    #[test]
    fn volume_helpers() {
        let status = ZoneStatus {
            zone: 2,
            power: true,
            mute: false,
            volume: 39.0 / 78.0 * 100.0,
            source: 4,
        };
        assert_eq!(status.volume_percent(), 50);
        assert!((status.volume_level() - 0.5).abs() < 1e-9);
    }
}
