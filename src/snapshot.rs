use crate::types::{ZoneId, ZoneStatus, ZONE_COUNT};
use std::sync::Mutex;

/// Last captured status per zone, held for restore
#[derive(Debug, Default)]
pub struct SnapshotStore {
    slots: Mutex<[Option<ZoneStatus>; ZONE_COUNT]>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a status in its zone's slot, replacing any previous capture
    pub fn capture(&self, status: ZoneStatus) {
        if let Some(index) = slot(status.zone) {
            self.lock()[index] = Some(status);
        }
    }

    /// The captured status for a zone, if any
    pub fn get(&self, zone: ZoneId) -> Option<ZoneStatus> {
        slot(zone).and_then(|index| self.lock()[index])
    }

    /// Forget the capture for a zone
    pub fn clear(&self, zone: ZoneId) -> Option<ZoneStatus> {
        slot(zone).and_then(|index| self.lock()[index].take())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, [Option<ZoneStatus>; ZONE_COUNT]> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn slot(zone: ZoneId) -> Option<usize> {
    let index = usize::from(zone).checked_sub(1)?;
    (index < ZONE_COUNT).then_some(index)
}
