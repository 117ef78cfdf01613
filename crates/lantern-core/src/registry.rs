use std::collections::HashMap;

use tracing::trace;

use crate::beacon::Beacon;

/// Authoritative in-memory collection of the local user's beacons.
///
/// Beacons are reachable both by id and through the room index; the two maps
/// are mutated together so the bidirectional indexing never drifts. Insertion
/// order is preserved for id listings. Entries live until [`clear`] resets the
/// registry on session teardown.
///
/// [`clear`]: BeaconRegistry::clear
#[derive(Debug, Default)]
pub struct BeaconRegistry {
    beacons: HashMap<String, Beacon>,
    order: Vec<String>,
    room_index: HashMap<String, Vec<String>>,
}

impl BeaconRegistry {
    /// Insert a beacon and start its liveness monitor.
    ///
    /// Idempotent: re-inserting an already-tracked id leaves the registry
    /// unchanged. Returns whether the beacon was newly inserted.
    pub fn add_beacon(&mut self, beacon: Beacon) -> bool {
        let beacon_info_id = beacon.beacon_info_id().to_owned();
        if self.beacons.contains_key(&beacon_info_id) {
            trace!(beacon_info_id = %beacon_info_id, "beacon already tracked");
            return false;
        }

        beacon.monitor_liveness();
        self.room_index
            .entry(beacon.room_id().to_owned())
            .or_default()
            .push(beacon_info_id.clone());
        self.order.push(beacon_info_id.clone());
        self.beacons.insert(beacon_info_id, beacon);
        true
    }

    /// Direct id lookup.
    pub fn get(&self, beacon_info_id: &str) -> Option<&Beacon> {
        self.beacons.get(beacon_info_id)
    }

    pub fn contains(&self, beacon_info_id: &str) -> bool {
        self.beacons.contains_key(beacon_info_id)
    }

    pub fn len(&self) -> usize {
        self.beacons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beacons.is_empty()
    }

    /// Beacon ids tracked for a room, in insertion order.
    pub fn beacon_ids_in_room(&self, room_id: &str) -> &[String] {
        self.room_index
            .get(room_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether at least one tracked beacon in the room is currently live.
    pub fn any_live_in_room(&self, room_id: &str) -> bool {
        self.beacon_ids_in_room(room_id)
            .iter()
            .filter_map(|id| self.beacons.get(id))
            .any(Beacon::is_live)
    }

    /// Currently-live beacon ids in insertion order, optionally filtered to
    /// one room.
    pub fn live_beacon_ids(&self, room_id: Option<&str>) -> Vec<String> {
        self.order
            .iter()
            .filter_map(|id| self.beacons.get(id))
            .filter(|beacon| beacon.is_live())
            .filter(|beacon| room_id.is_none_or(|room| beacon.room_id() == room))
            .map(|beacon| beacon.beacon_info_id().to_owned())
            .collect()
    }

    /// All tracked beacons in insertion order.
    pub fn beacons(&self) -> impl Iterator<Item = &Beacon> {
        self.order.iter().filter_map(|id| self.beacons.get(id))
    }

    /// Stop all liveness monitors and drop every entry.
    pub fn clear(&mut self) {
        for beacon in self.beacons.values() {
            beacon.stop_monitoring();
        }
        self.beacons.clear();
        self.order.clear();
        self.room_index.clear();
    }
}
