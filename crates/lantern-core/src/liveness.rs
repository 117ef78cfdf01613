use std::collections::HashSet;

use tracing::debug;

use crate::registry::BeaconRegistry;

/// Derived set of rooms that currently have at least one live beacon.
///
/// The index is maintained eagerly by the event bridge; reads never recompute.
/// Every update rechecks the touched room against the registry as a whole, so
/// one beacon expiring cannot clear a room that still has another live beacon.
#[derive(Debug, Default)]
pub struct LivenessIndex {
    live_rooms: HashSet<String>,
}

impl LivenessIndex {
    /// Whether any room has a live beacon.
    pub fn any_live(&self) -> bool {
        !self.live_rooms.is_empty()
    }

    /// Whether the given room has a live beacon.
    pub fn has_live_room(&self, room_id: &str) -> bool {
        self.live_rooms.contains(room_id)
    }

    /// Membership query matching the facade's optional-room shape.
    pub fn has_live(&self, room_id: Option<&str>) -> bool {
        match room_id {
            Some(room_id) => self.has_live_room(room_id),
            None => self.any_live(),
        }
    }

    /// Recheck one room against the registry after a beacon change.
    ///
    /// Returns whether the room's membership in the index changed.
    pub fn recompute_room(&mut self, room_id: &str, registry: &BeaconRegistry) -> bool {
        let live_now = registry.any_live_in_room(room_id);
        let changed = if live_now {
            self.live_rooms.insert(room_id.to_owned())
        } else {
            self.live_rooms.remove(room_id)
        };

        if changed {
            debug!(%room_id, live = live_now, "room liveness changed");
        }
        changed
    }

    /// Rebuild the whole index from the registry (initialization scan).
    pub fn rebuild(&mut self, registry: &BeaconRegistry) {
        self.live_rooms = registry
            .beacons()
            .filter(|beacon| beacon.is_live())
            .map(|beacon| beacon.room_id().to_owned())
            .collect();
    }

    /// Drop all entries (session teardown).
    pub fn clear(&mut self) {
        self.live_rooms.clear();
    }
}
