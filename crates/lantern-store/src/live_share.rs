use futures::future::try_join_all;
use tracing::{debug, warn};

use lantern_core::{Beacon, BeaconClient, StoreError};

use crate::store::BeaconStoreHandle;

/// Per-room view over the local user's live sharing session.
///
/// Wraps a [`BeaconStoreHandle`] with the state a room warning surface needs:
/// which beacons are live here, which one to display, whether a stop request
/// is in flight, and the last stop failure so the surface can offer a retry.
#[derive(Debug)]
pub struct RoomLiveShare<C: BeaconClient> {
    handle: BeaconStoreHandle<C>,
    room_id: String,
    stopping_in_progress: bool,
    stop_error: Option<StoreError>,
}

impl<C: BeaconClient> RoomLiveShare<C> {
    pub fn new(handle: BeaconStoreHandle<C>, room_id: impl Into<String>) -> Self {
        Self {
            handle,
            room_id: room_id.into(),
            stopping_in_progress: false,
            stop_error: None,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn has_live_beacons(&self) -> bool {
        self.handle.has_live_beacons(Some(&self.room_id))
    }

    /// Ids of the user's live beacons in this room, in insertion order.
    pub fn live_beacon_ids(&self) -> Vec<String> {
        self.handle.get_live_beacon_ids(Some(&self.room_id))
    }

    /// The beacon a warning surface should represent the session with: the
    /// live beacon expiring last. Earlier beacons win expiry ties.
    pub fn display_beacon(&self) -> Option<Beacon> {
        let mut display: Option<Beacon> = None;
        for beacon_info_id in self.live_beacon_ids() {
            let Some(beacon) = self.handle.get_beacon_by_id(&beacon_info_id) else {
                continue;
            };
            let later = display
                .as_ref()
                .is_none_or(|current| beacon.expires_at_ms() > current.expires_at_ms());
            if later {
                display = Some(beacon);
            }
        }
        display
    }

    /// Whether a stop-sharing request is currently in flight.
    pub fn is_stopping(&self) -> bool {
        self.stopping_in_progress
    }

    /// Failure from the most recent stop attempt, if it failed.
    pub fn stop_error(&self) -> Option<&StoreError> {
        self.stop_error.as_ref()
    }

    /// Stop every live beacon the user has in this room.
    ///
    /// Requests run concurrently; the first failure is kept for the surface
    /// to show and the in-progress flag always clears, success or not.
    pub async fn stop_sharing(&mut self) -> Result<(), StoreError> {
        let beacon_ids = self.live_beacon_ids();
        if beacon_ids.is_empty() {
            debug!(room_id = %self.room_id, "no live beacons to stop");
            return Ok(());
        }

        self.stopping_in_progress = true;
        self.stop_error = None;

        let result = try_join_all(
            beacon_ids
                .iter()
                .map(|beacon_info_id| self.handle.stop_beacon(beacon_info_id)),
        )
        .await;

        self.stopping_in_progress = false;
        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(room_id = %self.room_id, error = %err, "stopping live beacons failed");
                self.stop_error = Some(err.clone());
                Err(err)
            }
        }
    }
}
