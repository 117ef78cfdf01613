use std::future::Future;

use crate::{beacon::Beacon, error::StoreError};

/// Current-state snapshot of one visible room, scanned during store readiness.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    /// Matrix room ID.
    pub room_id: String,
    /// Beacons present in the room's current state, any sender.
    pub beacons: Vec<Beacon>,
}

impl RoomSnapshot {
    pub fn new(room_id: impl Into<String>, beacons: Vec<Beacon>) -> Self {
        Self {
            room_id: room_id.into(),
            beacons,
        }
    }
}

/// Contract the store consumes from the Matrix client collaborator.
///
/// The real SDK sits behind this trait; tests and the smoke binary use the
/// in-memory implementation from `lantern-platform`. Beacon notifications are
/// delivered separately, over a broadcast feed of
/// [`ClientBeaconEvent`](crate::types::ClientBeaconEvent).
pub trait BeaconClient: Send + Sync + 'static {
    /// Local user id, used for the beacon ownership filter.
    fn user_id(&self) -> String;

    /// Rooms visible to the client, used for the initial beacon scan.
    ///
    /// A failure here rejects `on_ready`; the surrounding session lifecycle
    /// decides retry or teardown.
    fn visible_rooms(&self) -> Result<Vec<RoomSnapshot>, StoreError>;

    /// Request that the beacon's sharing session ends.
    fn stop_beacon(
        &self,
        room_id: &str,
        beacon_info_id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Publish a position for a live beacon as a `geo:` URI.
    fn send_location(
        &self,
        room_id: &str,
        beacon_info_id: &str,
        geo_uri: &str,
        timestamp_ms: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
