//! Host-environment adapters for the beacon store.
//!
//! Provides the location-source abstraction the publisher watches, plus an
//! in-memory client collaborator used by tests and the smoke binary.

use std::{
    sync::{Mutex, MutexGuard, RwLock, atomic::{AtomicUsize, Ordering}},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

use lantern_core::{
    BeaconClient, RoomSnapshot, StoreError, StoreErrorCategory, classify_http_status,
};

const WATCH_CHANNEL_BUFFER: usize = 32;

/// One geographic position sample from a location source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Optional accuracy radius in meters.
    pub uncertainty: Option<f64>,
    /// Sample timestamp in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64, uncertainty: Option<f64>, timestamp_ms: u64) -> Self {
        Self {
            latitude,
            longitude,
            uncertainty,
            timestamp_ms,
        }
    }

    /// RFC 5870 `geo:` URI for this sample, e.g. `geo:54.001927,-8.253491;u=1`.
    pub fn geo_uri(&self) -> String {
        let mut uri = format!("geo:{:.6},{:.6}", self.latitude, self.longitude);
        if let Some(uncertainty) = self.uncertainty {
            uri.push_str(&format!(";u={uncertainty}"));
        }
        uri
    }
}

/// Source of position samples (the platform's geolocation facility).
///
/// Each [`subscribe`] call begins one watch session; dropping the receiver
/// ends it. The publisher subscribes while the user has live beacons and
/// drops the receiver when the last beacon stops.
///
/// [`subscribe`]: LocationSource::subscribe
pub trait LocationSource: Send + 'static {
    fn subscribe(&self) -> mpsc::Receiver<Position>;
}

impl<S: LocationSource + Sync> LocationSource for std::sync::Arc<S> {
    fn subscribe(&self) -> mpsc::Receiver<Position> {
        (**self).subscribe()
    }
}

/// Scripted location source for tests.
///
/// Delivers a fixed list of positions to every new watcher immediately, keeps
/// the channel open, and lets tests push further positions later.
#[derive(Debug, Default)]
pub struct ScriptedLocationSource {
    initial: Vec<Position>,
    watchers: Mutex<Vec<mpsc::Sender<Position>>>,
    subscriptions: AtomicUsize,
}

impl ScriptedLocationSource {
    pub fn new(initial: Vec<Position>) -> Self {
        Self {
            initial,
            watchers: Mutex::new(Vec::new()),
            subscriptions: AtomicUsize::new(0),
        }
    }

    /// Number of watch sessions started so far.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    /// Deliver one more position to all active watchers.
    pub fn push(&self, position: Position) {
        let mut watchers = recover(self.watchers.lock());
        watchers.retain(|tx| tx.try_send(position.clone()).is_ok());
    }
}

impl LocationSource for ScriptedLocationSource {
    fn subscribe(&self) -> mpsc::Receiver<Position> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_BUFFER.max(self.initial.len() + 1));
        for position in &self.initial {
            let _ = tx.try_send(position.clone());
        }
        recover(self.watchers.lock()).push(tx);
        rx
    }
}

/// Location source that repeats a fixed position at an interval.
///
/// Stands in for a real geolocation watch in the smoke binary.
#[derive(Debug, Clone)]
pub struct FixedIntervalLocationSource {
    position: Position,
    interval: Duration,
}

impl FixedIntervalLocationSource {
    pub fn new(position: Position, interval: Duration) -> Self {
        Self { position, interval }
    }
}

impl LocationSource for FixedIntervalLocationSource {
    fn subscribe(&self) -> mpsc::Receiver<Position> {
        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_BUFFER);
        let position = self.position.clone();
        let interval = self.interval;
        tokio::spawn(async move {
            loop {
                if tx.send(position.clone()).await.is_err() {
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        });
        rx
    }
}

/// Recorded `stop_beacon` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopRequest {
    pub room_id: String,
    pub beacon_info_id: String,
}

/// Recorded `send_location` request.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPublication {
    pub room_id: String,
    pub beacon_info_id: String,
    pub geo_uri: String,
    pub timestamp_ms: u64,
}

/// In-memory [`BeaconClient`] that records requests.
///
/// Used by store tests and the smoke binary; supports injecting stop-request
/// failures to exercise error paths.
#[derive(Debug)]
pub struct InMemoryBeaconClient {
    user_id: String,
    rooms: RwLock<Vec<RoomSnapshot>>,
    stop_requests: Mutex<Vec<StopRequest>>,
    location_publications: Mutex<Vec<LocationPublication>>,
    stop_failure: Mutex<Option<StoreError>>,
}

impl InMemoryBeaconClient {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            rooms: RwLock::new(Vec::new()),
            stop_requests: Mutex::new(Vec::new()),
            location_publications: Mutex::new(Vec::new()),
            stop_failure: Mutex::new(None),
        }
    }

    /// Replace the visible-room snapshots returned by the initial scan.
    pub fn set_visible_rooms(&self, rooms: Vec<RoomSnapshot>) {
        match self.rooms.write() {
            Ok(mut guard) => *guard = rooms,
            Err(poisoned) => *poisoned.into_inner() = rooms,
        }
    }

    /// Make every subsequent stop request fail as the given HTTP status.
    pub fn fail_stops_with_status(&self, status: u16) {
        *recover(self.stop_failure.lock()) = Some(StoreError::new(
            classify_http_status(status),
            "stop_rejected",
            format!("stop request rejected with status {status}"),
        ));
    }

    /// Let stop requests succeed again.
    pub fn clear_stop_failure(&self) {
        *recover(self.stop_failure.lock()) = None;
    }

    /// Stop requests received so far.
    pub fn stop_requests(&self) -> Vec<StopRequest> {
        recover(self.stop_requests.lock()).clone()
    }

    /// Location publications received so far.
    pub fn location_publications(&self) -> Vec<LocationPublication> {
        recover(self.location_publications.lock()).clone()
    }
}

impl BeaconClient for InMemoryBeaconClient {
    fn user_id(&self) -> String {
        self.user_id.clone()
    }

    fn visible_rooms(&self) -> Result<Vec<RoomSnapshot>, StoreError> {
        self.rooms
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| StoreError::new(StoreErrorCategory::Platform, "rooms_unavailable", "poisoned room lock"))
    }

    async fn stop_beacon(&self, room_id: &str, beacon_info_id: &str) -> Result<(), StoreError> {
        if let Some(failure) = recover(self.stop_failure.lock()).clone() {
            return Err(failure);
        }

        trace!(%room_id, %beacon_info_id, "recording stop request");
        recover(self.stop_requests.lock()).push(StopRequest {
            room_id: room_id.to_owned(),
            beacon_info_id: beacon_info_id.to_owned(),
        });
        Ok(())
    }

    async fn send_location(
        &self,
        room_id: &str,
        beacon_info_id: &str,
        geo_uri: &str,
        timestamp_ms: u64,
    ) -> Result<(), StoreError> {
        recover(self.location_publications.lock()).push(LocationPublication {
            room_id: room_id.to_owned(),
            beacon_info_id: beacon_info_id.to_owned(),
            geo_uri: geo_uri.to_owned(),
            timestamp_ms,
        });
        Ok(())
    }
}

// A poisoned lock only means another test thread panicked mid-mutation;
// recover the data rather than cascading the panic.
fn recover<'a, T>(
    result: Result<MutexGuard<'a, T>, std::sync::PoisonError<MutexGuard<'a, T>>>,
) -> MutexGuard<'a, T> {
    result.unwrap_or_else(std::sync::PoisonError::into_inner)
}
