use std::{
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::{SystemTime, UNIX_EPOCH},
};

use tracing::{debug, error, trace};

use lantern_core::{
    Beacon, BeaconClient, BeaconRegistry, LivenessIndex, StoreConfig, StoreError,
    StoreErrorCategory, StoreEventFeed, StoreEventStream, StoreLifecycle, StoreLifecycleState,
    types::{ClientBeaconEvent, StoreEvent},
};

/// Request to persist a stop for a beacon whose share duration elapsed.
///
/// An expired beacon's state event still claims `live`; the bridge surfaces
/// the correction instead of performing it inline so handlers stay
/// synchronous. The runtime loop makes the client call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopIntent {
    pub room_id: String,
    pub beacon_info_id: String,
}

/// Event-driven index over the local user's live-location beacons.
///
/// All mutation flows through [`on_ready`]/[`on_not_ready`] and
/// [`handle_client_event`]; handlers are synchronous, run to completion, and
/// never panic on malformed or irrelevant events. Reads go through
/// [`BeaconStoreHandle`].
///
/// [`on_ready`]: OwnBeaconStore::on_ready
/// [`on_not_ready`]: OwnBeaconStore::on_not_ready
/// [`handle_client_event`]: OwnBeaconStore::handle_client_event
#[derive(Debug)]
pub struct OwnBeaconStore<C: BeaconClient> {
    client: Arc<C>,
    user_id: Option<String>,
    registry: BeaconRegistry,
    live_rooms: LivenessIndex,
    lifecycle: StoreLifecycle,
    events: StoreEventFeed,
}

impl<C: BeaconClient> OwnBeaconStore<C> {
    /// Create a cold store around a client collaborator.
    pub fn new(client: Arc<C>, config: &StoreConfig) -> Self {
        Self {
            client,
            user_id: None,
            registry: BeaconRegistry::default(),
            live_rooms: LivenessIndex::default(),
            lifecycle: StoreLifecycle::default(),
            events: StoreEventFeed::new(config.store_event_buffer()),
        }
    }

    /// Clone of the client collaborator.
    pub fn client(&self) -> Arc<C> {
        Arc::clone(&self.client)
    }

    pub fn lifecycle_state(&self) -> StoreLifecycleState {
        self.lifecycle.state()
    }

    /// Subscribe to derived store notifications.
    pub fn subscribe(&self) -> StoreEventStream {
        self.events.subscribe()
    }

    /// Scan visible rooms and start tracking the local user's beacons.
    ///
    /// A scan failure propagates before any state changes; the surrounding
    /// session lifecycle decides retry or teardown.
    pub fn on_ready(&mut self) -> Result<(), StoreError> {
        if self.lifecycle.is_ready() {
            return Err(StoreError::invalid_lifecycle(
                self.lifecycle.state(),
                "on_ready",
            ));
        }

        let user_id = self.client.user_id();
        let rooms = self.client.visible_rooms()?;
        let lifecycle_event = self.lifecycle.mark_ready()?;

        for room in rooms {
            for beacon in room.beacons {
                if beacon.sender_user_id() == user_id {
                    self.registry.add_beacon(beacon);
                }
            }
        }
        self.live_rooms.rebuild(&self.registry);
        self.user_id = Some(user_id);

        debug!(beacon_count = self.registry.len(), "beacon store ready");
        self.events.emit(lifecycle_event);
        if self.live_rooms.any_live() {
            self.events.emit(StoreEvent::LivenessChange { is_live: true });
        }
        Ok(())
    }

    /// Reset all state on client disconnect.
    ///
    /// Beacons are retained only for the ready-session lifetime; teardown
    /// stops their monitors and drops every entry.
    pub fn on_not_ready(&mut self) -> Result<(), StoreError> {
        let lifecycle_event = self.lifecycle.mark_not_ready()?;
        let was_live = self.live_rooms.any_live();

        self.registry.clear();
        self.live_rooms.clear();
        self.user_id = None;

        debug!("beacon store reset");
        self.events.emit(lifecycle_event);
        if was_live {
            self.events.emit(StoreEvent::LivenessChange { is_live: false });
        }
        Ok(())
    }

    /// Feed one client beacon notification into the bridge.
    ///
    /// Returns a [`StopIntent`] when the event was an expired beacon going
    /// non-live, so the caller can persist the stop through the client.
    pub fn handle_client_event(&mut self, event: ClientBeaconEvent) -> Option<StopIntent> {
        if !self.lifecycle.is_ready() {
            trace!("dropping beacon event while store is not ready");
            return None;
        }

        match event {
            ClientBeaconEvent::NewBeacon { beacon } => {
                self.on_new_beacon(beacon);
                None
            }
            ClientBeaconEvent::LivenessChange { is_live, beacon } => {
                self.on_liveness_change(is_live, beacon)
            }
        }
    }

    pub fn has_live_beacons(&self, room_id: Option<&str>) -> bool {
        self.live_rooms.has_live(room_id)
    }

    pub fn get_live_beacon_ids(&self, room_id: Option<&str>) -> Vec<String> {
        self.registry.live_beacon_ids(room_id)
    }

    pub fn get_beacon_by_id(&self, beacon_info_id: &str) -> Option<Beacon> {
        self.registry.get(beacon_info_id).cloned()
    }

    /// `(room_id, beacon_info_id)` pairs for every currently-live beacon.
    pub fn live_targets(&self) -> Vec<(String, String)> {
        self.registry
            .beacons()
            .filter(|beacon| beacon.is_live())
            .map(|beacon| {
                (
                    beacon.room_id().to_owned(),
                    beacon.beacon_info_id().to_owned(),
                )
            })
            .collect()
    }

    fn on_new_beacon(&mut self, beacon: Beacon) {
        // Ownership filter runs before any mutation or monitoring side effect.
        if self.user_id.as_deref() != Some(beacon.sender_user_id()) {
            trace!(
                beacon_info_id = %beacon.beacon_info_id(),
                "ignoring beacon from another user"
            );
            return;
        }

        let was_live = self.live_rooms.any_live();
        let room_id = beacon.room_id().to_owned();
        let beacon_info_id = beacon.beacon_info_id().to_owned();
        let newly_tracked = self.registry.add_beacon(beacon);
        self.live_rooms.recompute_room(&room_id, &self.registry);
        self.emit_on_global_change(was_live);
        if newly_tracked {
            self.events.emit(StoreEvent::NewBeaconTracked {
                room_id,
                beacon_info_id,
            });
        }
    }

    fn on_liveness_change(&mut self, is_live: bool, beacon: Beacon) -> Option<StopIntent> {
        // Pure lookup filter; beacons never added (other users') fall out here.
        let Some(tracked) = self.registry.get(beacon.beacon_info_id()) else {
            trace!(
                beacon_info_id = %beacon.beacon_info_id(),
                "ignoring liveness change for untracked beacon"
            );
            return None;
        };
        let was_tracked_live = tracked.is_live();
        tracked.set_live(is_live);
        let room_id = tracked.room_id().to_owned();

        // A beacon that expired while live still has `live: true` in its
        // state event; surface the stop so the client can correct it.
        let stop_intent = (was_tracked_live && !is_live && tracked.is_expired(current_time_ms()))
            .then(|| StopIntent {
                room_id: room_id.clone(),
                beacon_info_id: tracked.beacon_info_id().to_owned(),
            });

        let was_live = self.live_rooms.any_live();
        self.live_rooms.recompute_room(&room_id, &self.registry);
        self.emit_on_global_change(was_live);
        stop_intent
    }

    fn emit_on_global_change(&self, was_live: bool) {
        let is_live = self.live_rooms.any_live();
        if is_live != was_live {
            debug!(is_live, "global liveness changed");
            self.events.emit(StoreEvent::LivenessChange { is_live });
        }
    }
}

/// Shared query facade over an [`OwnBeaconStore`].
///
/// Cheap to clone; readers take a short read lock and handlers never hold the
/// lock across an await point.
#[derive(Debug)]
pub struct BeaconStoreHandle<C: BeaconClient> {
    inner: Arc<RwLock<OwnBeaconStore<C>>>,
}

impl<C: BeaconClient> Clone for BeaconStoreHandle<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: BeaconClient> BeaconStoreHandle<C> {
    pub fn new(store: OwnBeaconStore<C>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    /// Run the initialization scan. See [`OwnBeaconStore::on_ready`].
    pub fn mark_ready(&self) -> Result<(), StoreError> {
        self.write()?.on_ready()
    }

    /// Reset the store on disconnect. See [`OwnBeaconStore::on_not_ready`].
    pub fn mark_not_ready(&self) -> Result<(), StoreError> {
        self.write()?.on_not_ready()
    }

    /// Feed one client beacon notification into the bridge.
    ///
    /// See [`OwnBeaconStore::handle_client_event`] for the returned intent.
    pub fn handle_client_event(&self, event: ClientBeaconEvent) -> Option<StopIntent> {
        match self.write() {
            Ok(mut store) => store.handle_client_event(event),
            Err(err) => {
                error!(error = %err, "dropping beacon event");
                None
            }
        }
    }

    pub fn has_live_beacons(&self, room_id: Option<&str>) -> bool {
        self.read()
            .map(|store| store.has_live_beacons(room_id))
            .unwrap_or(false)
    }

    pub fn get_live_beacon_ids(&self, room_id: Option<&str>) -> Vec<String> {
        self.read()
            .map(|store| store.get_live_beacon_ids(room_id))
            .unwrap_or_default()
    }

    pub fn get_beacon_by_id(&self, beacon_info_id: &str) -> Option<Beacon> {
        self.read()
            .ok()
            .and_then(|store| store.get_beacon_by_id(beacon_info_id))
    }

    /// `(room_id, beacon_info_id)` pairs for every currently-live beacon.
    pub fn live_targets(&self) -> Vec<(String, String)> {
        self.read()
            .map(|store| store.live_targets())
            .unwrap_or_default()
    }

    pub fn lifecycle_state(&self) -> StoreLifecycleState {
        self.read()
            .map(|store| store.lifecycle_state())
            .unwrap_or(StoreLifecycleState::Stopped)
    }

    /// Subscribe to derived store notifications.
    pub fn subscribe(&self) -> Result<StoreEventStream, StoreError> {
        Ok(self.read()?.subscribe())
    }

    /// Request that a beacon's sharing session ends.
    ///
    /// No-op for unknown or already-not-live beacons. A client failure
    /// propagates to the caller; registry and index stay untouched either
    /// way, the resulting liveness transition arrives as a client event.
    pub async fn stop_beacon(&self, beacon_info_id: &str) -> Result<(), StoreError> {
        let target = {
            let store = self.read()?;
            match store.get_beacon_by_id(beacon_info_id) {
                None => {
                    debug!(%beacon_info_id, "stop requested for unknown beacon");
                    None
                }
                Some(beacon) if !beacon.is_live() => {
                    debug!(%beacon_info_id, "stop requested for non-live beacon");
                    None
                }
                Some(beacon) => Some((store.client(), beacon.room_id().to_owned())),
            }
        };

        let Some((client, room_id)) = target else {
            return Ok(());
        };
        client.stop_beacon(&room_id, beacon_info_id).await
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, OwnBeaconStore<C>>, StoreError> {
        self.inner.read().map_err(|_| lock_poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, OwnBeaconStore<C>>, StoreError> {
        self.inner.write().map_err(|_| lock_poisoned())
    }
}

fn current_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

fn lock_poisoned() -> StoreError {
    StoreError::new(
        StoreErrorCategory::Internal,
        "store_lock_poisoned",
        "beacon store lock poisoned by a panicked writer",
    )
}
