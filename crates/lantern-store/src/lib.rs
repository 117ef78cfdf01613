//! Live-location beacon liveness store.
//!
//! Tracks the local user's beacons across rooms, derives room and global
//! liveness from client events, publishes location samples while any beacon
//! is live, and exposes synchronous queries plus a broadcast feed of derived
//! notifications.

/// Per-room live-share view for warning surfaces.
pub mod live_share;
/// Location publishing task.
pub mod publisher;
/// The store itself and its shared handle.
pub mod store;

use std::sync::Arc;

use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use lantern_core::{BeaconClient, ClientEventStream, StoreConfig};

pub use live_share::RoomLiveShare;
pub use publisher::{PublisherHandle, spawn_publisher};
pub use store::{BeaconStoreHandle, OwnBeaconStore, StopIntent};

/// A spawned store plus the task draining client events into it.
#[derive(Debug)]
pub struct StoreRuntime<C: BeaconClient> {
    handle: BeaconStoreHandle<C>,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl<C: BeaconClient> StoreRuntime<C> {
    pub fn handle(&self) -> BeaconStoreHandle<C> {
        self.handle.clone()
    }

    /// Stop the event loop and wait for it to finish.
    pub async fn shutdown(self) {
        self.stop.cancel();
        let _ = self.task.await;
    }
}

/// Build a store around `client` and spawn the loop feeding it
/// `client_events`.
///
/// Events arriving before [`BeaconStoreHandle::mark_ready`] succeeds are
/// dropped by the store; the loop runs until shutdown or until the client
/// event channel closes. Stop intents surfaced by the bridge (an expired
/// beacon going non-live) are persisted through the client here.
pub fn spawn_store<C: BeaconClient>(
    client: Arc<C>,
    config: &StoreConfig,
    mut client_events: ClientEventStream,
) -> StoreRuntime<C> {
    let handle = BeaconStoreHandle::new(OwnBeaconStore::new(Arc::clone(&client), config));
    let stop = CancellationToken::new();

    let loop_handle = handle.clone();
    let loop_stop = stop.clone();
    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = loop_stop.cancelled() => {
                    debug!("store event loop stopping");
                    break;
                }
                event = client_events.recv() => match event {
                    Ok(event) => {
                        if let Some(intent) = loop_handle.handle_client_event(event) {
                            debug!(
                                beacon_info_id = %intent.beacon_info_id,
                                "persisting stop for expired beacon"
                            );
                            if let Err(err) = client
                                .stop_beacon(&intent.room_id, &intent.beacon_info_id)
                                .await
                            {
                                warn!(error = %err, "failed to persist stop for expired beacon");
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "store lagged behind client events");
                    }
                    Err(RecvError::Closed) => {
                        debug!("client event channel closed, stopping store loop");
                        break;
                    }
                },
            }
        }
    });

    StoreRuntime { handle, stop, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use lantern_core::{
        Beacon, ClientEventFeed, RoomSnapshot,
        types::{ClientBeaconEvent, StoreEvent},
    };
    use lantern_platform::{InMemoryBeaconClient, StopRequest};

    const ALICE: &str = "@alice:example.org";
    const BOB: &str = "@bob:example.org";
    const ROOM1: &str = "!room1:example.org";

    fn beacon(id: &str, sender: &str, is_live: bool) -> Beacon {
        Beacon::new(id, ROOM1, sender, is_live, 3_600_000, 0)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn event_loop_drives_store_state() {
        let client = Arc::new(InMemoryBeaconClient::new(ALICE));
        let feed = ClientEventFeed::new(16);
        let runtime = spawn_store(client, &StoreConfig::default(), feed.subscribe());
        let handle = runtime.handle();
        handle.mark_ready().expect("store should ready");
        let mut store_events = handle.subscribe().expect("subscription should work");

        feed.emit(ClientBeaconEvent::NewBeacon {
            beacon: beacon("$b1", ALICE, true),
        });
        settle().await;

        assert!(handle.has_live_beacons(Some(ROOM1)));
        assert_eq!(
            store_events.try_recv().ok(),
            Some(StoreEvent::LivenessChange { is_live: true })
        );

        runtime.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_events_flow_through_without_state_changes() {
        let client = Arc::new(InMemoryBeaconClient::new(ALICE));
        let feed = ClientEventFeed::new(16);
        let runtime = spawn_store(client, &StoreConfig::default(), feed.subscribe());
        let handle = runtime.handle();
        handle.mark_ready().expect("store should ready");

        feed.emit(ClientBeaconEvent::NewBeacon {
            beacon: beacon("$bob", BOB, true),
        });
        settle().await;

        assert!(!handle.has_live_beacons(None));
        runtime.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn expired_beacon_going_non_live_persists_the_stop() {
        let client = Arc::new(InMemoryBeaconClient::new(ALICE));
        // created at the epoch, so the share duration elapsed long ago
        client.set_visible_rooms(vec![RoomSnapshot::new(
            ROOM1,
            vec![beacon("$b1", ALICE, true)],
        )]);
        let feed = ClientEventFeed::new(16);
        let runtime = spawn_store(Arc::clone(&client), &StoreConfig::default(), feed.subscribe());
        let handle = runtime.handle();
        handle.mark_ready().expect("store should ready");

        let tracked = handle.get_beacon_by_id("$b1").expect("beacon tracked");
        feed.emit(ClientBeaconEvent::LivenessChange {
            is_live: false,
            beacon: tracked,
        });
        settle().await;

        assert_eq!(
            client.stop_requests(),
            vec![StopRequest {
                room_id: ROOM1.to_owned(),
                beacon_info_id: "$b1".to_owned(),
            }]
        );
        assert!(!handle.has_live_beacons(None));

        runtime.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn ready_scan_and_live_share_work_end_to_end() {
        let client = Arc::new(InMemoryBeaconClient::new(ALICE));
        client.set_visible_rooms(vec![RoomSnapshot::new(
            ROOM1,
            vec![beacon("$b1", ALICE, true)],
        )]);
        let feed = ClientEventFeed::new(16);
        let runtime = spawn_store(Arc::clone(&client), &StoreConfig::default(), feed.subscribe());
        let handle = runtime.handle();
        handle.mark_ready().expect("store should ready");

        let mut share = RoomLiveShare::new(handle.clone(), ROOM1);
        assert!(share.has_live_beacons());
        share.stop_sharing().await.expect("stop should succeed");
        assert_eq!(client.stop_requests().len(), 1);

        // the client confirms the stop as a liveness change
        let stopped = handle.get_beacon_by_id("$b1").expect("beacon tracked");
        feed.emit(ClientBeaconEvent::LivenessChange {
            is_live: false,
            beacon: stopped,
        });
        settle().await;
        assert!(!share.has_live_beacons());

        runtime.shutdown().await;
    }
}
