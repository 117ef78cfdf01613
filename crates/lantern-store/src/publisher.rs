use std::{future, sync::Arc, time::Duration};

use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::JoinHandle,
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use lantern_core::{BeaconClient, StoreError, types::StoreEvent};
use lantern_platform::{LocationSource, Position};

use crate::store::BeaconStoreHandle;

/// Handle to a running location publisher task.
#[derive(Debug)]
pub struct PublisherHandle {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl PublisherHandle {
    /// Cancel the publisher and wait for its task to finish.
    pub async fn shutdown(self) {
        self.stop.cancel();
        let _ = self.task.await;
    }
}

/// Spawn the task that publishes location samples to live beacons.
///
/// The task watches the location source only while the store reports live
/// beacons, fans each sample out to every live beacon, and republishes the
/// last sample when the source stays quiet for `republish_interval`. Publish
/// failures are logged and skipped; the next sample retries naturally.
pub fn spawn_publisher<C, S>(
    client: Arc<C>,
    source: S,
    handle: BeaconStoreHandle<C>,
    republish_interval: Duration,
) -> Result<PublisherHandle, StoreError>
where
    C: BeaconClient,
    S: LocationSource,
{
    let events = handle.subscribe()?;
    let stop = CancellationToken::new();
    let task_stop = stop.clone();

    let task = tokio::spawn(async move {
        let mut events = events;
        let mut watch: Option<mpsc::Receiver<Position>> = if handle.has_live_beacons(None) {
            Some(source.subscribe())
        } else {
            None
        };
        let mut last_position: Option<Position> = None;
        let mut last_publish: Option<Instant> = None;

        loop {
            let republish_at = last_publish
                .map(|at| at + republish_interval)
                .unwrap_or_else(|| Instant::now() + republish_interval);

            tokio::select! {
                _ = task_stop.cancelled() => {
                    debug!("location publisher stopping");
                    break;
                }
                event = events.recv() => match event {
                    Ok(StoreEvent::LivenessChange { is_live: true }) => {
                        if watch.is_none() {
                            debug!("live beacons present, starting location watch");
                            watch = Some(source.subscribe());
                        }
                    }
                    Ok(StoreEvent::LivenessChange { is_live: false }) => {
                        debug!("no live beacons left, ending location watch");
                        watch = None;
                        last_position = None;
                        last_publish = None;
                    }
                    Ok(StoreEvent::NewBeaconTracked { room_id, beacon_info_id }) => {
                        // a beacon added mid-watch gets the last known
                        // position right away instead of waiting for the
                        // next sample
                        if let Some(position) = last_position.clone()
                            && handle
                                .get_beacon_by_id(&beacon_info_id)
                                .is_some_and(|beacon| beacon.is_live())
                        {
                            publish_one(&client, &room_id, &beacon_info_id, &position).await;
                            last_publish = Some(Instant::now());
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "location publisher lagged behind store events");
                        if handle.has_live_beacons(None) {
                            if watch.is_none() {
                                watch = Some(source.subscribe());
                            }
                        } else {
                            watch = None;
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
                position = next_position(&mut watch) => match position {
                    Some(position) => {
                        publish(&client, &handle, &position).await;
                        last_position = Some(position);
                        last_publish = Some(Instant::now());
                    }
                    None => {
                        debug!("location watch ended by source");
                        watch = None;
                    }
                },
                _ = time::sleep_until(republish_at), if last_publish.is_some() => {
                    if let Some(position) = last_position.clone() {
                        debug!("republishing last known position after inactivity");
                        publish(&client, &handle, &position).await;
                        last_publish = Some(Instant::now());
                    }
                }
            }
        }
    });

    Ok(PublisherHandle { stop, task })
}

async fn next_position(watch: &mut Option<mpsc::Receiver<Position>>) -> Option<Position> {
    match watch {
        Some(receiver) => receiver.recv().await,
        None => future::pending().await,
    }
}

async fn publish<C: BeaconClient>(
    client: &Arc<C>,
    handle: &BeaconStoreHandle<C>,
    position: &Position,
) {
    for (room_id, beacon_info_id) in handle.live_targets() {
        publish_one(client, &room_id, &beacon_info_id, position).await;
    }
}

async fn publish_one<C: BeaconClient>(
    client: &Arc<C>,
    room_id: &str,
    beacon_info_id: &str,
    position: &Position,
) {
    if let Err(err) = client
        .send_location(room_id, beacon_info_id, &position.geo_uri(), position.timestamp_ms)
        .await
    {
        warn!(%room_id, %beacon_info_id, error = %err, "failed to publish location");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_core::{Beacon, RoomSnapshot, StoreConfig, types::ClientBeaconEvent};
    use lantern_platform::{InMemoryBeaconClient, ScriptedLocationSource};

    use crate::store::OwnBeaconStore;

    const ALICE: &str = "@alice:example.org";
    const ROOM1: &str = "!room1:example.org";
    const HOUR_MS: u64 = 3_600_000;
    const REPUBLISH: Duration = Duration::from_secs(30);

    fn beacon(id: &str, is_live: bool) -> Beacon {
        Beacon::new(id, ROOM1, ALICE, is_live, 3 * HOUR_MS, 0)
    }

    fn ready_handle(
        rooms: Vec<RoomSnapshot>,
    ) -> (BeaconStoreHandle<InMemoryBeaconClient>, Arc<InMemoryBeaconClient>) {
        let client = Arc::new(InMemoryBeaconClient::new(ALICE));
        client.set_visible_rooms(rooms);
        let handle =
            BeaconStoreHandle::new(OwnBeaconStore::new(Arc::clone(&client), &StoreConfig::default()));
        handle.mark_ready().expect("store should ready");
        (handle, client)
    }

    async fn settle() {
        time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_positions_to_every_live_beacon() {
        let (handle, client) = ready_handle(vec![RoomSnapshot::new(
            ROOM1,
            vec![beacon("$b1", true), beacon("$b2", true)],
        )]);
        let source = Arc::new(ScriptedLocationSource::new(vec![Position::new(
            54.001927,
            -8.253491,
            Some(1.0),
            1_647_270_879_403,
        )]));

        let publisher = spawn_publisher(client.clone(), source, handle, REPUBLISH)
            .expect("publisher should spawn");
        settle().await;

        let publications = client.location_publications();
        assert_eq!(publications.len(), 2);
        assert_eq!(publications[0].geo_uri, "geo:54.001927,-8.253491;u=1");
        assert_eq!(publications[0].timestamp_ms, 1_647_270_879_403);
        assert_eq!(publications[0].beacon_info_id, "$b1");
        assert_eq!(publications[1].beacon_info_id, "$b2");

        publisher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn watches_the_source_only_while_beacons_are_live() {
        let (handle, client) = ready_handle(Vec::new());
        let source = Arc::new(ScriptedLocationSource::default());

        let publisher = spawn_publisher(
            client.clone(),
            Arc::clone(&source),
            handle.clone(),
            REPUBLISH,
        )
        .expect("publisher should spawn");
        settle().await;
        assert_eq!(source.subscription_count(), 0);

        handle.handle_client_event(ClientBeaconEvent::NewBeacon {
            beacon: beacon("$b1", true),
        });
        settle().await;
        assert_eq!(source.subscription_count(), 1);

        source.push(Position::new(1.0, 2.0, None, 100));
        settle().await;
        assert_eq!(client.location_publications().len(), 1);

        publisher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stops_watching_when_the_last_beacon_goes_non_live() {
        let (handle, client) = ready_handle(vec![RoomSnapshot::new(
            ROOM1,
            vec![beacon("$b1", true)],
        )]);
        let source = Arc::new(ScriptedLocationSource::default());

        let publisher = spawn_publisher(
            client.clone(),
            Arc::clone(&source),
            handle.clone(),
            REPUBLISH,
        )
        .expect("publisher should spawn");
        settle().await;
        assert_eq!(source.subscription_count(), 1);

        let tracked = handle.get_beacon_by_id("$b1").expect("beacon tracked");
        handle.handle_client_event(ClientBeaconEvent::LivenessChange {
            is_live: false,
            beacon: tracked,
        });
        settle().await;

        source.push(Position::new(1.0, 2.0, None, 100));
        settle().await;
        assert!(client.location_publications().is_empty());
        assert_eq!(source.subscription_count(), 1);

        publisher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn beacon_added_mid_watch_gets_the_last_known_position_immediately() {
        let (handle, client) = ready_handle(vec![RoomSnapshot::new(
            ROOM1,
            vec![beacon("$b1", true)],
        )]);
        let source = Arc::new(ScriptedLocationSource::new(vec![Position::new(
            1.0, 2.0, None, 100,
        )]));

        let publisher = spawn_publisher(
            client.clone(),
            Arc::clone(&source),
            handle.clone(),
            REPUBLISH,
        )
        .expect("publisher should spawn");
        settle().await;
        assert_eq!(client.location_publications().len(), 1);

        handle.handle_client_event(ClientBeaconEvent::NewBeacon {
            beacon: beacon("$b2", true),
        });
        settle().await;

        let publications = client.location_publications();
        assert_eq!(publications.len(), 2);
        assert_eq!(publications[1].beacon_info_id, "$b2");
        assert_eq!(publications[1].geo_uri, publications[0].geo_uri);

        publisher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn republishes_the_last_position_after_inactivity() {
        let (handle, client) = ready_handle(vec![RoomSnapshot::new(
            ROOM1,
            vec![beacon("$b1", true)],
        )]);
        let source = Arc::new(ScriptedLocationSource::new(vec![Position::new(
            1.0, 2.0, None, 100,
        )]));

        let publisher = spawn_publisher(client.clone(), source, handle, REPUBLISH)
            .expect("publisher should spawn");
        settle().await;
        assert_eq!(client.location_publications().len(), 1);

        time::sleep(REPUBLISH + Duration::from_secs(1)).await;
        let publications = client.location_publications();
        assert!(publications.len() >= 2);
        assert_eq!(publications[1].geo_uri, publications[0].geo_uri);

        publisher.shutdown().await;
    }
}
