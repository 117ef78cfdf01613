use std::{env, sync::Arc, time::Duration};

use tracing::info;

use lantern_core::{Beacon, ClientEventFeed, RoomSnapshot, StoreConfig};
use lantern_platform::{FixedIntervalLocationSource, InMemoryBeaconClient, Position};
use lantern_store::{RoomLiveShare, spawn_publisher, spawn_store};

mod logging;

const ROOM_ID: &str = "!smoke:example.org";
const BEACON_INFO_ID: &str = "$smoke-beacon";

#[tokio::main]
async fn main() {
    logging::init();

    let user_id = env::var("LANTERN_USER").unwrap_or_else(|_| "@alice:example.org".to_owned());
    let run_seconds: u64 = env::var("LANTERN_SMOKE_SECONDS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(5);

    let client = Arc::new(InMemoryBeaconClient::new(user_id.clone()));
    client.set_visible_rooms(vec![RoomSnapshot::new(
        ROOM_ID,
        vec![Beacon::new(
            BEACON_INFO_ID,
            ROOM_ID,
            &user_id,
            true,
            3_600_000,
            0,
        )],
    )]);

    let config = StoreConfig::default();
    let feed = ClientEventFeed::new(config.store_event_buffer());
    let runtime = spawn_store(Arc::clone(&client), &config, feed.subscribe());
    let handle = runtime.handle();

    if let Err(err) = handle.mark_ready() {
        eprintln!("Failed to initialize beacon store: {err}");
        std::process::exit(1);
    }
    info!(
        live = handle.has_live_beacons(None),
        "beacon store ready"
    );

    let source = FixedIntervalLocationSource::new(
        Position::new(54.001927, -8.253491, Some(1.0), 0),
        Duration::from_secs(1),
    );
    let publisher = match spawn_publisher(
        Arc::clone(&client),
        source,
        handle.clone(),
        Duration::from_millis(config.republish_interval_ms()),
    ) {
        Ok(publisher) => publisher,
        Err(err) => {
            eprintln!("Failed to start location publisher: {err}");
            std::process::exit(1);
        }
    };

    tokio::time::sleep(Duration::from_secs(run_seconds)).await;
    info!(
        publications = client.location_publications().len(),
        "publishing window elapsed"
    );

    let mut share = RoomLiveShare::new(handle.clone(), ROOM_ID);
    if let Err(err) = share.stop_sharing().await {
        eprintln!("Failed to stop sharing: {err}");
    }
    info!(
        stop_requests = client.stop_requests().len(),
        "stop sharing requested"
    );

    publisher.shutdown().await;
    runtime.shutdown().await;

    println!(
        "Smoke run complete: {} location publications, {} stop requests.",
        client.location_publications().len(),
        client.stop_requests().len()
    );
}
