use tokio::sync::broadcast;

use crate::types::{ClientBeaconEvent, StoreEvent};

/// Beacon notification stream consumed by the store runtime.
pub type ClientEventStream = broadcast::Receiver<ClientBeaconEvent>;

/// Store notification stream consumed by UI observers.
pub type StoreEventStream = broadcast::Receiver<StoreEvent>;

/// Fan-out feed for client beacon notifications.
///
/// The client side keeps the sender; the store runtime subscribes once at
/// startup. Dropping a receiver deregisters it deterministically.
#[derive(Clone, Debug)]
pub struct ClientEventFeed {
    tx: broadcast::Sender<ClientBeaconEvent>,
}

impl ClientEventFeed {
    /// Create a new feed with the given buffer size.
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self { tx }
    }

    /// Subscribe to beacon notifications.
    pub fn subscribe(&self) -> ClientEventStream {
        self.tx.subscribe()
    }

    /// Emit one notification to all subscribers.
    ///
    /// Emission is best-effort; lagged subscribers are handled by `broadcast`.
    pub fn emit(&self, event: ClientBeaconEvent) {
        let _ = self.tx.send(event);
    }
}

/// Fan-out feed for derived store notifications.
#[derive(Clone, Debug)]
pub struct StoreEventFeed {
    tx: broadcast::Sender<StoreEvent>,
}

impl StoreEventFeed {
    /// Create a new feed with the given buffer size.
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self { tx }
    }

    /// Subscribe to store notifications.
    pub fn subscribe(&self) -> StoreEventStream {
        self.tx.subscribe()
    }

    /// Emit one notification to all subscribers, best-effort.
    pub fn emit(&self, event: StoreEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{beacon::Beacon, lifecycle::StoreLifecycleState};

    #[tokio::test]
    async fn fans_out_client_events_to_subscribers() {
        let feed = ClientEventFeed::new(8);
        let mut a = feed.subscribe();
        let mut b = feed.subscribe();

        feed.emit(ClientBeaconEvent::NewBeacon {
            beacon: Beacon::new("$b1", "!r1:example.org", "@alice:example.org", true, 1_000, 0),
        });

        let event_a = a.recv().await.expect("subscriber a should receive event");
        let event_b = b.recv().await.expect("subscriber b should receive event");
        match (event_a, event_b) {
            (
                ClientBeaconEvent::NewBeacon { beacon: beacon_a },
                ClientBeaconEvent::NewBeacon { beacon: beacon_b },
            ) => {
                assert_eq!(beacon_a.beacon_info_id(), "$b1");
                assert_eq!(beacon_b.beacon_info_id(), "$b1");
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn emitting_without_subscribers_is_a_no_op() {
        let feed = StoreEventFeed::new(4);
        feed.emit(StoreEvent::LifecycleChanged {
            state: StoreLifecycleState::Ready,
        });
    }
}
