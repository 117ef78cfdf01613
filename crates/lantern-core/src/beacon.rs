use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// One live-location-sharing session started by a user in a room.
///
/// The client collaborator hands the same logical beacon to room state and to
/// event listeners, so `Beacon` is a cheaply clonable handle: identity fields
/// are immutable and shared, liveness and monitoring flags are shared mutable
/// state visible through every clone.
#[derive(Debug, Clone)]
pub struct Beacon {
    identity: Arc<BeaconIdentity>,
    live: Arc<AtomicBool>,
    monitoring: Arc<AtomicBool>,
}

/// Immutable attributes fixed by the beacon-info state event.
#[derive(Debug)]
struct BeaconIdentity {
    beacon_info_id: String,
    room_id: String,
    sender_user_id: String,
    timeout_ms: u64,
    created_at_ms: u64,
}

impl Beacon {
    /// Create a beacon handle from beacon-info state event attributes.
    pub fn new(
        beacon_info_id: impl Into<String>,
        room_id: impl Into<String>,
        sender_user_id: impl Into<String>,
        is_live: bool,
        timeout_ms: u64,
        created_at_ms: u64,
    ) -> Self {
        Self {
            identity: Arc::new(BeaconIdentity {
                beacon_info_id: beacon_info_id.into(),
                room_id: room_id.into(),
                sender_user_id: sender_user_id.into(),
                timeout_ms,
                created_at_ms,
            }),
            live: Arc::new(AtomicBool::new(is_live)),
            monitoring: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stable beacon identifier, doubles as the creating state event id.
    pub fn beacon_info_id(&self) -> &str {
        &self.identity.beacon_info_id
    }

    /// Room the beacon belongs to.
    pub fn room_id(&self) -> &str {
        &self.identity.room_id
    }

    /// User who started the beacon.
    pub fn sender_user_id(&self) -> &str {
        &self.identity.sender_user_id
    }

    /// Share duration in milliseconds from creation.
    pub fn timeout_ms(&self) -> u64 {
        self.identity.timeout_ms
    }

    /// Creation timestamp in milliseconds since the Unix epoch.
    pub fn created_at_ms(&self) -> u64 {
        self.identity.created_at_ms
    }

    /// Last-reported liveness.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Record a liveness transition reported by the client.
    pub fn set_live(&self, is_live: bool) {
        self.live.store(is_live, Ordering::SeqCst);
    }

    /// Wall-clock instant at which the share duration elapses.
    pub fn expires_at_ms(&self) -> u64 {
        self.identity
            .created_at_ms
            .saturating_add(self.identity.timeout_ms)
    }

    /// Whether the share duration has elapsed at `now_ms`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms()
    }

    /// Activate the beacon's own liveness-monitoring mechanism.
    ///
    /// The expiry timer itself lives with the client collaborator; the store
    /// only records that monitoring was requested.
    pub fn monitor_liveness(&self) {
        self.monitoring.store(true, Ordering::SeqCst);
    }

    /// Deactivate liveness monitoring (store teardown).
    pub fn stop_monitoring(&self) {
        self.monitoring.store(false, Ordering::SeqCst);
    }

    /// Whether liveness monitoring is active.
    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_liveness_state() {
        let beacon = Beacon::new("$b1", "!r1:example.org", "@alice:example.org", true, 3_600_000, 0);
        let clone = beacon.clone();

        clone.set_live(false);
        assert!(!beacon.is_live());

        beacon.monitor_liveness();
        assert!(clone.is_monitoring());
    }

    #[test]
    fn computes_expiry_from_creation_and_timeout() {
        let beacon = Beacon::new("$b1", "!r1:example.org", "@alice:example.org", true, 1_000, 500);
        assert_eq!(beacon.expires_at_ms(), 1_500);
        assert!(!beacon.is_expired(1_499));
        assert!(beacon.is_expired(1_500));
    }

    #[test]
    fn expiry_saturates_on_overflow() {
        let beacon = Beacon::new("$b1", "!r1:example.org", "@alice:example.org", true, u64::MAX, 10);
        assert_eq!(beacon.expires_at_ms(), u64::MAX);
    }
}
