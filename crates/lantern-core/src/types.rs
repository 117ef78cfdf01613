use serde::{Deserialize, Serialize};

use crate::{beacon::Beacon, lifecycle::StoreLifecycleState};

/// Beacon notification delivered by the client collaborator.
///
/// Payloads are explicit tagged variants rather than positional arguments;
/// handlers filter on them before touching any store state.
#[derive(Debug, Clone)]
pub enum ClientBeaconEvent {
    /// A beacon belonging to some user appeared.
    NewBeacon {
        /// The beacon handle shared with room state.
        beacon: Beacon,
    },
    /// A known beacon's live/expired status changed.
    LivenessChange {
        /// New liveness reported by the beacon's monitor.
        is_live: bool,
        /// The beacon the transition applies to.
        beacon: Beacon,
    },
}

/// Derived change notification emitted by the store to UI observers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StoreEvent {
    /// Global liveness transitioned; `is_live` is the new aggregate value.
    LivenessChange {
        /// Whether any room still has a live beacon.
        is_live: bool,
    },
    /// A beacon of the local user's entered tracking.
    NewBeaconTracked {
        /// Room the beacon belongs to.
        room_id: String,
        /// Stable beacon identifier.
        beacon_info_id: String,
    },
    /// Store lifecycle transition.
    LifecycleChanged {
        /// New lifecycle state.
        state: StoreLifecycleState,
    },
}

/// Optional runtime tuning values supplied at store construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StoreConfig {
    /// Optional store event broadcast buffer size.
    ///
    /// When `None`, the store default is used.
    pub store_event_buffer: Option<usize>,
    /// Optional republish interval for idle location watches, in milliseconds.
    pub republish_interval_ms: Option<u64>,
}

impl StoreConfig {
    /// Default broadcast buffer for store events.
    pub const DEFAULT_STORE_EVENT_BUFFER: usize = 64;
    /// Default idle republish interval in milliseconds.
    pub const DEFAULT_REPUBLISH_INTERVAL_MS: u64 = 30_000;

    /// Effective store event buffer size.
    pub fn store_event_buffer(&self) -> usize {
        self.store_event_buffer
            .unwrap_or(Self::DEFAULT_STORE_EVENT_BUFFER)
            .max(1)
    }

    /// Effective idle republish interval in milliseconds.
    pub fn republish_interval_ms(&self) -> u64 {
        self.republish_interval_ms
            .unwrap_or(Self::DEFAULT_REPUBLISH_INTERVAL_MS)
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_apply_when_unset() {
        let config = StoreConfig::default();
        assert_eq!(
            config.store_event_buffer(),
            StoreConfig::DEFAULT_STORE_EVENT_BUFFER
        );
        assert_eq!(
            config.republish_interval_ms(),
            StoreConfig::DEFAULT_REPUBLISH_INTERVAL_MS
        );
    }

    #[test]
    fn config_overrides_are_floored_at_one() {
        let config = StoreConfig {
            store_event_buffer: Some(0),
            republish_interval_ms: Some(0),
        };
        assert_eq!(config.store_event_buffer(), 1);
        assert_eq!(config.republish_interval_ms(), 1);
    }
}
