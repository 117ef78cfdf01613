//! Core contract for the live-location beacon store.
//!
//! This crate defines the beacon entity, the registry and liveness index the
//! store maintains, the lifecycle model, the client collaborator contract,
//! and the common event/channel and error abstractions.

/// Shared beacon handle and expiry helpers.
pub mod beacon;
/// Broadcast event feed primitives.
pub mod channel;
/// Client collaborator contract and room snapshots.
pub mod client;
/// Stable store error types and HTTP classification helper.
pub mod error;
/// Store lifecycle state machine.
pub mod lifecycle;
/// Derived room-liveness index.
pub mod liveness;
/// Beacon registry with room indexing.
pub mod registry;
/// Event payloads and store configuration.
pub mod types;

pub use beacon::Beacon;
pub use channel::{ClientEventFeed, ClientEventStream, StoreEventFeed, StoreEventStream};
pub use client::{BeaconClient, RoomSnapshot};
pub use error::{StoreError, StoreErrorCategory, classify_http_status};
pub use lifecycle::{StoreLifecycle, StoreLifecycleState};
pub use liveness::LivenessIndex;
pub use registry::BeaconRegistry;
pub use types::{ClientBeaconEvent, StoreConfig, StoreEvent};
