//! QGate Coordinator Registry
//!
//! Tracks the live query coordinators behind the gateway and hands out one
//! coordinator per request by rotating over them.

pub mod facade;
pub mod probe;
pub mod record;
pub mod registry;
pub mod selector;
pub mod store;

pub use facade::RegistryFacade;
pub use probe::{HttpLivenessProbe, LivenessProbe};
pub use record::{CoordinatorKey, CoordinatorRecord};
pub use registry::{CoordinatorRegistry, Removal, RotationSource};
pub use selector::RotationSelector;
pub use store::{CoordinatorStore, InMemoryCoordinatorStore, SqliteCoordinatorStore};
