//! Runtime primitives for the rescue simulation: math, clock, ordered event
//! delivery and the navigation/spatial service seams with in-memory backends.

mod clock;
mod events;
mod math;
pub mod nav;
pub mod spatial;

pub use clock::SimClock;
pub use events::{DeliveryReport, EventHub, SubscriberError, SubscriptionId};
pub use math::{move_towards, Vec3};
pub use nav::{GridError, GridNavAgent, GridNavMesh, NavMesh, NavigationAgent, PathStatus};
pub use spatial::{ObjectId, OverlapHit, SpatialIndex, SpatialQuery, FLAMMABLE_TAG};
