// Domain layer: world entities, registries and the rules that mutate them.

pub mod entities;
pub mod registry;
pub mod spatial;
pub mod systems;
pub mod tuning;

pub use entities::{Point, Resource, ResourceId, RoundKind, Shot, ShotId, Tank, TankId};
pub use registry::{EntityRegistry, Registry};
pub use spatial::{SpatialEntry, SpatialGrid};
