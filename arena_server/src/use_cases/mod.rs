// Use cases layer: the world aggregate and the task that drives it.

pub mod game;
pub mod types;
pub mod world;

pub use game::{WorldSettings, world_task};
pub use types::{
    Audience, ConnId, Dispatch, GameEvent, ShotLaunch, TankMovement, TankSpawn, WorldEvent,
    WorldSnapshot,
};
pub use world::{Effects, RosterRequest, SessionState, World};
