// Use-case level inputs/outputs for the world task.

use crate::domain::systems::economy::DropReport;
use crate::domain::{Point, Resource, ResourceId, RoundKind, Shot, ShotId, Tank, TankId};
use serde_json::Value;

/// Transport-assigned id of one WebSocket connection.
pub type ConnId = u64;

#[derive(Debug, Clone)]
pub enum GameEvent {
    Connected {
        conn_id: ConnId,
    },
    Join {
        conn_id: ConnId,
        player: String,
    },
    SpawnTank {
        conn_id: ConnId,
        spawn: TankSpawn,
    },
    MoveTank {
        conn_id: ConnId,
        movement: TankMovement,
    },
    FireShot {
        conn_id: ConnId,
        launch: ShotLaunch,
    },
    MoveShot {
        shot_id: ShotId,
        position: Point,
    },
    ShotExpired {
        shot_id: ShotId,
    },
    PickUpResource {
        tank_id: TankId,
        resource_id: ResourceId,
    },
    DropResource(DropReport),
    ResetAll {
        conn_id: ConnId,
    },
    Disconnect {
        conn_id: ConnId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TankSpawn {
    pub tank_id: TankId,
    pub position: Point,
    pub heading: f64,
    pub color: Value,
    pub player_name: String,
    // Pack the client claims to carry already.
    pub ammo: Option<Resource>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TankMovement {
    pub tank_id: TankId,
    pub position: Point,
    pub heading: f64,
    pub color: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShotLaunch {
    pub tank_id: TankId,
    pub sequence: u64,
    pub position: Point,
    pub angle: f64,
    pub kind: RoundKind,
}

/// Who an outbound event is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Everyone,
    AllExcept(ConnId),
    Only(ConnId),
}

impl Audience {
    pub fn includes(self, conn_id: ConnId) -> bool {
        match self {
            Audience::Everyone => true,
            Audience::AllExcept(excluded) => excluded != conn_id,
            Audience::Only(target) => target == conn_id,
        }
    }
}

/// Full world view handed to a joining client. Every list is in id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldSnapshot {
    pub resources: Vec<Resource>,
    pub opponents: Vec<Tank>,
    pub flying: Vec<Shot>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    Snapshot(WorldSnapshot),
    TankRoster(Vec<Tank>),
    TankMoved(TankMovement),
    ShotSpawned(Shot),
    TankDestroyed(TankId),
    TankDisconnected(TankId),
    ResourcePickedUp {
        tank_id: TankId,
        resource_id: ResourceId,
    },
    ResourceDropped(Resource),
    WorldReset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub audience: Audience,
    pub event: WorldEvent,
}

impl Dispatch {
    pub fn everyone(event: WorldEvent) -> Self {
        Self {
            audience: Audience::Everyone,
            event,
        }
    }

    pub fn only(conn_id: ConnId, event: WorldEvent) -> Self {
        Self {
            audience: Audience::Only(conn_id),
            event,
        }
    }

    pub fn all_except(conn_id: ConnId, event: WorldEvent) -> Self {
        Self {
            audience: Audience::AllExcept(conn_id),
            event,
        }
    }
}
