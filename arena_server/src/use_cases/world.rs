// The world aggregate: every registry plus the session table, mutated by one
// writer at a time. `handle` never blocks and never fails; anything it wants
// sent or scheduled comes back as `Effects` for the world task to carry out.

use super::types::{
    ConnId, Dispatch, GameEvent, ShotLaunch, TankMovement, TankSpawn, WorldEvent, WorldSnapshot,
};
use crate::domain::systems::economy::{self, DropReport, EconomyEvent};
use crate::domain::systems::hits;
use crate::domain::tuning::FieldTuning;
use crate::domain::tuning::field::seed_resources;
use crate::domain::{EntityRegistry, Point, ResourceId, Shot, SpatialGrid, Tank, TankId};
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no tank spawned yet.
    Joining,
    Active {
        tank_id: TankId,
    },
    /// The world was reset under this connection; it has to join again.
    Reset,
}

/// A deferred roster broadcast, valid only while the world epoch is unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRequest {
    pub epoch: u64,
    pub tank_id: TankId,
}

#[derive(Debug, Default, PartialEq)]
pub struct Effects {
    pub dispatches: Vec<Dispatch>,
    /// Roster broadcast to fire once the spawn grace period has passed.
    pub schedule: Option<RosterRequest>,
    /// Abort every pending roster broadcast.
    pub cancel_scheduled: bool,
}

impl Effects {
    fn dispatch(dispatches: Vec<Dispatch>) -> Self {
        Self {
            dispatches,
            ..Self::default()
        }
    }
}

impl From<EconomyEvent> for WorldEvent {
    fn from(event: EconomyEvent) -> Self {
        match event {
            EconomyEvent::PickedUp {
                tank_id,
                resource_id,
            } => WorldEvent::ResourcePickedUp {
                tank_id,
                resource_id,
            },
            EconomyEvent::Dropped(resource) => WorldEvent::ResourceDropped(resource),
        }
    }
}

pub struct World {
    field: FieldTuning,
    registry: EntityRegistry,
    grid: SpatialGrid<ResourceId>,
    sessions: HashMap<ConnId, SessionState>,
    epoch: u64,
    seeded: bool,
}

impl World {
    /// A fresh world with the seed resources already planted.
    pub fn new(field: FieldTuning) -> Self {
        let mut world = Self {
            field,
            registry: EntityRegistry::new(),
            grid: SpatialGrid::new(field.width, field.height, field.cell_size),
            sessions: HashMap::new(),
            epoch: 0,
            seeded: false,
        };
        world.plant_seeds();
        world
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn session(&self, conn_id: ConnId) -> Option<&SessionState> {
        self.sessions.get(&conn_id)
    }

    pub fn handle(&mut self, event: GameEvent) -> Effects {
        match event {
            GameEvent::Connected { conn_id } => {
                self.sessions.insert(conn_id, SessionState::Joining);
                debug!(conn_id, "session opened");
                Effects::default()
            }
            GameEvent::Join { conn_id, player } => self.join(conn_id, &player),
            GameEvent::SpawnTank { conn_id, spawn } => self.spawn(conn_id, spawn),
            GameEvent::MoveTank { conn_id, movement } => self.move_tank(conn_id, movement),
            GameEvent::FireShot { conn_id, launch } => self.fire(conn_id, launch),
            GameEvent::MoveShot { shot_id, position } => self.move_shot(&shot_id, position),
            GameEvent::ShotExpired { shot_id } => {
                if self.registry.remove_shot(&shot_id).is_some() {
                    debug!(shot_id, "shot expired");
                }
                Effects::default()
            }
            GameEvent::PickUpResource {
                tank_id,
                resource_id,
            } => {
                let events =
                    economy::transfer(&mut self.registry, &tank_id, resource_id, &self.field);
                Effects::dispatch(Self::broadcast_economy(events))
            }
            GameEvent::DropResource(report) => self.drop_resource(report),
            GameEvent::ResetAll { conn_id } => self.reset(conn_id),
            GameEvent::Disconnect { conn_id } => self.disconnect(conn_id),
        }
    }

    /// Fires a deferred roster broadcast, unless a reset or removal made it stale.
    pub fn roster_due(&mut self, request: RosterRequest) -> Effects {
        if request.epoch != self.epoch {
            debug!(
                tank_id = %request.tank_id,
                scheduled_epoch = request.epoch,
                epoch = self.epoch,
                "stale roster broadcast skipped"
            );
            return Effects::default();
        }
        if self.registry.tank(&request.tank_id).is_none() {
            debug!(tank_id = %request.tank_id, "roster broadcast for missing tank skipped");
            return Effects::default();
        }

        let roster = self.sorted_tanks();
        debug!(tank_id = %request.tank_id, tanks = roster.len(), "broadcasting tank roster");
        Effects::dispatch(vec![Dispatch::everyone(WorldEvent::TankRoster(roster))])
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            resources: self
                .registry
                .resources()
                .sorted()
                .into_iter()
                .map(|(_, resource)| resource.clone())
                .collect(),
            opponents: self.sorted_tanks(),
            flying: self
                .registry
                .shots()
                .sorted()
                .into_iter()
                .map(|(_, shot)| shot.clone())
                .collect(),
        }
    }

    fn sorted_tanks(&self) -> Vec<Tank> {
        self.registry
            .tanks()
            .sorted()
            .into_iter()
            .map(|(_, tank)| tank.clone())
            .collect()
    }

    fn plant_seeds(&mut self) {
        for resource in seed_resources() {
            self.registry.upsert_resource(resource);
        }
        self.seeded = true;
    }

    fn broadcast_economy(events: Vec<EconomyEvent>) -> Vec<Dispatch> {
        events
            .into_iter()
            .map(|event| Dispatch::everyone(event.into()))
            .collect()
    }

    fn join(&mut self, conn_id: ConnId, player: &str) -> Effects {
        let session = self.sessions.entry(conn_id).or_insert(SessionState::Joining);
        if *session == SessionState::Reset {
            *session = SessionState::Joining;
        }
        if !self.seeded {
            self.plant_seeds();
            info!(epoch = self.epoch, "world re-initialised");
        }

        info!(conn_id, player, "client joined");
        Effects::dispatch(vec![Dispatch::only(
            conn_id,
            WorldEvent::Snapshot(self.snapshot()),
        )])
    }

    fn spawn(&mut self, conn_id: ConnId, spawn: TankSpawn) -> Effects {
        let TankSpawn {
            tank_id,
            position,
            heading,
            color,
            player_name,
            ammo,
        } = spawn;

        let tank = Tank::new(
            tank_id.clone(),
            self.field.clamp(position),
            heading,
            player_name,
            color,
        );
        if self.registry.upsert_tank(tank) {
            info!(conn_id, tank_id = %tank_id, "tank spawned");
            let unclaimed = ammo.filter(|pack| !self.registry.knows_resource(pack.id));
            if let (Some(pack), Some(tank)) = (unclaimed, self.registry.tank_mut(&tank_id)) {
                tank.equip(pack);
            }
            // Only the registering connection owns the tank's disconnect.
            self.sessions.insert(
                conn_id,
                SessionState::Active {
                    tank_id: tank_id.clone(),
                },
            );
        } else {
            debug!(conn_id, tank_id = %tank_id, "tank already registered; spawn ignored");
        }

        Effects {
            schedule: Some(RosterRequest {
                epoch: self.epoch,
                tank_id,
            }),
            ..Effects::default()
        }
    }

    fn move_tank(&mut self, conn_id: ConnId, movement: TankMovement) -> Effects {
        let id = movement.tank_id.as_str();
        if !self
            .registry
            .move_tank(id, movement.position, movement.heading)
        {
            debug!(conn_id, tank_id = id, "move for unknown tank ignored");
            return Effects::default();
        }
        if !movement.color.is_null() {
            if let Some(tank) = self.registry.tank_mut(id) {
                tank.color = movement.color.clone();
            }
        }

        let pickups = economy::collect_nearby(&mut self.registry, &mut self.grid, id, &self.field);

        let mut dispatches = vec![Dispatch::all_except(
            conn_id,
            WorldEvent::TankMoved(movement),
        )];
        dispatches.extend(Self::broadcast_economy(pickups));
        Effects::dispatch(dispatches)
    }

    fn fire(&mut self, conn_id: ConnId, launch: ShotLaunch) -> Effects {
        if self.registry.tank(&launch.tank_id).is_none() {
            debug!(conn_id, tank_id = %launch.tank_id, "shot from unknown tank ignored");
            return Effects::default();
        }

        let shot = Shot::new(
            launch.tank_id,
            launch.sequence,
            launch.position,
            launch.angle,
            launch.kind,
        );
        if !self.registry.upsert_shot(shot.clone()) {
            debug!(conn_id, shot_id = %shot.id, "duplicate shot ignored");
            return Effects::default();
        }

        let remaining = economy::consume_round(&mut self.registry, &shot.owner);
        debug!(
            shot_id = %shot.id,
            kind = shot.kind.tag(),
            remaining = ?remaining,
            "shot registered"
        );
        Effects::dispatch(vec![Dispatch::everyone(WorldEvent::ShotSpawned(shot))])
    }

    fn move_shot(&mut self, shot_id: &str, position: Point) -> Effects {
        if !self.registry.move_shot(shot_id, position) {
            debug!(shot_id, "move for unknown shot ignored");
            return Effects::default();
        }

        let outcome = hits::resolve_shot(&mut self.registry, shot_id, self.field.hit_radius);
        if !outcome.shot_removed {
            hits::retire_if_spent(&mut self.registry, shot_id, &self.field);
        }

        Effects::dispatch(
            outcome
                .destroyed
                .into_iter()
                .map(|tank_id| Dispatch::everyone(WorldEvent::TankDestroyed(tank_id)))
                .collect(),
        )
    }

    fn drop_resource(&mut self, report: DropReport) -> Effects {
        match economy::drop_resource(&mut self.registry, report, &self.field) {
            Some(event) => Effects::dispatch(vec![Dispatch::everyone(event.into())]),
            None => Effects::default(),
        }
    }

    fn disconnect(&mut self, conn_id: ConnId) -> Effects {
        let Some(session) = self.sessions.remove(&conn_id) else {
            debug!(conn_id, "disconnect for unknown session");
            return Effects::default();
        };
        let SessionState::Active { tank_id } = session else {
            debug!(conn_id, "session closed without a tank");
            return Effects::default();
        };
        let Some(tank) = self.registry.tank_mut(&tank_id) else {
            debug!(conn_id, tank_id = %tank_id, "disconnected tank already gone");
            return Effects::default();
        };

        tank.connected = false;
        info!(conn_id, tank_id = %tank_id, "tank disconnected");
        Effects::dispatch(vec![Dispatch::everyone(WorldEvent::TankDisconnected(
            tank_id,
        ))])
    }

    fn reset(&mut self, conn_id: ConnId) -> Effects {
        let removed = self.registry.remove_all_tanks();
        let shots = self.registry.remove_all_shots();
        let resources = self.registry.remove_all_resources();
        self.seeded = false;
        self.epoch += 1;
        for session in self.sessions.values_mut() {
            *session = SessionState::Reset;
        }

        info!(
            conn_id,
            tanks = removed.len(),
            shots = shots.len(),
            resources = resources.len(),
            epoch = self.epoch,
            "world reset"
        );

        let mut dispatches: Vec<Dispatch> = removed
            .into_iter()
            .map(|tank_id| Dispatch::everyone(WorldEvent::TankDestroyed(tank_id)))
            .collect();
        dispatches.push(Dispatch::everyone(WorldEvent::WorldReset));

        Effects {
            dispatches,
            schedule: None,
            cancel_scheduled: true,
        }
    }
}
