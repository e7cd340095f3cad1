// Domain-level world entities: tanks, in-flight shots and field resources.

use crate::domain::tuning::rounds::{RoundProfile, profile};
use crate::domain::tuning::tank::MAX_HEALTH;
use serde_json::Value;

pub type TankId = String;
pub type ShotId = String;
pub type ResourceId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Moves `distance` units away from this point, opposite to `heading`.
    pub fn behind(self, heading: f64, distance: f64) -> Point {
        Point::new(
            self.x - heading.cos() * distance,
            self.y - heading.sin() * distance,
        )
    }
}

/// Round kinds a resource can carry. Each kind has a fixed profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundKind {
    Rapid,
    Split,
    Ballistic,
}

impl RoundKind {
    /// Single-letter wire tag (`R`, `S`, `B`).
    pub fn tag(self) -> &'static str {
        match self {
            RoundKind::Rapid => "R",
            RoundKind::Split => "S",
            RoundKind::Ballistic => "B",
        }
    }

    /// Parses a wire tag. Anything unrecognised is a Rapid round, matching the
    /// shell clients fall back to.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().chars().next() {
            Some('S') | Some('s') => RoundKind::Split,
            Some('B') | Some('b') => RoundKind::Ballistic,
            _ => RoundKind::Rapid,
        }
    }

    pub fn profile(self) -> RoundProfile {
        profile(self)
    }
}

/// A player-controlled tank.
///
/// `destroyed` is derived from health so the two can never disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct Tank {
    pub id: TankId,
    pub position: Point,
    pub heading: f64,
    pub connected: bool,
    pub equipped: Option<Resource>,
    pub player_name: String,
    // Client-side display colour, echoed back verbatim.
    pub color: Value,
    health: u8,
}

impl Tank {
    pub fn new(
        id: impl Into<TankId>,
        position: Point,
        heading: f64,
        player_name: impl Into<String>,
        color: Value,
    ) -> Self {
        Self {
            id: id.into(),
            position,
            heading,
            connected: true,
            equipped: None,
            player_name: player_name.into(),
            color,
            health: MAX_HEALTH,
        }
    }

    pub fn health(&self) -> u8 {
        self.health
    }

    pub fn is_destroyed(&self) -> bool {
        self.health == 0
    }

    /// Connected and still alive; only these can be hit or pick things up.
    pub fn is_active(&self) -> bool {
        self.connected && !self.is_destroyed()
    }

    pub fn destroy(&mut self) {
        self.health = 0;
    }

    /// Equips `resource` and hands back whatever was equipped before.
    pub fn equip(&mut self, resource: Resource) -> Option<Resource> {
        self.equipped.replace(resource)
    }

    pub fn holds(&self, resource_id: ResourceId) -> bool {
        self.equipped.as_ref().is_some_and(|r| r.id == resource_id)
    }
}

/// An in-flight projectile reported by the firing client.
#[derive(Debug, Clone, PartialEq)]
pub struct Shot {
    pub id: ShotId,
    pub owner: TankId,
    pub sequence: u64,
    pub origin: Point,
    pub position: Point,
    pub angle: f64,
    pub kind: RoundKind,
}

impl Shot {
    pub fn new(
        owner: impl Into<TankId>,
        sequence: u64,
        origin: Point,
        angle: f64,
        kind: RoundKind,
    ) -> Self {
        let owner = owner.into();
        Self {
            id: Shot::compose_id(&owner, sequence),
            owner,
            sequence,
            origin,
            position: origin,
            angle,
            kind,
        }
    }

    /// Shot ids are `<owner>><sequence>`, unique per owner and sequence number.
    pub fn compose_id(owner: &str, sequence: u64) -> ShotId {
        format!("{owner}>{sequence}")
    }

    pub fn power(&self) -> u32 {
        self.kind.profile().power
    }

    pub fn travelled(&self) -> f64 {
        self.origin.distance(self.position)
    }
}

/// An ammunition pack, either lying on the field or equipped by one tank.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub kind: RoundKind,
    pub position: Point,
    pub rounds: u32,
}

impl Resource {
    /// A fresh pack carrying the kind's full starting round count.
    pub fn fresh(id: ResourceId, kind: RoundKind, position: Point) -> Self {
        Self {
            id,
            kind,
            position,
            rounds: kind.profile().starting_rounds,
        }
    }

    /// Spends one round; returns the rounds left. Never goes below zero.
    pub fn unload(&mut self) -> u32 {
        self.rounds = self.rounds.saturating_sub(1);
        self.rounds
    }
}
