//! Gameplay tuning for the shared battlefield.
//!
//! Keep this separate from runtime/server configuration (ports, channel sizes, etc.).
use crate::domain::entities::{Point, Resource, ResourceId, RoundKind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldTuning {
    /// Field width in pixels.
    pub width: f64,

    /// Field height in pixels.
    pub height: f64,

    /// Side length of one spatial grid cell in pixels.
    pub cell_size: f64,

    /// A shot closer than this to a tank destroys it.
    pub hit_radius: f64,

    /// A tank closer than this to a field resource picks it up.
    pub pickup_radius: f64,

    /// How far behind a tank a swapped-out resource lands.
    pub eject_offset: f64,
}

impl Default for FieldTuning {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            cell_size: 80.0,
            hit_radius: 20.0,
            pickup_radius: 10.0,
            eject_offset: 30.0,
        }
    }
}

impl FieldTuning {
    pub fn contains(&self, p: Point) -> bool {
        (0.0..=self.width).contains(&p.x) && (0.0..=self.height).contains(&p.y)
    }

    /// Pulls a point back inside the field edges.
    pub fn clamp(&self, p: Point) -> Point {
        Point::new(p.x.clamp(0.0, self.width), p.y.clamp(0.0, self.height))
    }
}

/// Pickups planted whenever the world is initialised.
pub const SEED_RESOURCES: [(ResourceId, RoundKind, f64, f64); 5] = [
    (1, RoundKind::Rapid, 200.0, 200.0),
    (2, RoundKind::Split, 600.0, 150.0),
    (3, RoundKind::Ballistic, 400.0, 300.0),
    (4, RoundKind::Rapid, 150.0, 480.0),
    (5, RoundKind::Split, 650.0, 450.0),
];

pub fn seed_resources() -> impl Iterator<Item = Resource> {
    SEED_RESOURCES
        .into_iter()
        .map(|(id, kind, x, y)| Resource::fresh(id, kind, Point::new(x, y)))
}
