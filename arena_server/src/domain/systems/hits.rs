use crate::domain::entities::{Shot, TankId};
use crate::domain::registry::EntityRegistry;
use crate::domain::tuning::FieldTuning;
use tracing::{debug, info};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct HitOutcome {
    /// Tanks destroyed by this shot, in id order.
    pub destroyed: Vec<TankId>,
    /// Whether the shot left the registry (hit something or was spent).
    pub shot_removed: bool,
}

/// Resolves a shot that just moved against every tank.
///
/// Every active tank other than the owner is checked; the scan does not stop at
/// the first hit, so a shot passing between two tanks can destroy both. A hit
/// forces the tank's health to zero regardless of the round's power.
pub fn resolve_shot(registry: &mut EntityRegistry, shot_id: &str, hit_radius: f64) -> HitOutcome {
    let Some(shot) = registry.shot(shot_id) else {
        return HitOutcome::default();
    };
    let owner = shot.owner.clone();
    let position = shot.position;
    let power = shot.power();

    let mut destroyed = Vec::new();
    for tank_id in registry.tanks().ids() {
        if tank_id == owner {
            continue;
        }
        let Some(tank) = registry.tank_mut(&tank_id) else {
            continue;
        };
        if !tank.is_active() {
            continue;
        }

        let dist = position.distance(tank.position);
        if dist < hit_radius {
            tank.destroy();
            info!(
                victim_id = %tank_id,
                shooter_id = %owner,
                shot_id,
                power,
                dist,
                "tank hit"
            );
            destroyed.push(tank_id);
        }
    }

    let shot_removed = !destroyed.is_empty() && registry.remove_shot(shot_id).is_some();
    HitOutcome {
        destroyed,
        shot_removed,
    }
}

/// A shot is spent once it has flown past its kind's range or left the field.
pub fn is_spent(shot: &Shot, field: &FieldTuning) -> bool {
    shot.travelled() >= shot.kind.profile().range || !field.contains(shot.position)
}

/// Drops a spent shot from the registry. Returns true if it was removed.
pub fn retire_if_spent(
    registry: &mut EntityRegistry,
    shot_id: &str,
    field: &FieldTuning,
) -> bool {
    let spent = registry
        .shot(shot_id)
        .is_some_and(|shot| is_spent(shot, field));
    if spent {
        registry.remove_shot(shot_id);
        debug!(shot_id, "shot spent");
    }
    spent
}
