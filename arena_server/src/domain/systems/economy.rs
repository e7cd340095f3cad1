// Resource economy: pickups, swaps, drops and round consumption.

use crate::domain::entities::{Point, Resource, ResourceId, RoundKind, TankId};
use crate::domain::registry::EntityRegistry;
use crate::domain::spatial::SpatialGrid;
use crate::domain::tuning::FieldTuning;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum EconomyEvent {
    PickedUp {
        tank_id: TankId,
        resource_id: ResourceId,
    },
    // The resource as it now lies on the field.
    Dropped(Resource),
}

/// A drop reported by a client: which pack, where it landed and what it carried.
#[derive(Debug, Clone, PartialEq)]
pub struct DropReport {
    pub resource_id: ResourceId,
    pub kind: RoundKind,
    pub position: Point,
    pub rounds: u32,
}

/// Picks up every field resource within pickup radius of a tank that just moved.
///
/// The grid is rebuilt from the field before the query and only the tank's own
/// bucket is searched. Candidates are gathered before any transfer so a pack
/// ejected during this call cannot be picked straight back up.
pub fn collect_nearby(
    registry: &mut EntityRegistry,
    grid: &mut SpatialGrid<ResourceId>,
    tank_id: &str,
    field: &FieldTuning,
) -> Vec<EconomyEvent> {
    let Some(tank) = registry.tank(tank_id) else {
        return Vec::new();
    };
    if !tank.is_active() {
        return Vec::new();
    }
    let position = tank.position;

    grid.rebuild(
        registry
            .resources()
            .sorted()
            .into_iter()
            .map(|(id, resource)| (*id, resource.position)),
    );
    let in_reach: Vec<ResourceId> = grid
        .query(position)
        .iter()
        .filter(|entry| entry.position.distance(position) < field.pickup_radius)
        .map(|entry| entry.id)
        .collect();

    in_reach
        .into_iter()
        .flat_map(|resource_id| transfer(registry, tank_id, resource_id, field))
        .collect()
}

/// Moves a field resource into a tank's equipped slot.
///
/// If the tank was already holding something, that pack is ejected behind the
/// tank and goes back onto the field. Unknown tank or resource ids do nothing.
pub fn transfer(
    registry: &mut EntityRegistry,
    tank_id: &str,
    resource_id: ResourceId,
    field: &FieldTuning,
) -> Vec<EconomyEvent> {
    let Some(tank) = registry.tank(tank_id) else {
        debug!(tank_id, resource_id, "pickup for unknown tank ignored");
        return Vec::new();
    };
    let (position, heading) = (tank.position, tank.heading);

    let Some(resource) = registry.take_resource(resource_id) else {
        debug!(tank_id, resource_id, "pickup of resource not on field ignored");
        return Vec::new();
    };

    let previous = match registry.tank_mut(tank_id) {
        Some(tank) => tank.equip(resource),
        None => return Vec::new(),
    };
    info!(tank_id, resource_id, "resource picked up");

    let mut events = vec![EconomyEvent::PickedUp {
        tank_id: tank_id.to_string(),
        resource_id,
    }];

    if let Some(mut old) = previous {
        old.position = field.clamp(position.behind(heading, field.eject_offset));
        info!(tank_id, resource_id = old.id, "resource ejected");
        events.push(EconomyEvent::Dropped(old.clone()));
        registry.upsert_resource(old);
    }

    events
}

/// Handles a voluntary drop reported by a client.
///
/// A held pack is unequipped and laid at the reported spot with the server's
/// round count. A pack nobody knows about is created from the report. A pack
/// already on the field is left alone.
pub fn drop_resource(
    registry: &mut EntityRegistry,
    report: DropReport,
    field: &FieldTuning,
) -> Option<EconomyEvent> {
    let id = report.resource_id;
    if registry.resource(id).is_some() {
        debug!(resource_id = id, "drop of resource already on field ignored");
        return None;
    }

    let position = field.clamp(report.position);
    let resource = match registry.holder_of(id).cloned() {
        Some(holder) => {
            let mut held = registry.tank_mut(&holder)?.equipped.take()?;
            held.position = position;
            info!(tank_id = %holder, resource_id = id, "resource dropped");
            held
        }
        None => {
            info!(resource_id = id, "new resource placed");
            Resource {
                id,
                kind: report.kind,
                position,
                rounds: report.rounds,
            }
        }
    };

    registry.upsert_resource(resource.clone());
    Some(EconomyEvent::Dropped(resource))
}

/// Spends one round from the tank's equipped pack. Returns what is left, or
/// `None` when the tank is unknown or unarmed.
pub fn consume_round(registry: &mut EntityRegistry, tank_id: &str) -> Option<u32> {
    let pack = registry.tank_mut(tank_id)?.equipped.as_mut()?;
    Some(pack.unload())
}
