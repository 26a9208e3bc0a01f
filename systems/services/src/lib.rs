#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Placed services: placement, upgrades and attack resolution.

use farm_defence_core::{
    Event, GridCoord, PlacementError, RemovalError, ServiceId, ServiceKind, ServiceSnapshot,
    TrafficId, UpgradeError,
};
use farm_defence_grid::{SpatialGrid, TrafficIndex};
use glam::Vec3;
use slotmap::SlotMap;
use tracing::{debug, info};

/// Damage a service deals to one target during an attack.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Attack {
    /// Attacking service.
    pub service: ServiceId,
    /// Traffic hit by the attack.
    pub target: TrafficId,
    /// Damage dealt.
    pub damage: f32,
}

#[derive(Clone, Debug)]
struct ServiceEntity {
    kind: ServiceKind,
    coord: GridCoord,
    position: Vec3,
    level: u8,
    health: f32,
    max_health: f32,
    range: f32,
    damage: f32,
    attack_rate: f32,
    upkeep: f64,
    last_attack_ms: Option<f64>,
    targets: Vec<TrafficId>,
}

impl ServiceEntity {
    fn apply_level(&mut self) {
        let stats = self.kind.level(self.level);
        self.range = stats.range;
        self.damage = stats.damage;
        self.attack_rate = stats.attack_rate;
        self.upkeep = stats.upkeep;
        self.max_health = stats.health;
        self.health = stats.health;
    }

    fn is_ready(&self, now_ms: f64) -> bool {
        if !(self.attack_rate > 0.0) {
            return false;
        }
        let cooldown_ms = 1000.0 / f64::from(self.attack_rate);
        self.last_attack_ms
            .map_or(true, |last| now_ms - last >= cooldown_ms)
    }
}

/// Owns every placed service and is the only writer of grid occupancy.
#[derive(Debug, Default)]
pub struct ServiceSimulation {
    services: SlotMap<ServiceId, ServiceEntity>,
}

impl ServiceSimulation {
    /// Creates a simulation without services.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a level-one service on the cell containing `position`.
    ///
    /// Affordability is not checked here; the economy debits the build cost
    /// when it observes the emitted [`Event::ServicePlaced`].
    pub fn place(
        &mut self,
        grid: &mut SpatialGrid,
        position: Vec3,
        kind: ServiceKind,
        out: &mut Vec<Event>,
    ) -> Result<ServiceId, PlacementError> {
        let coord = grid.world_to_grid(position);
        if !grid.contains(coord) {
            return Err(PlacementError::OutOfBounds);
        }
        if !grid.is_valid_placement(coord) {
            return Err(PlacementError::Occupied);
        }

        let centre = grid.grid_to_world(coord);
        let mut entity = ServiceEntity {
            kind,
            coord,
            position: centre,
            level: 1,
            health: 0.0,
            max_health: 0.0,
            range: 0.0,
            damage: 0.0,
            attack_rate: 0.0,
            upkeep: 0.0,
            last_attack_ms: None,
            targets: Vec::new(),
        };
        entity.apply_level();
        let service = self.services.insert(entity);

        if !grid.occupy_cell(coord, service) {
            let _ = self.services.remove(service);
            return Err(PlacementError::Occupied);
        }

        info!(kind = kind.id(), x = coord.x(), z = coord.z(), "service placed");
        out.push(Event::ServicePlaced {
            service,
            kind,
            coord,
            position: centre,
        });
        Ok(service)
    }

    /// Raises a service by one level and recomputes its stats from the level
    /// table. Returns the new level.
    pub fn upgrade(&mut self, service: ServiceId, out: &mut Vec<Event>) -> Result<u8, UpgradeError> {
        let entity = self
            .services
            .get_mut(service)
            .ok_or(UpgradeError::MissingService)?;
        if entity.level >= entity.kind.max_level() {
            debug!(kind = entity.kind.id(), "upgrade rejected at max level");
            return Err(UpgradeError::MaxLevelReached);
        }

        entity.level += 1;
        entity.apply_level();
        info!(kind = entity.kind.id(), level = entity.level, "service upgraded");
        out.push(Event::ServiceUpgraded {
            service,
            kind: entity.kind,
            new_level: entity.level,
        });
        Ok(entity.level)
    }

    /// Cost of the next upgrade, or `None` when the service is missing or
    /// already at its highest level.
    #[must_use]
    pub fn upgrade_cost(&self, service: ServiceId) -> Option<f64> {
        let entity = self.services.get(service)?;
        if entity.level >= entity.kind.max_level() {
            return None;
        }
        Some(entity.kind.level(entity.level + 1).cost)
    }

    /// Removes a service, frees its cell and emits [`Event::ServiceFailed`].
    pub fn remove(
        &mut self,
        grid: &mut SpatialGrid,
        service: ServiceId,
        out: &mut Vec<Event>,
    ) -> Result<(), RemovalError> {
        if !self.retire(grid, service) {
            return Err(RemovalError::MissingService);
        }
        out.push(Event::ServiceFailed { service });
        Ok(())
    }

    /// Drops a service that already failed and frees its cell.
    ///
    /// Returns `false` when the service is unknown.
    pub fn retire(&mut self, grid: &mut SpatialGrid, service: ServiceId) -> bool {
        let Some(entity) = self.services.remove(service) else {
            return false;
        };
        grid.free_cell(entity.coord);
        info!(kind = entity.kind.id(), x = entity.coord.x(), z = entity.coord.z(), "service removed");
        true
    }

    /// Resolves attacks for every service whose cooldown elapsed at `now_ms`.
    ///
    /// Every service refreshes its targets to the traffic in range this tick.
    /// A ready service hits all of them at once and resets its cooldown only
    /// when it found at least one target.
    pub fn tick(
        &mut self,
        now_ms: f64,
        grid: &SpatialGrid,
        traffic: &TrafficIndex,
        out: &mut Vec<Attack>,
    ) {
        for (service, entity) in &mut self.services {
            entity.targets = traffic.in_range(grid, entity.position, entity.range);
            if entity.targets.is_empty() || !entity.is_ready(now_ms) {
                continue;
            }

            entity.last_attack_ms = Some(now_ms);
            out.extend(entity.targets.iter().map(|&target| Attack {
                service,
                target,
                damage: entity.damage,
            }));
        }
    }

    /// Mirrors health values owned by the health tracker onto the services.
    pub fn sync_health<F>(&mut self, mut health: F)
    where
        F: FnMut(ServiceId) -> Option<f32>,
    {
        for (service, entity) in &mut self.services {
            if let Some(value) = health(service) {
                entity.health = value.clamp(0.0, entity.max_health);
            }
        }
    }

    /// Sum of the upkeep of every live service.
    #[must_use]
    pub fn total_upkeep(&self) -> f64 {
        self.services.values().map(|entity| entity.upkeep).sum()
    }

    /// Whether the service is alive.
    #[must_use]
    pub fn contains(&self, service: ServiceId) -> bool {
        self.services.contains_key(service)
    }

    /// Number of live services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether no service is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Snapshot of a single service.
    #[must_use]
    pub fn get(&self, service: ServiceId) -> Option<ServiceSnapshot> {
        self.services
            .get(service)
            .map(|entity| snapshot(service, entity))
    }

    /// Snapshots of every live service in slot order.
    #[must_use]
    pub fn snapshots(&self) -> Vec<ServiceSnapshot> {
        self.services
            .iter()
            .map(|(service, entity)| snapshot(service, entity))
            .collect()
    }

    /// Removes every service and frees the cells without emitting events.
    pub fn clear(&mut self, grid: &mut SpatialGrid) {
        for (_, entity) in self.services.drain() {
            grid.free_cell(entity.coord);
        }
    }
}

fn snapshot(id: ServiceId, entity: &ServiceEntity) -> ServiceSnapshot {
    ServiceSnapshot {
        id,
        kind: entity.kind,
        coord: entity.coord,
        position: entity.position,
        level: entity.level,
        health: entity.health,
        max_health: entity.max_health,
        range: entity.range,
        targets: entity.targets.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_reports_rejection_reason() {
        let mut grid = SpatialGrid::new(4, 4, 1.0);
        let mut services = ServiceSimulation::new();
        let mut events = Vec::new();

        let inside = Vec3::new(0.5, 0.0, 0.5);
        assert!(services
            .place(&mut grid, inside, ServiceKind::Cache, &mut events)
            .is_ok());
        assert_eq!(
            services.place(&mut grid, inside, ServiceKind::Cdn, &mut events),
            Err(PlacementError::Occupied)
        );
        assert_eq!(
            services.place(&mut grid, Vec3::new(9.0, 0.0, 0.0), ServiceKind::Cdn, &mut events),
            Err(PlacementError::OutOfBounds)
        );
        assert_eq!(events.len(), 1);
        assert_eq!(services.len(), 1);
    }

    #[test]
    fn upgrade_cost_follows_level_table() {
        let mut grid = SpatialGrid::new(4, 4, 1.0);
        let mut services = ServiceSimulation::new();
        let mut events = Vec::new();
        let id = services
            .place(&mut grid, Vec3::ZERO, ServiceKind::Database, &mut events)
            .expect("placement");

        assert_eq!(
            services.upgrade_cost(id),
            Some(ServiceKind::Database.level(2).cost)
        );
        assert_eq!(services.upgrade(id, &mut events), Ok(2));
        assert_eq!(services.upgrade(id, &mut events), Ok(3));
        assert_eq!(services.upgrade_cost(id), None);
        assert_eq!(
            services.upgrade(id, &mut events),
            Err(UpgradeError::MaxLevelReached)
        );
    }

    #[test]
    fn removal_frees_cell_once() {
        let mut grid = SpatialGrid::new(4, 4, 1.0);
        let mut services = ServiceSimulation::new();
        let mut events = Vec::new();
        let id = services
            .place(&mut grid, Vec3::ZERO, ServiceKind::Firewall, &mut events)
            .expect("placement");
        events.clear();

        assert_eq!(services.remove(&mut grid, id, &mut events), Ok(()));
        assert_eq!(
            services.remove(&mut grid, id, &mut events),
            Err(RemovalError::MissingService)
        );
        assert_eq!(events, vec![Event::ServiceFailed { service: id }]);
        assert_eq!(grid.occupied_count(), 0);
        assert!(grid.invariant_holds());
    }
}
