#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Traffic spawning and movement for Farm Defence.
//!
//! Entities spawn on a random edge cell at the configured request rate, walk
//! the A* route toward the grid centre and leak once the route is exhausted.
//! Services wear them down through [`TrafficSimulation::apply_damage`].

use std::collections::VecDeque;

use farm_defence_core::{
    Event, GridCoord, RandomEventKind, TrafficId, TrafficKind, TrafficMix, TrafficSnapshot,
};
use farm_defence_grid::{SpatialGrid, TrafficIndex};
use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use slotmap::SlotMap;
use tracing::debug;

/// Distance under which a waypoint counts as reached.
const WAYPOINT_EPSILON: f32 = 0.1;
/// World units travelled per second at speed factor one.
const SPEED_SCALE: f32 = 2.0;

/// Configuration parameters required to construct the traffic simulation.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    rps: f64,
    mix: TrafficMix,
    rng_seed: u64,
}

impl Config {
    /// Creates a configuration from a starting rate, mix and seed.
    #[must_use]
    pub const fn new(rps: f64, mix: TrafficMix, rng_seed: u64) -> Self {
        Self { rps, mix, rng_seed }
    }
}

#[derive(Clone, Debug)]
struct TrafficEntity {
    kind: TrafficKind,
    position: Vec3,
    path: VecDeque<Vec3>,
    health: f32,
    max_health: f32,
    speed: f32,
    reward: f64,
    leak_damage: f64,
}

impl TrafficEntity {
    /// Moves toward the next waypoint. Returns `true` once the route is empty.
    fn step(&mut self, dt: f64) -> bool {
        let Some(&waypoint) = self.path.front() else {
            return true;
        };
        let offset = waypoint - self.position;
        let distance = offset.length();
        if distance < WAYPOINT_EPSILON {
            let _ = self.path.pop_front();
            return false;
        }
        let step = self.speed * dt as f32 * SPEED_SCALE;
        self.position += offset / distance * step.min(distance);
        false
    }
}

/// Temporary modifier installed by a random event.
#[derive(Clone, Copy, Debug)]
struct Modifier {
    magnitude: f64,
    ends_at: f64,
}

/// Owns every traffic entity and the spawn schedule.
#[derive(Debug)]
pub struct TrafficSimulation {
    entities: SlotMap<TrafficId, TrafficEntity>,
    spawn_timer: f64,
    base_rps: f64,
    base_mix: TrafficMix,
    surge: Option<Modifier>,
    ddos: Option<Modifier>,
    clock: f64,
    rng: ChaCha8Rng,
    spawned_total: u64,
}

impl TrafficSimulation {
    /// Creates an empty simulation.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            entities: SlotMap::with_key(),
            spawn_timer: 0.0,
            base_rps: config.rps,
            base_mix: config.mix,
            surge: None,
            ddos: None,
            clock: 0.0,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            spawned_total: 0,
        }
    }

    /// Advances the simulation: expires event modifiers, spawns new traffic
    /// and moves every entity along its route.
    pub fn update(&mut self, dt: f64, grid: &SpatialGrid, out: &mut Vec<Event>) {
        if !(dt > 0.0) {
            return;
        }
        self.clock += dt;
        self.expire_modifiers();
        let _ = self.spawn_tick(dt, grid, out);
        self.advance(dt, out);
    }

    /// Accumulates `dt` and spawns one entity per elapsed spawn interval.
    ///
    /// Returns the number of entities spawned. A non-positive or non-finite
    /// rate spawns nothing and leaves the accumulator untouched.
    pub fn spawn_tick(&mut self, dt: f64, grid: &SpatialGrid, out: &mut Vec<Event>) -> usize {
        let rps = self.rps();
        if !(rps > 0.0 && rps.is_finite()) || grid.cells().is_empty() {
            return 0;
        }

        let interval = 1.0 / rps;
        self.spawn_timer += dt;
        let mut spawned = 0;
        while self.spawn_timer >= interval {
            self.spawn_timer -= interval;
            self.spawn(grid, out);
            spawned += 1;
        }
        spawned
    }

    /// Moves every entity toward its next waypoint and leaks the ones whose
    /// route is exhausted.
    pub fn advance(&mut self, dt: f64, out: &mut Vec<Event>) {
        let ids: Vec<TrafficId> = self.entities.keys().collect();
        for id in ids {
            let exhausted = match self.entities.get_mut(id) {
                Some(entity) => entity.step(dt),
                None => continue,
            };
            if !exhausted {
                continue;
            }
            if let Some(leaked) = self.entities.remove(id) {
                debug!(kind = leaked.kind.id(), damage = leaked.leak_damage, "traffic leaked");
                out.push(Event::TrafficLeaked {
                    traffic: id,
                    kind: leaked.kind,
                    damage: leaked.leak_damage,
                });
            }
        }
    }

    /// Subtracts health from an entity. Returns `true` when the hit destroyed
    /// it; unknown or stale identifiers return `false`.
    pub fn apply_damage(&mut self, id: TrafficId, amount: f32, out: &mut Vec<Event>) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };
        entity.health -= amount;
        if entity.health > 0.0 {
            return false;
        }

        if let Some(processed) = self.entities.remove(id) {
            out.push(Event::TrafficProcessed {
                traffic: id,
                kind: processed.kind,
                reward: processed.reward,
            });
        }
        true
    }

    /// Consumes wave and random event notifications.
    pub fn handle(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::WaveStarted { rps, mix, .. } => {
                    self.base_rps = *rps;
                    self.base_mix = *mix;
                }
                Event::EventTriggered {
                    event,
                    duration_secs,
                } => {
                    let modifier = Modifier {
                        magnitude: event.definition().magnitude,
                        ends_at: self.clock + duration_secs,
                    };
                    match event {
                        RandomEventKind::TrafficSurge => self.surge = Some(modifier),
                        RandomEventKind::DdosAttack => self.ddos = Some(modifier),
                        RandomEventKind::ServiceDegradation | RandomEventKind::BudgetBonus => {}
                    }
                }
                Event::EventEnded { event } => match event {
                    RandomEventKind::TrafficSurge => self.surge = None,
                    RandomEventKind::DdosAttack => self.ddos = None,
                    RandomEventKind::ServiceDegradation | RandomEventKind::BudgetBonus => {}
                },
                _ => {}
            }
        }
    }

    /// Replaces the base spawn rate. Existing entities are unaffected.
    pub fn set_rps(&mut self, rps: f64) {
        self.base_rps = rps;
    }

    /// Replaces the base mix. Existing entities are unaffected.
    pub fn set_mix(&mut self, mix: TrafficMix) {
        self.base_mix = mix;
    }

    /// Spawn rate including an active surge.
    #[must_use]
    pub fn rps(&self) -> f64 {
        match self.surge {
            Some(surge) => self.base_rps * surge.magnitude,
            None => self.base_rps,
        }
    }

    /// Spawn rate without event modifiers.
    #[must_use]
    pub fn base_rps(&self) -> f64 {
        self.base_rps
    }

    /// Mix used for the next spawn, including an active DDoS override.
    #[must_use]
    pub fn mix(&self) -> TrafficMix {
        match self.ddos {
            Some(ddos) => self.base_mix.overriding_malicious(ddos.magnitude),
            None => self.base_mix,
        }
    }

    /// Mix without event modifiers.
    #[must_use]
    pub fn base_mix(&self) -> TrafficMix {
        self.base_mix
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether no entity is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities spawned since construction.
    #[must_use]
    pub fn spawned_total(&self) -> u64 {
        self.spawned_total
    }

    /// Snapshot of a single entity.
    #[must_use]
    pub fn get(&self, id: TrafficId) -> Option<TrafficSnapshot> {
        self.entities.get(id).map(|entity| snapshot(id, entity))
    }

    /// Snapshots of every live entity in slot order.
    #[must_use]
    pub fn snapshots(&self) -> Vec<TrafficSnapshot> {
        self.entities
            .iter()
            .map(|(id, entity)| snapshot(id, entity))
            .collect()
    }

    /// Buckets live entities by grid cell for service range queries.
    #[must_use]
    pub fn index(&self, grid: &SpatialGrid) -> TrafficIndex {
        let mut index = TrafficIndex::new();
        for (id, entity) in &self.entities {
            index.insert(grid, id, entity.position);
        }
        index
    }

    /// Removes every entity without emitting events.
    pub fn clear(&mut self) {
        self.entities.clear();
    }

    fn expire_modifiers(&mut self) {
        let clock = self.clock;
        if self.surge.is_some_and(|surge| clock >= surge.ends_at) {
            self.surge = None;
        }
        if self.ddos.is_some_and(|ddos| clock >= ddos.ends_at) {
            self.ddos = None;
        }
    }

    fn spawn(&mut self, grid: &SpatialGrid, out: &mut Vec<Event>) {
        let kind = self.mix().select(self.rng.gen::<f64>());
        let start = self.edge_cell(grid);
        let path: VecDeque<Vec3> = grid.find_path(start, grid.center()).into();
        let position = path
            .front()
            .copied()
            .unwrap_or_else(|| grid.grid_to_world(start));
        let profile = kind.profile();

        let traffic = self.entities.insert(TrafficEntity {
            kind,
            position,
            path,
            health: profile.health,
            max_health: profile.health,
            speed: profile.speed,
            reward: profile.reward,
            leak_damage: profile.leak_damage,
        });
        self.spawned_total += 1;
        out.push(Event::TrafficSpawned {
            traffic,
            kind,
            position,
        });
    }

    fn edge_cell(&mut self, grid: &SpatialGrid) -> GridCoord {
        let columns = grid.columns() as i32;
        let rows = grid.rows() as i32;
        match self.rng.gen_range(0..4) {
            0 => GridCoord::new(self.rng.gen_range(0..columns), 0),
            1 => GridCoord::new(columns - 1, self.rng.gen_range(0..rows)),
            2 => GridCoord::new(self.rng.gen_range(0..columns), rows - 1),
            _ => GridCoord::new(0, self.rng.gen_range(0..rows)),
        }
    }
}

fn snapshot(id: TrafficId, entity: &TrafficEntity) -> TrafficSnapshot {
    TrafficSnapshot {
        id,
        kind: entity.kind,
        position: entity.position,
        health: entity.health,
        max_health: entity.max_health,
        remaining_waypoints: entity.path.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulation(rps: f64) -> TrafficSimulation {
        TrafficSimulation::new(Config::new(rps, TrafficMix::default(), 7))
    }

    #[test]
    fn zero_rate_never_accumulates() {
        let grid = SpatialGrid::new(4, 4, 1.0);
        let mut traffic = simulation(0.0);
        let mut events = Vec::new();

        assert_eq!(traffic.spawn_tick(100.0, &grid, &mut events), 0);
        traffic.set_rps(1.0);
        assert_eq!(traffic.spawn_tick(0.5, &grid, &mut events), 0);
        assert!(events.is_empty());
    }

    #[test]
    fn spawned_entities_start_on_the_edge() {
        let grid = SpatialGrid::new(8, 8, 1.0);
        let mut traffic = simulation(4.0);
        let mut events = Vec::new();

        assert_eq!(traffic.spawn_tick(1.0, &grid, &mut events), 4);

        for snapshot in traffic.snapshots() {
            let coord = grid.world_to_grid(snapshot.position);
            let on_edge = coord.x() == 0 || coord.z() == 0 || coord.x() == 7 || coord.z() == 7;
            assert!(on_edge, "{coord:?} is not an edge cell");
            assert_eq!(snapshot.health, snapshot.kind.profile().health);
        }
    }

    #[test]
    fn surge_expires_at_its_deadline() {
        let grid = SpatialGrid::new(4, 4, 1.0);
        let mut traffic = simulation(0.0);
        traffic.set_rps(3.0);
        traffic.handle(&[Event::EventTriggered {
            event: RandomEventKind::TrafficSurge,
            duration_secs: 15.0,
        }]);
        assert_eq!(traffic.rps(), 6.0);

        let mut events = Vec::new();
        traffic.update(14.0, &grid, &mut events);
        assert_eq!(traffic.rps(), 6.0);
        traffic.update(1.0, &grid, &mut events);
        assert_eq!(traffic.rps(), 3.0);
    }

    #[test]
    fn ddos_overrides_and_restores_malicious_share() {
        let mut traffic = simulation(0.0);
        traffic.handle(&[Event::EventTriggered {
            event: RandomEventKind::DdosAttack,
            duration_secs: 10.0,
        }]);
        assert!((traffic.mix().malicious - 0.8).abs() < 1e-12);

        traffic.handle(&[Event::EventEnded {
            event: RandomEventKind::DdosAttack,
        }]);
        assert_eq!(traffic.mix(), TrafficMix::default());
    }
}
