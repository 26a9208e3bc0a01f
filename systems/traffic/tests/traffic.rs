use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use farm_defence_core::{Event, TrafficMix};
use farm_defence_grid::SpatialGrid;
use farm_defence_system_traffic::{Config, TrafficSimulation};

fn count_spawns(rps: f64, seconds: f64, dt: f64) -> usize {
    let grid = SpatialGrid::new(20, 20, 2.0);
    let mut traffic = TrafficSimulation::new(Config::new(rps, TrafficMix::default(), 11));
    let steps = (seconds / dt).round() as usize;
    let mut spawned = 0;
    for _ in 0..steps {
        let mut events = Vec::new();
        traffic.update(dt, &grid, &mut events);
        spawned += events
            .iter()
            .filter(|event| matches!(event, Event::TrafficSpawned { .. }))
            .count();
    }
    spawned
}

#[test]
fn spawn_rate_is_independent_of_frame_rate() {
    let expected = (10.0_f64 * 7.0).floor() as usize;
    for dt in [1.0 / 30.0, 1.0 / 144.0] {
        let spawned = count_spawns(7.0, 10.0, dt);
        assert!(
            spawned.abs_diff(expected) <= 1,
            "dt {dt}: spawned {spawned}, expected {expected}"
        );
    }
}

#[test]
fn unbounded_rate_spawns_nothing() {
    let grid = SpatialGrid::new(20, 20, 2.0);
    let mut traffic = TrafficSimulation::new(Config::new(f64::INFINITY, TrafficMix::default(), 1));
    let mut events = Vec::new();
    assert_eq!(traffic.spawn_tick(0.5, &grid, &mut events), 0);
    assert!(events.is_empty());
    assert!(traffic.is_empty());
}

#[test]
fn traffic_leaks_once_route_is_exhausted() {
    let grid = SpatialGrid::new(3, 3, 1.0);
    let mut traffic = TrafficSimulation::new(Config::new(1.0, TrafficMix::default(), 3));
    let mut events = Vec::new();
    traffic.update(1.0, &grid, &mut events);
    traffic.set_rps(0.0);
    assert_eq!(traffic.len(), 1);

    for _ in 0..200 {
        traffic.update(0.1, &grid, &mut events);
    }

    let spawned: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            Event::TrafficSpawned { traffic, kind, .. } => Some((*traffic, *kind)),
            _ => None,
        })
        .collect();
    let leaked: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            Event::TrafficLeaked {
                traffic,
                kind,
                damage,
            } => Some((*traffic, *kind, *damage)),
            _ => None,
        })
        .collect();

    assert_eq!(spawned.len(), 1);
    assert_eq!(leaked.len(), 1);
    let (id, kind) = spawned[0];
    assert_eq!(leaked[0], (id, kind, kind.profile().leak_damage));
    assert!(traffic.is_empty());
    assert!(traffic.get(id).is_none());
}

#[test]
fn lethal_damage_processes_entity_once() {
    let grid = SpatialGrid::new(20, 20, 2.0);
    let mut traffic = TrafficSimulation::new(Config::new(1.0, TrafficMix::default(), 5));
    let mut events = Vec::new();
    assert_eq!(traffic.spawn_tick(1.0, &grid, &mut events), 1);
    let Some(Event::TrafficSpawned { traffic: id, kind, .. }) = events.pop() else {
        panic!("expected a spawn event");
    };

    let mut out = Vec::new();
    assert!(!traffic.apply_damage(id, 1.0, &mut out));
    let remaining = traffic.get(id).expect("entity alive").health;
    assert_eq!(remaining, kind.profile().health - 1.0);

    assert!(traffic.apply_damage(id, remaining, &mut out));
    assert!(!traffic.apply_damage(id, 100.0, &mut out));

    assert_eq!(
        out,
        vec![Event::TrafficProcessed {
            traffic: id,
            kind,
            reward: kind.profile().reward,
        }]
    );
}

#[test]
fn wave_start_replaces_rate_and_mix_for_later_spawns() {
    let mut traffic = TrafficSimulation::new(Config::new(1.0, TrafficMix::default(), 5));
    let mix = TrafficMix::with_malicious_share(1.0);
    traffic.handle(&[Event::WaveStarted {
        wave: 2,
        rps: 4.0,
        mix,
    }]);
    assert_eq!(traffic.rps(), 4.0);

    let grid = SpatialGrid::new(20, 20, 2.0);
    let mut events = Vec::new();
    assert_eq!(traffic.spawn_tick(1.0, &grid, &mut events), 4);
    assert!(traffic
        .snapshots()
        .iter()
        .all(|snapshot| snapshot.kind == farm_defence_core::TrafficKind::Malicious));
}

#[test]
fn identical_seeds_replay_identically() {
    assert_eq!(replay(21), replay(21));
}

fn replay(seed: u64) -> u64 {
    let grid = SpatialGrid::new(20, 20, 2.0);
    let mut traffic = TrafficSimulation::new(Config::new(6.0, TrafficMix::escalating(0.0), seed));
    let mut hasher = DefaultHasher::new();
    for _ in 0..600 {
        let mut events = Vec::new();
        traffic.update(1.0 / 60.0, &grid, &mut events);
        events.len().hash(&mut hasher);
    }
    for snapshot in traffic.snapshots() {
        snapshot.kind.hash(&mut hasher);
        snapshot.position.x.to_bits().hash(&mut hasher);
        snapshot.position.z.to_bits().hash(&mut hasher);
        snapshot.remaining_waypoints.hash(&mut hasher);
    }
    hasher.finish()
}
