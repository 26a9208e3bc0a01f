use farm_defence_core::{Event, GridCoord, RandomEventKind, ServiceId, ServiceKind};
use farm_defence_system_health::HealthTracker;
use slotmap::SlotMap;

fn service() -> ServiceId {
    let mut arena: SlotMap<ServiceId, ()> = SlotMap::with_key();
    arena.insert(())
}

fn tick(tracker: &mut HealthTracker, seconds: u32) -> Vec<Event> {
    let mut out = Vec::new();
    for _ in 0..seconds {
        tracker.update(1.0, &mut out);
    }
    out
}

#[test]
fn degradation_boost_lasts_until_event_ends() {
    let mut tracker = HealthTracker::new(0.1);
    tracker.register(service(), 100.0);
    tracker.handle(&[Event::EventTriggered {
        event: RandomEventKind::ServiceDegradation,
        duration_secs: 20.0,
    }]);

    let _ = tick(&mut tracker, 25);
    assert_eq!(tracker.degradation_rate(), 0.2);

    tracker.handle(&[Event::EventEnded {
        event: RandomEventKind::ServiceDegradation,
    }]);
    assert_eq!(tracker.degradation_rate(), 0.1);
    assert_eq!(tracker.degradation_rate(), tracker.base_rate());
}

#[test]
fn overlapping_degradation_restores_base_rate() {
    let mut tracker = HealthTracker::new(0.1);
    let triggered = Event::EventTriggered {
        event: RandomEventKind::ServiceDegradation,
        duration_secs: 20.0,
    };
    tracker.handle(&[triggered.clone()]);
    let _ = tick(&mut tracker, 5);
    tracker.handle(&[triggered]);
    assert_eq!(tracker.degradation_rate(), 0.4);

    tracker.handle(&[Event::EventEnded {
        event: RandomEventKind::ServiceDegradation,
    }]);
    assert_eq!(tracker.degradation_rate(), 0.1);
}

#[test]
fn exhausted_services_fail_once_and_unregister() {
    let id = service();
    let mut tracker = HealthTracker::new(10.0);
    tracker.register(id, 25.0);

    let events = tick(&mut tracker, 5);

    assert_eq!(events, vec![Event::ServiceFailed { service: id }]);
    assert!(tracker.is_empty());
    assert_eq!(tracker.health(id), None);
}

#[test]
fn placement_and_upgrade_set_level_health() {
    let id = service();
    let mut tracker = HealthTracker::new(1.0);
    tracker.handle(&[Event::ServicePlaced {
        service: id,
        kind: ServiceKind::Database,
        coord: GridCoord::new(1, 1),
        position: Default::default(),
    }]);
    assert_eq!(tracker.health(id), Some(ServiceKind::Database.level(1).health));

    let _ = tick(&mut tracker, 3);
    tracker.handle(&[Event::ServiceUpgraded {
        service: id,
        kind: ServiceKind::Database,
        new_level: 2,
    }]);
    assert_eq!(tracker.health(id), Some(ServiceKind::Database.level(2).health));
    assert_eq!(tracker.health_percentage(id), Some(100.0));

    tracker.handle(&[Event::ServiceFailed { service: id }]);
    assert!(tracker.is_empty());
}
