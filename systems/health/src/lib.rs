#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Service health bookkeeping and degradation for Farm Defence.

use farm_defence_core::{Event, RandomEventKind, ServiceId};
use slotmap::SecondaryMap;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug)]
struct Record {
    health: f32,
    max_health: f32,
}

/// Multiplier on the degradation rate held until its event ends.
#[derive(Clone, Copy, Debug)]
struct Boost {
    event: RandomEventKind,
    factor: f32,
}

/// Decays the health of every registered service and reports failures.
///
/// Event boosts multiply the base rate instead of overwriting it, so the
/// rate returns to exactly the base value once every boost has ended. Boosts
/// last until the matching [`Event::EventEnded`]; the event scheduler owns
/// their lifetime.
#[derive(Debug)]
pub struct HealthTracker {
    records: SecondaryMap<ServiceId, Record>,
    base_rate: f32,
    boosts: Vec<Boost>,
}

impl HealthTracker {
    /// Creates a tracker decaying at `base_rate` health per second.
    #[must_use]
    pub fn new(base_rate: f32) -> Self {
        Self {
            records: SecondaryMap::new(),
            base_rate,
            boosts: Vec::new(),
        }
    }

    /// Starts tracking a service at full health.
    pub fn register(&mut self, service: ServiceId, max_health: f32) {
        let _ = self.records.insert(
            service,
            Record {
                health: max_health,
                max_health,
            },
        );
    }

    /// Stops tracking a service. Returns `false` when it was not tracked.
    pub fn unregister(&mut self, service: ServiceId) -> bool {
        self.records.remove(service).is_some()
    }

    /// Decays every service and emits [`Event::ServiceFailed`] for services
    /// that reached zero health.
    pub fn update(&mut self, dt: f64, out: &mut Vec<Event>) {
        if !(dt > 0.0) {
            return;
        }
        let decay = self.degradation_rate() * dt as f32;
        let mut failed = Vec::new();
        for (service, record) in &mut self.records {
            record.health = (record.health - decay).max(0.0);
            if record.health <= 0.0 {
                failed.push(service);
            }
        }

        for service in failed {
            let _ = self.records.remove(service);
            info!(?service, "service failed from degradation");
            out.push(Event::ServiceFailed { service });
        }
    }

    /// Restores health, clamped to the maximum. Returns `false` for unknown
    /// services.
    pub fn repair(&mut self, service: ServiceId, amount: f32) -> bool {
        let Some(record) = self.records.get_mut(service) else {
            return false;
        };
        record.health = (record.health + amount.max(0.0)).min(record.max_health);
        debug!(health = record.health, "service repaired");
        true
    }

    /// Current health of a service.
    #[must_use]
    pub fn health(&self, service: ServiceId) -> Option<f32> {
        self.records.get(service).map(|record| record.health)
    }

    /// Current health as a percentage of the maximum.
    #[must_use]
    pub fn health_percentage(&self, service: ServiceId) -> Option<f32> {
        self.records.get(service).map(|record| {
            if record.max_health > 0.0 {
                record.health / record.max_health * 100.0
            } else {
                0.0
            }
        })
    }

    /// Services whose health percentage is below `threshold_percent`.
    #[must_use]
    pub fn needing_repair(&self, threshold_percent: f32) -> Vec<ServiceId> {
        self.records
            .keys()
            .filter(|service| {
                self.health_percentage(*service)
                    .is_some_and(|percent| percent < threshold_percent)
            })
            .collect()
    }

    /// Degradation rate including active boosts.
    #[must_use]
    pub fn degradation_rate(&self) -> f32 {
        self.boosts
            .iter()
            .fold(self.base_rate, |rate, boost| rate * boost.factor)
    }

    /// Degradation rate without boosts.
    #[must_use]
    pub const fn base_rate(&self) -> f32 {
        self.base_rate
    }

    /// Number of tracked services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no service is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Tracks placements, upgrades, failures and degradation events.
    pub fn handle(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::ServicePlaced { service, kind, .. } => {
                    self.register(*service, kind.level(1).health);
                }
                Event::ServiceUpgraded {
                    service,
                    kind,
                    new_level,
                } => {
                    if self.records.contains_key(*service) {
                        self.register(*service, kind.level(*new_level).health);
                    }
                }
                Event::ServiceFailed { service } => {
                    let _ = self.unregister(*service);
                }
                Event::EventTriggered {
                    event: RandomEventKind::ServiceDegradation,
                    ..
                } => {
                    let definition = RandomEventKind::ServiceDegradation.definition();
                    self.boosts.push(Boost {
                        event: RandomEventKind::ServiceDegradation,
                        factor: definition.magnitude as f32,
                    });
                }
                Event::EventEnded { event } => {
                    self.boosts.retain(|boost| boost.event != *event);
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn ids(count: usize) -> Vec<ServiceId> {
        let mut arena: SlotMap<ServiceId, ()> = SlotMap::with_key();
        (0..count).map(|_| arena.insert(())).collect()
    }

    #[test]
    fn repair_clamps_to_maximum() {
        let id = ids(1)[0];
        let mut tracker = HealthTracker::new(1.0);
        tracker.register(id, 50.0);
        let mut out = Vec::new();
        tracker.update(20.0, &mut out);
        assert_eq!(tracker.health(id), Some(30.0));

        assert!(tracker.repair(id, 5.0));
        assert_eq!(tracker.health(id), Some(35.0));
        assert!(tracker.repair(id, 500.0));
        assert_eq!(tracker.health(id), Some(50.0));
        assert!(out.is_empty());
    }

    #[test]
    fn unknown_services_cannot_be_repaired() {
        let id = ids(1)[0];
        let mut tracker = HealthTracker::new(1.0);
        assert!(!tracker.repair(id, 5.0));
        assert_eq!(tracker.health_percentage(id), None);
    }

    #[test]
    fn needing_repair_uses_percentage_threshold() {
        let services = ids(2);
        let mut tracker = HealthTracker::new(1.0);
        tracker.register(services[0], 10.0);
        tracker.register(services[1], 100.0);
        let mut out = Vec::new();
        tracker.update(6.0, &mut out);

        assert_eq!(tracker.health_percentage(services[0]), Some(40.0));
        assert_eq!(tracker.needing_repair(50.0), vec![services[0]]);
    }
}
