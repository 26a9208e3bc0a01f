//! Random event scheduling and lifecycle.

use farm_defence_core::{Event, EventScheduleConfig, RandomEventKind, RANDOM_EVENTS};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

#[derive(Clone, Copy, Debug)]
struct ActiveEvent {
    kind: RandomEventKind,
    ends_at: f64,
}

/// Draws random events from the catalogue and retires them on a logical
/// clock. At most one event is active; the countdown to the next draw pauses
/// while one is.
#[derive(Debug)]
pub struct RandomEvents {
    enabled: bool,
    min_interval_secs: f64,
    max_interval_secs: f64,
    until_check: f64,
    clock: f64,
    active: Option<ActiveEvent>,
    rng: ChaCha8Rng,
}

impl RandomEvents {
    /// Creates a scheduler. Disabled schedulers never draw on their own but
    /// still retire forced events.
    #[must_use]
    pub fn new(schedule: &EventScheduleConfig, enabled: bool, rng_seed: u64) -> Self {
        Self {
            enabled,
            min_interval_secs: schedule.min_interval_secs,
            max_interval_secs: schedule.max_interval_secs.max(schedule.min_interval_secs),
            until_check: schedule.first_check_secs,
            clock: 0.0,
            active: None,
            rng: ChaCha8Rng::seed_from_u64(rng_seed),
        }
    }

    /// Advances the clock, ends an expired event and draws a new one when the
    /// countdown elapses.
    pub fn update(&mut self, dt: f64, out: &mut Vec<Event>) {
        if !(dt > 0.0) {
            return;
        }
        self.clock += dt;

        if let Some(active) = self.active {
            if self.clock < active.ends_at {
                return;
            }
            self.active = None;
            info!(event = active.kind.id(), "random event ended");
            out.push(Event::EventEnded { event: active.kind });
        }

        if !self.enabled {
            return;
        }

        self.until_check -= dt;
        if self.until_check > 0.0 {
            return;
        }

        let candidates = candidates(self.active());
        let kind = candidates[self.rng.gen_range(0..candidates.len())];
        self.activate(kind, out);
        self.until_check = self
            .rng
            .gen_range(self.min_interval_secs..=self.max_interval_secs);
    }

    /// Activates `kind` immediately, ending the active event first.
    pub fn force(&mut self, kind: RandomEventKind, out: &mut Vec<Event>) {
        if let Some(active) = self.active.take() {
            out.push(Event::EventEnded { event: active.kind });
        }
        self.activate(kind, out);
    }

    /// Currently active event.
    #[must_use]
    pub fn active(&self) -> Option<RandomEventKind> {
        self.active.map(|active| active.kind)
    }

    /// Seconds until the active event ends.
    #[must_use]
    pub fn remaining_secs(&self) -> Option<f64> {
        self.active
            .map(|active| (active.ends_at - self.clock).max(0.0))
    }

    /// Seconds of unpaused countdown left before the next draw.
    #[must_use]
    pub fn until_next_check(&self) -> f64 {
        self.until_check.max(0.0)
    }

    fn activate(&mut self, kind: RandomEventKind, out: &mut Vec<Event>) {
        let definition = kind.definition();
        info!(
            event = kind.id(),
            duration = definition.duration_secs,
            "random event triggered"
        );
        out.push(Event::EventTriggered {
            event: kind,
            duration_secs: definition.duration_secs,
        });

        if definition.duration_secs > 0.0 {
            self.active = Some(ActiveEvent {
                kind,
                ends_at: self.clock + definition.duration_secs,
            });
        } else {
            out.push(Event::EventEnded { event: kind });
        }
    }
}

/// Catalogue entries eligible for the next draw: all but the active one.
fn candidates(active: Option<RandomEventKind>) -> Vec<RandomEventKind> {
    RANDOM_EVENTS
        .iter()
        .map(|event| event.kind)
        .filter(|kind| Some(*kind) != active)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_active_event_is_excluded() {
        assert_eq!(candidates(None).len(), 4);
        let without_surge = candidates(Some(RandomEventKind::TrafficSurge));
        assert_eq!(
            without_surge,
            vec![
                RandomEventKind::DdosAttack,
                RandomEventKind::ServiceDegradation,
                RandomEventKind::BudgetBonus,
            ]
        );
    }

    #[test]
    fn bonus_ends_in_the_tick_it_starts() {
        let mut events = RandomEvents::new(&EventScheduleConfig::default(), false, 1);
        let mut out = Vec::new();
        events.force(RandomEventKind::BudgetBonus, &mut out);

        assert_eq!(events.active(), None);
        assert_eq!(
            out,
            vec![
                Event::EventTriggered {
                    event: RandomEventKind::BudgetBonus,
                    duration_secs: 0.0,
                },
                Event::EventEnded {
                    event: RandomEventKind::BudgetBonus,
                },
            ]
        );
    }

    #[test]
    fn countdown_pauses_while_an_event_is_active() {
        let mut events = RandomEvents::new(&EventScheduleConfig::default(), true, 1);
        let mut out = Vec::new();
        events.update(10.0, &mut out);
        assert_eq!(events.until_next_check(), 20.0);

        events.force(RandomEventKind::TrafficSurge, &mut out);
        events.update(5.0, &mut out);
        assert_eq!(events.until_next_check(), 20.0);

        events.update(10.0, &mut out);
        assert_eq!(events.active(), None);
        assert_eq!(events.until_next_check(), 10.0);
    }

    #[test]
    fn forcing_replaces_the_active_event() {
        let mut events = RandomEvents::new(&EventScheduleConfig::default(), false, 1);
        let mut out = Vec::new();
        events.force(RandomEventKind::TrafficSurge, &mut out);
        out.clear();

        events.force(RandomEventKind::DdosAttack, &mut out);

        assert_eq!(events.active(), Some(RandomEventKind::DdosAttack));
        assert_eq!(events.remaining_secs(), Some(10.0));
        assert_eq!(
            out.first(),
            Some(&Event::EventEnded {
                event: RandomEventKind::TrafficSurge
            })
        );
    }
}
