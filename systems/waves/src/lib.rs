#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Time-driven wave escalation and random events for Farm Defence.

mod events;

pub use events::RandomEvents;

use farm_defence_core::{Event, EventScheduleConfig, RandomEventKind, TrafficMix};
use tracing::info;

/// RPS multiplier at the start of a session.
const RAMP_START: f64 = 1.3;
/// RPS multiplier gained per elapsed minute.
const RAMP_PER_MINUTE: f64 = 0.3;
/// Highest RPS multiplier.
const RAMP_CAP: f64 = 4.0;

/// Requests per second prescribed by the survival schedule at `game_time_secs`.
#[must_use]
pub fn rps_at(base_rps: f64, game_time_secs: f64) -> f64 {
    let multiplier = (RAMP_START + game_time_secs / 60.0 * RAMP_PER_MINUTE).min(RAMP_CAP);
    (base_rps * multiplier).floor()
}

/// One-based wave number at `game_time_secs`.
#[must_use]
pub fn wave_for(game_time_secs: f64, wave_length_secs: f64) -> u32 {
    (game_time_secs.max(0.0) / wave_length_secs).floor() as u32 + 1
}

/// Traffic schedule followed by the director.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Schedule {
    /// Rate and malicious share ramp up with elapsed time.
    Escalating {
        /// Base requests per second scaled by the ramp.
        base_rps: f64,
    },
    /// Rate and mix are held at player-chosen values.
    Fixed {
        /// Requests per second.
        rps: f64,
        /// Traffic mix.
        mix: TrafficMix,
    },
}

/// Configuration parameters required to construct the director.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    schedule: Schedule,
    wave_length_secs: f64,
    events: EventScheduleConfig,
    events_enabled: bool,
    rng_seed: u64,
}

impl Config {
    /// Creates a director configuration.
    #[must_use]
    pub const fn new(
        schedule: Schedule,
        wave_length_secs: f64,
        events: EventScheduleConfig,
        events_enabled: bool,
        rng_seed: u64,
    ) -> Self {
        Self {
            schedule,
            wave_length_secs,
            events,
            events_enabled,
            rng_seed,
        }
    }
}

/// Tracks game time, announces waves and runs the random event scheduler.
#[derive(Debug)]
pub struct WaveDirector {
    schedule: Schedule,
    wave_length_secs: f64,
    game_time_secs: f64,
    wave: u32,
    random_events: RandomEvents,
}

impl WaveDirector {
    /// Creates a director that has not announced any wave yet.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            schedule: config.schedule,
            wave_length_secs: config.wave_length_secs,
            game_time_secs: 0.0,
            wave: 0,
            random_events: RandomEvents::new(
                &config.events,
                config.events_enabled,
                config.rng_seed,
            ),
        }
    }

    /// Advances game time. Emits [`Event::WaveStarted`] on the first update
    /// and at every wave boundary, then lets the random event scheduler run.
    pub fn update(&mut self, dt: f64, out: &mut Vec<Event>) {
        if !(dt > 0.0) {
            return;
        }
        self.game_time_secs += dt;

        let wave = wave_for(self.game_time_secs, self.wave_length_secs);
        if wave > self.wave {
            self.wave = wave;
            let (rps, mix) = self.traffic_at(self.game_time_secs);
            info!(wave, rps, malicious = mix.malicious, "wave started");
            out.push(Event::WaveStarted { wave, rps, mix });
        }

        self.random_events.update(dt, out);
    }

    /// Rate and mix the schedule prescribes at `game_time_secs`.
    #[must_use]
    pub fn traffic_at(&self, game_time_secs: f64) -> (f64, TrafficMix) {
        match self.schedule {
            Schedule::Escalating { base_rps } => (
                rps_at(base_rps, game_time_secs),
                TrafficMix::escalating(game_time_secs),
            ),
            Schedule::Fixed { rps, mix } => (rps, mix),
        }
    }

    /// Keeps a fixed schedule in step with a player override so later waves
    /// do not revert it. Escalating schedules are unaffected.
    pub fn hold_rps(&mut self, held: f64) {
        if let Schedule::Fixed { rps, .. } = &mut self.schedule {
            *rps = held;
        }
    }

    /// Mix counterpart of [`WaveDirector::hold_rps`].
    pub fn hold_mix(&mut self, held: TrafficMix) {
        if let Schedule::Fixed { mix, .. } = &mut self.schedule {
            *mix = held;
        }
    }

    /// Activates a random event immediately.
    pub fn force_event(&mut self, kind: RandomEventKind, out: &mut Vec<Event>) {
        self.random_events.force(kind, out);
    }

    /// Last announced wave, zero before the first update.
    #[must_use]
    pub const fn current_wave(&self) -> u32 {
        self.wave
    }

    /// Elapsed game time in seconds.
    #[must_use]
    pub const fn game_time_secs(&self) -> f64 {
        self.game_time_secs
    }

    /// Schedule in effect.
    #[must_use]
    pub const fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// Currently active random event.
    #[must_use]
    pub fn active_event(&self) -> Option<RandomEventKind> {
        self.random_events.active()
    }
}
