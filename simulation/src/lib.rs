#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Session orchestration for Farm Defence.
//!
//! [`Game`] owns the grid, every system and the [`EventBus`]. Systems never
//! call each other: each stage of [`Game::update`] writes events into an
//! outbox, the game routes the batch to the systems that react to it and then
//! publishes it to bus subscribers. Follow-up events produced while routing
//! are delivered as the next batch, so subscribers observe events in emission
//! order.

use farm_defence_core::{
    Command, CommandError, ConfigError, Event, EventBus, GameConfig, GameMode, GameOverReason,
    PlacementError, RandomEventKind, RemovalError, Resources, ServiceId, ServiceKind,
    ServiceSnapshot, Stats, SubscriptionId, Topic, TrafficMix, TrafficSnapshot, UpgradeError,
};
use farm_defence_grid::SpatialGrid;
use farm_defence_system_economy::{self as economy, EconomyLedger};
use farm_defence_system_health::HealthTracker;
use farm_defence_system_services::{Attack, ServiceSimulation};
use farm_defence_system_traffic::{self as traffic, TrafficSimulation};
use farm_defence_system_waves::{self as waves, rps_at, Schedule, WaveDirector};
use glam::Vec3;
use tracing::{debug, info};

/// Health percentage below which a service is reported as needing repair.
pub const REPAIR_THRESHOLD_PERCENT: f32 = 50.0;

const WAVE_STREAM_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Terminal result of a survival session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outcome {
    /// Condition that ended the session.
    pub reason: GameOverReason,
    /// Score at the moment the session ended.
    pub score: u64,
}

struct Components {
    grid: SpatialGrid,
    traffic: TrafficSimulation,
    services: ServiceSimulation,
    economy: EconomyLedger,
    waves: WaveDirector,
    health: HealthTracker,
}

impl Components {
    fn build(config: &GameConfig) -> Self {
        let (rps, mix, schedule, starting_budget, upkeep_enabled, events_enabled) =
            match config.mode {
                GameMode::Survival => (
                    rps_at(config.base_rps, 0.0),
                    TrafficMix::escalating(0.0),
                    Schedule::Escalating {
                        base_rps: config.base_rps,
                    },
                    config.mode.preset().starting_budget,
                    true,
                    true,
                ),
                GameMode::Sandbox => {
                    let sandbox = &config.sandbox;
                    (
                        sandbox.traffic_rps,
                        sandbox.traffic_mix,
                        Schedule::Fixed {
                            rps: sandbox.traffic_rps,
                            mix: sandbox.traffic_mix,
                        },
                        sandbox.starting_budget,
                        sandbox.enable_upkeep,
                        sandbox.enable_events,
                    )
                }
            };

        Self {
            grid: SpatialGrid::from_config(&config.grid),
            traffic: TrafficSimulation::new(traffic::Config::new(rps, mix, config.seed)),
            services: ServiceSimulation::new(),
            economy: EconomyLedger::new(economy::Config::new(
                config.mode,
                starting_budget,
                config.upkeep_interval_secs,
                upkeep_enabled,
            )),
            waves: WaveDirector::new(waves::Config::new(
                schedule,
                config.wave_length_secs,
                config.events,
                events_enabled,
                config.seed ^ WAVE_STREAM_SALT,
            )),
            health: HealthTracker::new(config.degradation_rate),
        }
    }
}

/// A running Farm Defence session.
#[derive(Debug)]
pub struct Game {
    config: GameConfig,
    grid: SpatialGrid,
    traffic: TrafficSimulation,
    services: ServiceSimulation,
    economy: EconomyLedger,
    waves: WaveDirector,
    health: HealthTracker,
    bus: EventBus,
    clock_ms: f64,
    paused: bool,
    outcome: Option<Outcome>,
    pending: Vec<Event>,
    attacks: Vec<Attack>,
}

impl Game {
    /// Validates `config` and starts a session at time zero.
    pub fn new(config: GameConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let Components {
            grid,
            traffic,
            services,
            economy,
            waves,
            health,
        } = Components::build(&config);

        info!(
            mode = ?config.mode,
            columns = config.grid.columns,
            rows = config.grid.rows,
            seed = config.seed,
            "session started"
        );
        Ok(Self {
            config,
            grid,
            traffic,
            services,
            economy,
            waves,
            health,
            bus: EventBus::new(),
            clock_ms: 0.0,
            paused: false,
            outcome: None,
            pending: Vec::new(),
            attacks: Vec::new(),
        })
    }

    /// Advances the session by `dt` seconds.
    ///
    /// Stages run in a fixed order: traffic, services, economy, waves and
    /// random events, health. Events emitted by a stage are routed and
    /// published before the next stage runs. Paused or finished sessions and
    /// non-positive steps are ignored.
    pub fn update(&mut self, dt: f64) {
        if !self.is_running() || !(dt > 0.0) {
            return;
        }
        self.clock_ms += dt * 1000.0;

        self.traffic.update(dt, &self.grid, &mut self.pending);
        self.pump();

        let index = self.traffic.index(&self.grid);
        self.services
            .tick(self.clock_ms, &self.grid, &index, &mut self.attacks);
        for attack in self.attacks.drain(..) {
            let _ = self
                .traffic
                .apply_damage(attack.target, attack.damage, &mut self.pending);
        }
        self.pump();

        self.economy
            .update(dt, self.services.total_upkeep(), &mut self.pending);
        self.pump();
        if self.outcome.is_some() {
            return;
        }

        self.waves.update(dt, &mut self.pending);
        self.pump();

        self.health.update(dt, &mut self.pending);
        self.pump();
        self.sync_service_health();
    }

    /// Applies a player command.
    pub fn apply(&mut self, command: Command) -> Result<(), CommandError> {
        match command {
            Command::PlaceService { position, kind } => {
                let _ = self.place_service(position, kind)?;
            }
            Command::UpgradeService { service } => {
                let _ = self.upgrade_service(service)?;
            }
            Command::RemoveService { service } => self.remove_service(service)?,
            Command::RepairService { service, amount } => {
                if !self.repair_service(service, amount) {
                    return Err(CommandError::UnknownRepairTarget);
                }
            }
            Command::SetTrafficRps { rps } => self.set_traffic_rps(rps),
            Command::SetTrafficMix { mix } => self.set_traffic_mix(mix),
            Command::SetBudget { budget } => self.set_budget(budget),
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::Restart => self.restart(),
        }
        Ok(())
    }

    /// Builds a level-one service on the cell containing `position` and
    /// debits its build cost.
    pub fn place_service(
        &mut self,
        position: Vec3,
        kind: ServiceKind,
    ) -> Result<ServiceId, PlacementError> {
        if !self.is_running() {
            return Err(PlacementError::GameInactive);
        }
        let coord = self.grid.world_to_grid(position);
        if !self.grid.contains(coord) {
            debug!(kind = kind.id(), "placement rejected out of bounds");
            return Err(PlacementError::OutOfBounds);
        }
        if !self.grid.is_valid_placement(coord) {
            debug!(kind = kind.id(), "placement rejected on occupied cell");
            return Err(PlacementError::Occupied);
        }
        if !self.economy.can_afford(kind.build_cost()) {
            debug!(
                kind = kind.id(),
                budget = self.economy.budget(),
                "placement rejected for insufficient funds"
            );
            return Err(PlacementError::InsufficientFunds);
        }

        let service = self
            .services
            .place(&mut self.grid, position, kind, &mut self.pending)?;
        self.pump();
        Ok(service)
    }

    /// Raises a service by one level and debits the level cost. Returns the
    /// new level.
    pub fn upgrade_service(&mut self, service: ServiceId) -> Result<u8, UpgradeError> {
        if !self.is_running() {
            return Err(UpgradeError::GameInactive);
        }
        if !self.services.contains(service) {
            return Err(UpgradeError::MissingService);
        }
        let Some(cost) = self.services.upgrade_cost(service) else {
            debug!(?service, "upgrade rejected at max level");
            return Err(UpgradeError::MaxLevelReached);
        };
        if !self.economy.can_afford(cost) {
            debug!(?service, cost, "upgrade rejected for insufficient funds");
            return Err(UpgradeError::InsufficientFunds);
        }

        let level = self.services.upgrade(service, &mut self.pending)?;
        self.pump();
        self.sync_service_health();
        Ok(level)
    }

    /// Demolishes a service, freeing its cell. No refund is given.
    pub fn remove_service(&mut self, service: ServiceId) -> Result<(), RemovalError> {
        self.services
            .remove(&mut self.grid, service, &mut self.pending)?;
        self.pump();
        Ok(())
    }

    /// Restores health to a service free of charge, clamped to its maximum.
    /// Returns `false` when the service is unknown.
    pub fn repair_service(&mut self, service: ServiceId, amount: f32) -> bool {
        if !self.health.repair(service, amount) {
            return false;
        }
        self.sync_service_health();
        true
    }

    /// Overrides the base spawn rate. Sandbox sessions keep the override for
    /// later waves; survival waves replace it at the next boundary. Negative
    /// rates clamp to zero and non-finite rates are ignored.
    pub fn set_traffic_rps(&mut self, rps: f64) {
        if !rps.is_finite() {
            debug!(rps, "non-finite traffic rate ignored");
            return;
        }
        let rps = rps.max(0.0);
        self.traffic.set_rps(rps);
        self.waves.hold_rps(rps);
    }

    /// Overrides the base traffic mix. Mixes without a positive weight are
    /// ignored.
    pub fn set_traffic_mix(&mut self, mix: TrafficMix) {
        if !mix.has_positive_weight() {
            debug!("traffic mix without positive weight ignored");
            return;
        }
        self.traffic.set_mix(mix);
        self.waves.hold_mix(mix);
    }

    /// Overrides the budget.
    pub fn set_budget(&mut self, budget: f64) {
        self.economy.set_budget(budget, &mut self.pending);
        self.pump();
    }

    /// Activates a random event immediately, replacing the active one.
    pub fn trigger_event(&mut self, kind: RandomEventKind) {
        if !self.is_running() {
            return;
        }
        self.waves.force_event(kind, &mut self.pending);
        self.pump();
    }

    /// Freezes the session; updates and building commands are ignored until
    /// [`Game::resume`].
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            info!("session paused");
        }
    }

    /// Unfreezes a paused session.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            info!("session resumed");
        }
    }

    /// Discards the session state and starts over with the same
    /// configuration. Bus subscriptions survive.
    pub fn restart(&mut self) {
        let Components {
            grid,
            traffic,
            services,
            economy,
            waves,
            health,
        } = Components::build(&self.config);
        self.grid = grid;
        self.traffic = traffic;
        self.services = services;
        self.economy = economy;
        self.waves = waves;
        self.health = health;
        self.clock_ms = 0.0;
        self.paused = false;
        self.outcome = None;
        self.pending.clear();
        self.attacks.clear();
        info!(mode = ?self.config.mode, "session restarted");
    }

    /// Registers a handler for every event published under `topic`.
    pub fn subscribe<F>(&mut self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: FnMut(&Event) + 'static,
    {
        self.bus.subscribe(topic, handler)
    }

    /// Removes a handler. Returns `false` when it was already removed.
    pub fn unsubscribe(&mut self, subscription: SubscriptionId) -> bool {
        self.bus.unsubscribe(subscription)
    }

    /// Configuration the session was started with.
    #[must_use]
    pub const fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Rules preset of the session.
    #[must_use]
    pub const fn mode(&self) -> GameMode {
        self.config.mode
    }

    /// Spatial grid with current occupancy.
    #[must_use]
    pub const fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    /// Live traffic entities.
    #[must_use]
    pub fn traffic(&self) -> Vec<TrafficSnapshot> {
        self.traffic.snapshots()
    }

    /// Live services.
    #[must_use]
    pub fn services(&self) -> Vec<ServiceSnapshot> {
        self.services.snapshots()
    }

    /// A single live service.
    #[must_use]
    pub fn service(&self, service: ServiceId) -> Option<ServiceSnapshot> {
        self.services.get(service)
    }

    /// Cost of the next upgrade of a service.
    #[must_use]
    pub fn upgrade_cost(&self, service: ServiceId) -> Option<f64> {
        self.services.upgrade_cost(service)
    }

    /// Health of a service as a percentage of its maximum.
    #[must_use]
    pub fn health_percentage(&self, service: ServiceId) -> Option<f32> {
        self.health.health_percentage(service)
    }

    /// Services whose health fell below `threshold_percent`.
    #[must_use]
    pub fn services_needing_repair(&self, threshold_percent: f32) -> Vec<ServiceId> {
        self.health.needing_repair(threshold_percent)
    }

    /// Current service degradation rate in health per second.
    #[must_use]
    pub fn degradation_rate(&self) -> f32 {
        self.health.degradation_rate()
    }

    /// Budget and reputation.
    #[must_use]
    pub const fn resources(&self) -> Resources {
        self.economy.resources()
    }

    /// Session counters.
    #[must_use]
    pub const fn stats(&self) -> Stats {
        self.economy.stats()
    }

    /// Current score.
    #[must_use]
    pub fn score(&self) -> u64 {
        self.economy.score()
    }

    /// Effective spawn rate including event modifiers.
    #[must_use]
    pub fn traffic_rps(&self) -> f64 {
        self.traffic.rps()
    }

    /// Effective traffic mix including event modifiers.
    #[must_use]
    pub fn traffic_mix(&self) -> TrafficMix {
        self.traffic.mix()
    }

    /// Number of traffic entities spawned since the session started.
    #[must_use]
    pub fn traffic_spawned(&self) -> u64 {
        self.traffic.spawned_total()
    }

    /// Last announced wave.
    #[must_use]
    pub const fn wave(&self) -> u32 {
        self.waves.current_wave()
    }

    /// Elapsed unpaused game time in seconds.
    #[must_use]
    pub const fn game_time_secs(&self) -> f64 {
        self.waves.game_time_secs()
    }

    /// Currently active random event.
    #[must_use]
    pub fn active_event(&self) -> Option<RandomEventKind> {
        self.waves.active_event()
    }

    /// Whether the session is paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Terminal result once the session has ended.
    #[must_use]
    pub const fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Whether updates and building commands are accepted.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        !self.paused && self.outcome.is_none()
    }

    fn pump(&mut self) {
        while !self.pending.is_empty() {
            let batch = std::mem::take(&mut self.pending);
            let mut follow_up = Vec::new();
            self.route(&batch, &mut follow_up);
            for event in &batch {
                self.bus.publish(event);
            }
            self.pending = follow_up;
        }
    }

    fn route(&mut self, batch: &[Event], out: &mut Vec<Event>) {
        self.traffic.handle(batch);
        self.health.handle(batch);
        self.economy.handle(batch, out);

        for event in batch {
            match event {
                Event::ServiceFailed { service } => {
                    let _ = self.services.retire(&mut self.grid, *service);
                }
                Event::GameOver { reason, score } if self.outcome.is_none() => {
                    info!(?reason, score, "game over");
                    self.outcome = Some(Outcome {
                        reason: *reason,
                        score: *score,
                    });
                }
                _ => {}
            }
        }
    }

    fn sync_service_health(&mut self) {
        let health = &self.health;
        self.services.sync_health(|service| health.health(service));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_configuration_is_rejected() {
        let mut config = GameConfig::default();
        config.grid.columns = 0;
        assert!(matches!(
            Game::new(config),
            Err(ConfigError::EmptyGrid { columns: 0, .. })
        ));
    }

    #[test]
    fn modes_start_from_their_presets() {
        let survival = Game::new(GameConfig::for_mode(GameMode::Survival)).expect("survival");
        assert_eq!(survival.resources().budget, 500.0);
        assert_eq!(survival.traffic_rps(), 6.0);

        let sandbox = Game::new(GameConfig::for_mode(GameMode::Sandbox)).expect("sandbox");
        assert_eq!(sandbox.resources().budget, 10_000.0);
        assert_eq!(sandbox.traffic_rps(), 10.0);
        assert_eq!(sandbox.wave(), 0);
    }

    #[test]
    fn empty_mix_override_is_ignored() {
        let mut game = Game::new(GameConfig::for_mode(GameMode::Sandbox)).expect("sandbox");
        let before = game.traffic_mix();
        game.set_traffic_mix(TrafficMix {
            static_assets: 0.0,
            read: 0.0,
            write: 0.0,
            upload: 0.0,
            search: 0.0,
            malicious: 0.0,
        });
        assert_eq!(game.traffic_mix(), before);
    }

    #[test]
    fn non_finite_rate_override_is_ignored() {
        let mut game = Game::new(GameConfig::for_mode(GameMode::Sandbox)).expect("sandbox");
        game.set_traffic_rps(3.0);
        assert_eq!(game.apply(Command::SetTrafficRps { rps: f64::INFINITY }), Ok(()));
        game.set_traffic_rps(f64::NAN);
        assert_eq!(game.traffic_rps(), 3.0);

        game.update(0.1);
        assert_eq!(game.game_time_secs(), 0.1);
    }

    #[test]
    fn command_errors_carry_the_rejection() {
        let mut game = Game::new(GameConfig::for_mode(GameMode::Survival)).expect("survival");
        let far = Vec3::new(1_000.0, 0.0, 1_000.0);
        assert_eq!(
            game.apply(Command::PlaceService {
                position: far,
                kind: ServiceKind::Cache,
            }),
            Err(CommandError::Placement(PlacementError::OutOfBounds))
        );
        assert_eq!(
            game.apply(Command::RepairService {
                service: ServiceId::default(),
                amount: 10.0,
            }),
            Err(CommandError::UnknownRepairTarget)
        );
    }
}
