#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Budget, reputation, scoring and upkeep for Farm Defence.
//!
//! The ledger is the only owner of the economy state. Other systems never
//! mutate it directly: placements, upgrades, processed and leaked traffic and
//! budget bonuses reach it as [`Event`] values through [`EconomyLedger::handle`].

use farm_defence_core::{
    Event, GameMode, GameOverReason, ModePreset, RandomEventKind, Resources, Stats, TrafficKind,
};
use tracing::debug;

/// Configuration parameters required to construct the ledger.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    mode: GameMode,
    starting_budget: f64,
    upkeep_interval_secs: f64,
    upkeep_enabled: bool,
}

impl Config {
    /// Creates a ledger configuration.
    #[must_use]
    pub const fn new(
        mode: GameMode,
        starting_budget: f64,
        upkeep_interval_secs: f64,
        upkeep_enabled: bool,
    ) -> Self {
        Self {
            mode,
            starting_budget,
            upkeep_interval_secs,
            upkeep_enabled,
        }
    }
}

/// Economy state and the rules that mutate it.
#[derive(Clone, Debug)]
pub struct EconomyLedger {
    mode: GameMode,
    preset: ModePreset,
    budget: f64,
    reputation: f64,
    stats: Stats,
    upkeep_interval_secs: f64,
    upkeep_enabled: bool,
    upkeep_timer: f64,
    game_over_latched: bool,
}

impl EconomyLedger {
    /// Creates a ledger seeded with the mode preset.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let preset = config.mode.preset();
        Self {
            mode: config.mode,
            preset,
            budget: config.starting_budget,
            reputation: preset.starting_reputation,
            stats: Stats::default(),
            upkeep_interval_secs: config.upkeep_interval_secs,
            upkeep_enabled: config.upkeep_enabled,
            upkeep_timer: 0.0,
            game_over_latched: false,
        }
    }

    /// Credits the budget.
    pub fn add_funds(&mut self, amount: f64, out: &mut Vec<Event>) {
        self.shift_budget(amount, out);
    }

    /// Debits the budget when it covers `amount`. Returns `false` and leaves
    /// the budget untouched otherwise.
    pub fn spend_funds(&mut self, amount: f64, out: &mut Vec<Event>) -> bool {
        if !self.can_afford(amount) {
            return false;
        }
        self.shift_budget(-amount, out);
        true
    }

    /// Debits the budget unconditionally; it may become negative.
    pub fn charge(&mut self, amount: f64, out: &mut Vec<Event>) {
        self.shift_budget(-amount, out);
    }

    /// Overrides the budget.
    pub fn set_budget(&mut self, budget: f64, out: &mut Vec<Event>) {
        let delta = budget - self.budget;
        self.budget = budget;
        out.push(Event::BudgetChanged {
            new_budget: budget,
            delta,
        });
    }

    /// Whether the budget covers `amount`.
    #[must_use]
    pub fn can_afford(&self, amount: f64) -> bool {
        self.budget >= amount
    }

    /// Raises reputation, clamped to the preset ceiling.
    pub fn add_reputation(&mut self, amount: f64, out: &mut Vec<Event>) {
        self.reputation = (self.reputation + amount).clamp(0.0, self.preset.max_reputation);
        out.push(Event::ReputationChanged {
            new_reputation: self.reputation,
            delta: amount,
        });
    }

    /// Lowers reputation, clamped at zero.
    pub fn lose_reputation(&mut self, amount: f64, out: &mut Vec<Event>) {
        self.add_reputation(-amount, out);
    }

    /// Condition that currently ends the session, if any. Sandbox sessions
    /// never end.
    #[must_use]
    pub fn evaluate_game_over(&self) -> Option<GameOverReason> {
        if self.mode != GameMode::Survival {
            return None;
        }
        if self.reputation <= 0.0 {
            return Some(GameOverReason::Reputation);
        }
        match self.preset.bankruptcy_floor {
            Some(floor) if self.budget < floor => Some(GameOverReason::Bankruptcy),
            _ => None,
        }
    }

    /// Final score: ten-second play intervals, ten points per processed
    /// request, fifty per blocked attack and the non-negative budget.
    #[must_use]
    pub fn score(&self) -> u64 {
        let time = (self.stats.play_time_secs / 10.0).floor().max(0.0) as u64;
        let budget = self.budget.max(0.0).floor() as u64;
        time + self.stats.requests_processed * 10 + self.stats.attacks_blocked * 50 + budget
    }

    /// Advances play time, debits upkeep for every elapsed interval and
    /// reports a new game-over breach.
    pub fn update(&mut self, dt: f64, upkeep_total: f64, out: &mut Vec<Event>) {
        if dt > 0.0 {
            self.stats.play_time_secs += dt;
            if self.upkeep_enabled && self.upkeep_interval_secs > 0.0 {
                self.upkeep_timer += dt;
                while self.upkeep_timer >= self.upkeep_interval_secs {
                    self.upkeep_timer -= self.upkeep_interval_secs;
                    if upkeep_total > 0.0 {
                        debug!(amount = upkeep_total, "upkeep charged");
                        self.charge(upkeep_total, out);
                    }
                }
            }
        }
        self.check_game_over(out);
    }

    /// Emits [`Event::GameOver`] once per breach; recovering re-arms it.
    pub fn check_game_over(&mut self, out: &mut Vec<Event>) {
        match self.evaluate_game_over() {
            Some(reason) if !self.game_over_latched => {
                self.game_over_latched = true;
                out.push(Event::GameOver {
                    reason,
                    score: self.score(),
                });
            }
            Some(_) => {}
            None => self.game_over_latched = false,
        }
    }

    /// Applies the economic consequences of simulation events.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Event>) {
        for event in events {
            match event {
                Event::TrafficProcessed { kind, reward, .. } => {
                    self.stats.requests_processed += 1;
                    if *kind == TrafficKind::Malicious {
                        self.stats.attacks_blocked += 1;
                    }
                    self.add_funds(*reward, out);
                }
                Event::TrafficLeaked { damage, .. } => self.lose_reputation(*damage, out),
                Event::ServicePlaced { kind, .. } => {
                    self.stats.services_built += 1;
                    self.charge(kind.build_cost(), out);
                }
                Event::ServiceUpgraded {
                    kind, new_level, ..
                } => self.charge(kind.level(*new_level).cost, out),
                Event::EventTriggered {
                    event: RandomEventKind::BudgetBonus,
                    ..
                } => self.add_funds(RandomEventKind::BudgetBonus.definition().magnitude, out),
                _ => {}
            }
        }
    }

    /// Rules preset of the session.
    #[must_use]
    pub const fn mode(&self) -> GameMode {
        self.mode
    }

    /// Current budget.
    #[must_use]
    pub const fn budget(&self) -> f64 {
        self.budget
    }

    /// Current reputation.
    #[must_use]
    pub const fn reputation(&self) -> f64 {
        self.reputation
    }

    /// Budget and reputation together.
    #[must_use]
    pub const fn resources(&self) -> Resources {
        Resources {
            budget: self.budget,
            reputation: self.reputation,
        }
    }

    /// Session counters.
    #[must_use]
    pub const fn stats(&self) -> Stats {
        self.stats
    }

    fn shift_budget(&mut self, delta: f64, out: &mut Vec<Event>) {
        self.budget += delta;
        out.push(Event::BudgetChanged {
            new_budget: self.budget,
            delta,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn survival() -> EconomyLedger {
        EconomyLedger::new(Config::new(GameMode::Survival, 500.0, 10.0, true))
    }

    #[test]
    fn reputation_is_clamped() {
        let mut ledger = survival();
        let mut out = Vec::new();

        ledger.lose_reputation(150.0, &mut out);
        assert_eq!(ledger.reputation(), 0.0);

        ledger.add_reputation(90.0, &mut out);
        ledger.add_reputation(50.0, &mut out);
        assert_eq!(ledger.reputation(), 100.0);
    }

    #[test]
    fn spend_fails_without_mutation() {
        let mut ledger = survival();
        let mut out = Vec::new();

        assert!(!ledger.spend_funds(500.01, &mut out));
        assert_eq!(ledger.budget(), 500.0);
        assert!(out.is_empty());

        assert!(ledger.spend_funds(500.0, &mut out));
        assert_eq!(ledger.budget(), 0.0);
        assert_eq!(
            out,
            vec![Event::BudgetChanged {
                new_budget: 0.0,
                delta: -500.0
            }]
        );
    }

    #[test]
    fn set_budget_reports_delta() {
        let mut ledger = survival();
        let mut out = Vec::new();
        ledger.set_budget(1_250.0, &mut out);
        assert_eq!(
            out,
            vec![Event::BudgetChanged {
                new_budget: 1_250.0,
                delta: 750.0
            }]
        );
    }

    #[test]
    fn score_combines_time_counters_and_budget() {
        let mut ledger = survival();
        let mut out = Vec::new();
        ledger.update(25.0, 0.0, &mut out);
        ledger.stats.requests_processed = 4;
        ledger.stats.attacks_blocked = 1;
        ledger.set_budget(99.9, &mut out);

        assert_eq!(ledger.score(), 2 + 40 + 50 + 99);

        ledger.set_budget(-300.0, &mut out);
        assert_eq!(ledger.score(), 2 + 40 + 50);
    }

    #[test]
    fn upkeep_charges_once_per_interval() {
        let mut ledger = survival();
        let mut out = Vec::new();

        ledger.update(9.5, 12.0, &mut out);
        assert_eq!(ledger.budget(), 500.0);

        ledger.update(21.0, 12.0, &mut out);
        assert_eq!(ledger.budget(), 500.0 - 36.0);
    }

    #[test]
    fn disabled_upkeep_is_free() {
        let mut ledger = EconomyLedger::new(Config::new(GameMode::Sandbox, 10_000.0, 10.0, false));
        let mut out = Vec::new();
        ledger.update(100.0, 50.0, &mut out);
        assert_eq!(ledger.budget(), 10_000.0);
        assert!(out.is_empty());
    }
}
