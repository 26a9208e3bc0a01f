use std::{fs, path::Path};

use anyhow::Context as _;
use farm_defence_core::{GameConfig, GridCoord, ServiceKind};
use farm_defence_simulation::Game;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Scenario used when no file is provided on the command line.
const BUILTIN: &str = include_str!("../scenarios/survival.toml");

/// Session configuration plus a timed list of player actions.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Scenario {
    /// Configuration the session starts with.
    pub(crate) game: GameConfig,
    /// Player actions in file order.
    pub(crate) orders: Vec<Order>,
}

impl Scenario {
    /// Parses a scenario from TOML text.
    pub(crate) fn parse(text: &str) -> Result<Self, ScenarioError> {
        let scenario: Self = toml::from_str(text)?;
        for (index, order) in scenario.orders.iter().enumerate() {
            let at_secs = order.at_secs();
            if !(at_secs >= 0.0) {
                return Err(ScenarioError::NegativeTime { index, at_secs });
            }
        }
        Ok(scenario)
    }

    /// Reads and parses a scenario file.
    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("failed to parse scenario {}", path.display()))
    }

    /// Opening build shipped with the binary.
    pub(crate) fn builtin() -> Result<Self, ScenarioError> {
        Self::parse(BUILTIN)
    }
}

/// Reasons a scenario file is rejected.
#[derive(Debug, Error)]
pub(crate) enum ScenarioError {
    /// The text is not a valid scenario document.
    #[error("invalid scenario document: {0}")]
    Syntax(#[from] toml::de::Error),
    /// An order is scheduled before the session starts.
    #[error("order {index} is scheduled at {at_secs} s")]
    NegativeTime {
        /// Position of the order in the file.
        index: usize,
        /// Offending time.
        at_secs: f64,
    },
}

/// Player action issued once game time reaches `at_secs`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub(crate) enum Order {
    /// Builds a service on a grid cell.
    Place {
        at_secs: f64,
        kind: ServiceKind,
        column: i32,
        row: i32,
    },
    /// Upgrades the service standing on a grid cell.
    Upgrade { at_secs: f64, column: i32, row: i32 },
    /// Repairs every service below a health percentage.
    Repair {
        at_secs: f64,
        threshold: f32,
        amount: f32,
    },
}

impl Order {
    /// Game time at which the order is issued.
    pub(crate) const fn at_secs(&self) -> f64 {
        match *self {
            Self::Place { at_secs, .. }
            | Self::Upgrade { at_secs, .. }
            | Self::Repair { at_secs, .. } => at_secs,
        }
    }

    /// Issues the order. Returns `false` when the game rejected it.
    pub(crate) fn execute(&self, game: &mut Game) -> bool {
        match *self {
            Self::Place {
                kind, column, row, ..
            } => {
                let position = game.grid().grid_to_world(GridCoord::new(column, row));
                match game.place_service(position, kind) {
                    Ok(service) => {
                        debug!(?service, kind = kind.id(), column, row, "build order placed");
                        true
                    }
                    Err(error) => {
                        warn!(%error, kind = kind.id(), column, row, "build order rejected");
                        false
                    }
                }
            }
            Self::Upgrade { column, row, .. } => {
                let occupant = game
                    .grid()
                    .cell(GridCoord::new(column, row))
                    .and_then(|cell| cell.occupant());
                let Some(service) = occupant else {
                    warn!(column, row, "upgrade order found no service");
                    return false;
                };
                match game.upgrade_service(service) {
                    Ok(level) => {
                        debug!(?service, level, "upgrade order applied");
                        true
                    }
                    Err(error) => {
                        warn!(%error, column, row, "upgrade order rejected");
                        false
                    }
                }
            }
            Self::Repair {
                threshold, amount, ..
            } => {
                let damaged = game.services_needing_repair(threshold);
                for service in &damaged {
                    let _ = game.repair_service(*service, amount);
                }
                debug!(repaired = damaged.len(), "repair order applied");
                true
            }
        }
    }
}

/// Releases orders as game time advances.
#[derive(Debug)]
pub(crate) struct Script {
    orders: Vec<Order>,
    next: usize,
}

impl Script {
    /// Orders are released by time; ties keep their file order.
    pub(crate) fn new(mut orders: Vec<Order>) -> Self {
        orders.sort_by(|a, b| a.at_secs().total_cmp(&b.at_secs()));
        Self { orders, next: 0 }
    }

    /// Orders that became due at `now_secs` and were not released before.
    pub(crate) fn due(&mut self, now_secs: f64) -> &[Order] {
        let start = self.next;
        while self
            .orders
            .get(self.next)
            .is_some_and(|order| order.at_secs() <= now_secs)
        {
            self.next += 1;
        }
        &self.orders[start..self.next]
    }

    /// Orders not released yet.
    pub(crate) fn pending(&self) -> usize {
        self.orders.len() - self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use farm_defence_core::GameMode;

    #[test]
    fn builtin_scenario_parses() {
        let scenario = Scenario::builtin().expect("builtin scenario parses");
        assert_eq!(scenario.game.mode, GameMode::Survival);
        assert_eq!(scenario.orders.len(), 12);
        assert_eq!(
            scenario.orders[0],
            Order::Place {
                at_secs: 0.0,
                kind: ServiceKind::Firewall,
                column: 9,
                row: 9,
            }
        );
        assert!(Game::new(scenario.game).is_ok());
    }

    #[test]
    fn game_tables_override_defaults() {
        let scenario = Scenario::parse(
            r#"
            [game]
            mode = "sandbox"
            seed = 11

            [game.sandbox]
            traffic_rps = 3.0
            traffic_mix = { static = 1.0, malicious = 1.0 }
            "#,
        )
        .expect("scenario parses");

        assert_eq!(scenario.game.mode, GameMode::Sandbox);
        assert_eq!(scenario.game.seed, 11);
        assert_eq!(scenario.game.sandbox.traffic_rps, 3.0);
        assert_eq!(scenario.game.sandbox.traffic_mix.static_assets, 1.0);
        assert_eq!(scenario.game.grid.columns, 20);
        assert!(scenario.orders.is_empty());
    }

    #[test]
    fn malformed_scenarios_are_rejected() {
        assert!(matches!(
            Scenario::parse("[[orders]]\naction = \"demolish\"\nat_secs = 1.0\n"),
            Err(ScenarioError::Syntax(_))
        ));
        assert!(matches!(
            Scenario::parse("[[orders]]\naction = \"repair\"\nat_secs = -1.0\nthreshold = 50.0\namount = 5.0\n"),
            Err(ScenarioError::NegativeTime { index: 0, .. })
        ));
    }

    #[test]
    fn script_releases_orders_once_in_time_order() {
        let late = Order::Repair {
            at_secs: 5.0,
            threshold: 50.0,
            amount: 10.0,
        };
        let early = Order::Upgrade {
            at_secs: 1.0,
            column: 0,
            row: 0,
        };
        let mut script = Script::new(vec![late, early]);

        assert!(script.due(0.5).is_empty());
        assert_eq!(script.due(1.0), &[early]);
        assert!(script.due(4.0).is_empty());
        assert_eq!(script.due(10.0), &[late]);
        assert_eq!(script.pending(), 0);
    }

    #[test]
    fn orders_address_grid_cells() {
        let mut game = Game::new(GameConfig::for_mode(GameMode::Sandbox)).expect("sandbox");
        let place = Order::Place {
            at_secs: 0.0,
            kind: ServiceKind::Cache,
            column: 3,
            row: 4,
        };
        let upgrade = Order::Upgrade {
            at_secs: 0.0,
            column: 3,
            row: 4,
        };
        let stray = Order::Upgrade {
            at_secs: 0.0,
            column: 5,
            row: 5,
        };

        assert!(place.execute(&mut game));
        assert!(!place.execute(&mut game));
        assert!(upgrade.execute(&mut game));
        assert!(!stray.execute(&mut game));

        let services = game.services();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].coord, GridCoord::new(3, 4));
        assert_eq!(services[0].level, 2);
    }
}
