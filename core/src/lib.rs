#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Farm Defence engine.
//!
//! This crate defines the message surface that connects the player-facing
//! adapters, the authoritative spatial grid, and the simulation systems.
//! Adapters submit [`Command`] values describing desired mutations, the
//! simulation executes them and broadcasts [`Event`] values on the
//! [`EventBus`]. Systems never reference each other directly; they react to
//! event streams and respond exclusively with new events.

mod bus;
mod config;

pub use bus::{EventBus, SubscriptionId};
pub use config::{
    ConfigError, EventScheduleConfig, GameConfig, GridConfig, ModePreset, RandomEvent,
    SandboxConfig, ServiceLevel, TrafficMix, TrafficProfile, RANDOM_EVENTS,
};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use thiserror::Error;

/// Canonical banner emitted when the experience boots.
pub const WELCOME_BANNER: &str = "Welcome to Farm Defence. Keep the servers up.";

new_key_type! {
    /// Generation-checked handle assigned to a placed service.
    pub struct ServiceId;

    /// Generation-checked handle assigned to a traffic entity.
    pub struct TrafficId;
}

/// Location of a single grid cell expressed as column (`x`) and row (`z`).
///
/// Coordinates are signed so that world positions outside the grid still map
/// to a well-defined (out of bounds) cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    x: i32,
    z: i32,
}

impl GridCoord {
    /// Creates a new grid coordinate.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Column index of the cell.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Row index of the cell.
    #[must_use]
    pub const fn z(&self) -> i32 {
        self.z
    }

    /// Computes the Manhattan distance between two coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: GridCoord) -> u32 {
        self.x.abs_diff(other.x) + self.z.abs_diff(other.z)
    }

    /// Returns the coordinate shifted by the provided offsets.
    #[must_use]
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.z + dz)
    }
}

/// Game rules preset selected when a session starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// Escalating waves, upkeep, random events, bankruptcy and reputation loss.
    #[default]
    Survival,
    /// Player-configured traffic with no game-over condition.
    Sandbox,
}

/// Defensive services that can be placed on the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// Short range, high damage filter.
    Firewall,
    /// Long range, rapid, low damage edge cache.
    Cdn,
    /// Balanced mid-range distributor.
    LoadBalancer,
    /// Very fast, cheap, short range responder.
    Cache,
    /// Slow, heavy hitting, durable store.
    Database,
    /// Expensive long range coordinator.
    AutoScaler,
}

impl ServiceKind {
    /// Every service kind in declaration order.
    pub const ALL: [ServiceKind; 6] = [
        Self::Firewall,
        Self::Cdn,
        Self::LoadBalancer,
        Self::Cache,
        Self::Database,
        Self::AutoScaler,
    ];

    /// Stable identifier used on the wire and in configuration.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Firewall => "firewall",
            Self::Cdn => "cdn",
            Self::LoadBalancer => "load_balancer",
            Self::Cache => "cache",
            Self::Database => "database",
            Self::AutoScaler => "auto_scaler",
        }
    }

    /// Highest level the service can be upgraded to.
    #[must_use]
    pub fn max_level(self) -> u8 {
        self.levels().len() as u8
    }

    /// Stats for the provided one-based level.
    ///
    /// # Panics
    ///
    /// Panics when `level` lies outside `1..=max_level()`; callers only hold
    /// levels produced by placement and upgrade, which never leave the table.
    #[must_use]
    pub fn level(self, level: u8) -> &'static ServiceLevel {
        let index = usize::from(level)
            .checked_sub(1)
            .expect("service levels are one-based");
        &self.levels()[index]
    }

    /// Budget required to place a level-one service of this kind.
    #[must_use]
    pub fn build_cost(self) -> f64 {
        self.level(1).cost
    }
}

/// Traffic variants that walk from the grid edge toward the server farm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficKind {
    /// Static asset requests.
    Static,
    /// Read queries.
    Read,
    /// Write queries.
    Write,
    /// File uploads.
    Upload,
    /// Search requests.
    Search,
    /// Hostile traffic.
    Malicious,
}

impl TrafficKind {
    /// Every traffic kind in the order used for weighted selection.
    pub const ALL: [TrafficKind; 6] = [
        Self::Static,
        Self::Read,
        Self::Write,
        Self::Upload,
        Self::Search,
        Self::Malicious,
    ];

    /// Stable identifier used on the wire and in configuration.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Read => "read",
            Self::Write => "write",
            Self::Upload => "upload",
            Self::Search => "search",
            Self::Malicious => "malicious",
        }
    }
}

/// Timed global modifiers that the wave director can activate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RandomEventKind {
    /// Legitimate traffic arrives faster.
    TrafficSurge,
    /// Malicious traffic dominates the mix.
    DdosAttack,
    /// Services lose health faster.
    ServiceDegradation,
    /// A one-off budget grant.
    BudgetBonus,
}

impl RandomEventKind {
    /// Stable identifier used on the wire.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::TrafficSurge => "traffic-surge",
            Self::DdosAttack => "ddos-attack",
            Self::ServiceDegradation => "service-degradation",
            Self::BudgetBonus => "budget-bonus",
        }
    }

    /// Catalogue entry describing the event's duration and magnitude.
    #[must_use]
    pub fn definition(self) -> &'static RandomEvent {
        match self {
            Self::TrafficSurge => &RANDOM_EVENTS[0],
            Self::DdosAttack => &RANDOM_EVENTS[1],
            Self::ServiceDegradation => &RANDOM_EVENTS[2],
            Self::BudgetBonus => &RANDOM_EVENTS[3],
        }
    }
}

/// Terminal condition that ended a survival session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameOverReason {
    /// Reputation dropped to zero.
    Reputation,
    /// Budget fell below the bankruptcy floor.
    Bankruptcy,
}

/// Named channels on the [`EventBus`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// New traffic entered the grid.
    TrafficSpawned,
    /// Traffic was destroyed by services.
    TrafficProcessed,
    /// Traffic reached the farm.
    TrafficLeaked,
    /// A service was placed.
    ServicePlaced,
    /// A service gained a level.
    ServiceUpgraded,
    /// A service was destroyed or removed.
    ServiceFailed,
    /// A new wave began.
    WaveStarted,
    /// The budget changed.
    BudgetChanged,
    /// Reputation changed.
    ReputationChanged,
    /// A random event became active.
    EventTriggered,
    /// The active random event expired.
    EventEnded,
    /// The session ended.
    GameOver,
}

impl Topic {
    /// Topic name as exposed to the presentation layer.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TrafficSpawned => "traffic-spawned",
            Self::TrafficProcessed => "traffic-processed",
            Self::TrafficLeaked => "traffic-leaked",
            Self::ServicePlaced => "service-placed",
            Self::ServiceUpgraded => "service-upgraded",
            Self::ServiceFailed => "service-failed",
            Self::WaveStarted => "wave-started",
            Self::BudgetChanged => "budget-changed",
            Self::ReputationChanged => "reputation-changed",
            Self::EventTriggered => "event-triggered",
            Self::EventEnded => "event-ended",
            Self::GameOver => "game-over",
        }
    }
}

/// Events broadcast by the simulation after processing a tick or a command.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Confirms that a traffic entity entered the grid.
    TrafficSpawned {
        /// Identifier assigned to the entity.
        traffic: TrafficId,
        /// Variant of the spawned traffic.
        kind: TrafficKind,
        /// World position of the spawn point.
        position: Vec3,
    },
    /// Reports that a traffic entity was destroyed by services.
    TrafficProcessed {
        /// Identifier of the destroyed entity.
        traffic: TrafficId,
        /// Variant of the destroyed traffic.
        kind: TrafficKind,
        /// Budget earned for processing the request.
        reward: f64,
    },
    /// Reports that a traffic entity consumed its whole path.
    TrafficLeaked {
        /// Identifier of the leaked entity.
        traffic: TrafficId,
        /// Variant of the leaked traffic.
        kind: TrafficKind,
        /// Reputation lost because of the leak.
        damage: f64,
    },
    /// Confirms that a service now occupies a grid cell.
    ServicePlaced {
        /// Identifier assigned to the service.
        service: ServiceId,
        /// Kind of service that was placed.
        kind: ServiceKind,
        /// Cell occupied by the service.
        coord: GridCoord,
        /// Cell-centred world position of the service.
        position: Vec3,
    },
    /// Confirms that a service gained a level.
    ServiceUpgraded {
        /// Identifier of the upgraded service.
        service: ServiceId,
        /// Kind of the upgraded service.
        kind: ServiceKind,
        /// Level reached by the upgrade.
        new_level: u8,
    },
    /// Reports that a service was destroyed or removed and its cell freed.
    ServiceFailed {
        /// Identifier of the service.
        service: ServiceId,
    },
    /// Announces the start of a wave and its traffic schedule.
    WaveStarted {
        /// One-based wave number.
        wave: u32,
        /// Requests per second for the wave.
        rps: f64,
        /// Traffic mix for the wave.
        mix: TrafficMix,
    },
    /// Reports a budget mutation.
    BudgetChanged {
        /// Budget after the mutation.
        new_budget: f64,
        /// Signed change that was applied.
        delta: f64,
    },
    /// Reports a reputation mutation.
    ReputationChanged {
        /// Reputation after the mutation.
        new_reputation: f64,
        /// Signed change that was requested.
        delta: f64,
    },
    /// Announces that a random event became active.
    EventTriggered {
        /// Event that became active.
        event: RandomEventKind,
        /// Seconds until the event expires.
        duration_secs: f64,
    },
    /// Announces that the active random event expired.
    EventEnded {
        /// Event that expired.
        event: RandomEventKind,
    },
    /// Announces that the session ended.
    GameOver {
        /// Condition that ended the session.
        reason: GameOverReason,
        /// Final score at the moment of the breach.
        score: u64,
    },
}

impl Event {
    /// Topic the event is published on.
    #[must_use]
    pub const fn topic(&self) -> Topic {
        match self {
            Self::TrafficSpawned { .. } => Topic::TrafficSpawned,
            Self::TrafficProcessed { .. } => Topic::TrafficProcessed,
            Self::TrafficLeaked { .. } => Topic::TrafficLeaked,
            Self::ServicePlaced { .. } => Topic::ServicePlaced,
            Self::ServiceUpgraded { .. } => Topic::ServiceUpgraded,
            Self::ServiceFailed { .. } => Topic::ServiceFailed,
            Self::WaveStarted { .. } => Topic::WaveStarted,
            Self::BudgetChanged { .. } => Topic::BudgetChanged,
            Self::ReputationChanged { .. } => Topic::ReputationChanged,
            Self::EventTriggered { .. } => Topic::EventTriggered,
            Self::EventEnded { .. } => Topic::EventEnded,
            Self::GameOver { .. } => Topic::GameOver,
        }
    }
}

/// Commands submitted by the input layer.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Places a service at the cell containing the world position.
    PlaceService {
        /// World position picked by the player.
        position: Vec3,
        /// Kind of service to build.
        kind: ServiceKind,
    },
    /// Raises a service by one level.
    UpgradeService {
        /// Service to upgrade.
        service: ServiceId,
    },
    /// Removes a service and frees its cell.
    RemoveService {
        /// Service to remove.
        service: ServiceId,
    },
    /// Restores health to a service.
    RepairService {
        /// Service to repair.
        service: ServiceId,
        /// Health to restore.
        amount: f32,
    },
    /// Overrides the traffic spawn rate.
    SetTrafficRps {
        /// Requests per second.
        rps: f64,
    },
    /// Overrides the traffic mix.
    SetTrafficMix {
        /// New weights.
        mix: TrafficMix,
    },
    /// Overrides the budget (sandbox tooling).
    SetBudget {
        /// New budget.
        budget: f64,
    },
    /// Suspends all updates.
    Pause,
    /// Resumes updates.
    Resume,
    /// Rebuilds the session from its configuration.
    Restart,
}

/// Reasons a placement request may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum PlacementError {
    /// The target cell lies outside the grid.
    #[error("placement lies outside the grid")]
    OutOfBounds,
    /// The target cell already hosts a service.
    #[error("cell is already occupied")]
    Occupied,
    /// The budget does not cover the build cost.
    #[error("insufficient funds for placement")]
    InsufficientFunds,
    /// The session is paused or over.
    #[error("the game is not running")]
    GameInactive,
}

/// Reasons an upgrade request may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum UpgradeError {
    /// No service with the identifier exists.
    #[error("no such service")]
    MissingService,
    /// The service already sits at its highest level.
    #[error("service is already at its maximum level")]
    MaxLevelReached,
    /// The budget does not cover the upgrade cost.
    #[error("insufficient funds for upgrade")]
    InsufficientFunds,
    /// The session is paused or over.
    #[error("the game is not running")]
    GameInactive,
}

/// Reasons a removal request may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum RemovalError {
    /// No service with the identifier exists.
    #[error("no such service")]
    MissingService,
}

/// Rejection produced while applying a [`Command`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Placement was rejected.
    #[error(transparent)]
    Placement(#[from] PlacementError),
    /// Upgrade was rejected.
    #[error(transparent)]
    Upgrade(#[from] UpgradeError),
    /// Removal was rejected.
    #[error(transparent)]
    Removal(#[from] RemovalError),
    /// Repair targeted an unknown service.
    #[error("no such service to repair")]
    UnknownRepairTarget,
}

/// Budget and reputation held by the economy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Resources {
    /// Available budget; may be negative.
    pub budget: f64,
    /// Reputation in `[0, 100]`.
    pub reputation: f64,
}

/// Session counters used for scoring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Traffic entities destroyed by services.
    pub requests_processed: u64,
    /// Malicious entities destroyed by services.
    pub attacks_blocked: u64,
    /// Services placed during the session.
    pub services_built: u64,
    /// Simulated seconds played.
    pub play_time_secs: f64,
}

/// Immutable representation of a traffic entity used by renderers.
#[derive(Clone, Debug, PartialEq)]
pub struct TrafficSnapshot {
    /// Identifier of the entity.
    pub id: TrafficId,
    /// Variant of the entity.
    pub kind: TrafficKind,
    /// Current world position.
    pub position: Vec3,
    /// Remaining health.
    pub health: f32,
    /// Health at spawn.
    pub max_health: f32,
    /// Waypoints still ahead of the entity.
    pub remaining_waypoints: usize,
}

/// Immutable representation of a service used by renderers.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceSnapshot {
    /// Identifier of the service.
    pub id: ServiceId,
    /// Kind of the service.
    pub kind: ServiceKind,
    /// Occupied cell.
    pub coord: GridCoord,
    /// Cell-centred world position.
    pub position: Vec3,
    /// Current level.
    pub level: u8,
    /// Current health.
    pub health: f32,
    /// Health ceiling at the current level.
    pub max_health: f32,
    /// Targeting radius in world units.
    pub range: f32,
    /// Traffic in range at the latest tick.
    pub targets: Vec<TrafficId>,
}
