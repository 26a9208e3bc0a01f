//! Static balance tables and the tunable session configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{GameMode, RandomEventKind, ServiceKind, TrafficKind};

/// Stats for a single level of a service.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ServiceLevel {
    /// Budget needed to reach this level (build cost at level one).
    pub cost: f64,
    /// Targeting radius in world units.
    pub range: f32,
    /// Damage dealt to every target per attack.
    pub damage: f32,
    /// Attacks per second.
    pub attack_rate: f32,
    /// Health ceiling at this level.
    pub health: f32,
    /// Budget charged per upkeep interval.
    pub upkeep: f64,
}

const fn level(
    cost: f64,
    range: f32,
    damage: f32,
    attack_rate: f32,
    health: f32,
    upkeep: f64,
) -> ServiceLevel {
    ServiceLevel {
        cost,
        range,
        damage,
        attack_rate,
        health,
        upkeep,
    }
}

static FIREWALL_LEVELS: [ServiceLevel; 3] = [
    level(100.0, 3.0, 10.0, 2.0, 100.0, 5.0),
    level(150.0, 4.0, 15.0, 2.5, 150.0, 8.0),
    level(250.0, 5.0, 25.0, 3.0, 200.0, 12.0),
];

static CDN_LEVELS: [ServiceLevel; 3] = [
    level(150.0, 5.0, 5.0, 4.0, 80.0, 8.0),
    level(200.0, 6.0, 8.0, 5.0, 110.0, 12.0),
    level(300.0, 7.0, 12.0, 6.0, 140.0, 16.0),
];

static LOAD_BALANCER_LEVELS: [ServiceLevel; 3] = [
    level(200.0, 4.0, 8.0, 3.0, 120.0, 10.0),
    level(250.0, 5.0, 12.0, 3.5, 160.0, 14.0),
    level(350.0, 6.0, 18.0, 4.0, 220.0, 18.0),
];

static CACHE_LEVELS: [ServiceLevel; 3] = [
    level(120.0, 3.5, 6.0, 5.0, 70.0, 6.0),
    level(160.0, 4.0, 9.0, 6.0, 100.0, 9.0),
    level(240.0, 4.5, 13.0, 7.0, 130.0, 12.0),
];

static DATABASE_LEVELS: [ServiceLevel; 3] = [
    level(250.0, 2.5, 20.0, 1.0, 200.0, 15.0),
    level(300.0, 3.0, 30.0, 1.2, 260.0, 20.0),
    level(450.0, 3.5, 45.0, 1.5, 340.0, 26.0),
];

static AUTO_SCALER_LEVELS: [ServiceLevel; 3] = [
    level(300.0, 6.0, 12.0, 1.5, 150.0, 20.0),
    level(400.0, 7.0, 18.0, 2.0, 200.0, 26.0),
    level(550.0, 8.0, 26.0, 2.5, 260.0, 34.0),
];

impl ServiceKind {
    /// Full level table for the service kind.
    #[must_use]
    pub fn levels(self) -> &'static [ServiceLevel; 3] {
        match self {
            Self::Firewall => &FIREWALL_LEVELS,
            Self::Cdn => &CDN_LEVELS,
            Self::LoadBalancer => &LOAD_BALANCER_LEVELS,
            Self::Cache => &CACHE_LEVELS,
            Self::Database => &DATABASE_LEVELS,
            Self::AutoScaler => &AUTO_SCALER_LEVELS,
        }
    }
}

/// Base stats of a traffic variant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrafficProfile {
    /// Health at spawn.
    pub health: f32,
    /// Movement speed factor.
    pub speed: f32,
    /// Budget earned when processed.
    pub reward: f64,
    /// Reputation lost when leaked.
    pub leak_damage: f64,
}

impl TrafficKind {
    /// Base stats for the traffic variant.
    #[must_use]
    pub const fn profile(self) -> TrafficProfile {
        let (health, speed, reward, leak_damage) = match self {
            Self::Static => (10.0, 1.0, 5.0, 1.0),
            Self::Read => (15.0, 0.8, 8.0, 2.0),
            Self::Write => (20.0, 0.6, 12.0, 3.0),
            Self::Upload => (25.0, 0.4, 15.0, 4.0),
            Self::Search => (18.0, 0.7, 10.0, 2.0),
            Self::Malicious => (50.0, 1.2, 25.0, 10.0),
        };
        TrafficProfile {
            health,
            speed,
            reward,
            leak_damage,
        }
    }
}

/// Catalogue entry for a random event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RandomEvent {
    /// Identity and effect of the event.
    pub kind: RandomEventKind,
    /// Seconds the event stays active.
    pub duration_secs: f64,
    /// Effect strength: RPS factor for surges, malicious share for DDoS
    /// attacks, degradation factor for degradation, budget grant for bonuses.
    pub magnitude: f64,
}

/// The four random events the wave director draws from.
pub static RANDOM_EVENTS: [RandomEvent; 4] = [
    RandomEvent {
        kind: RandomEventKind::TrafficSurge,
        duration_secs: 15.0,
        magnitude: 2.0,
    },
    RandomEvent {
        kind: RandomEventKind::DdosAttack,
        duration_secs: 10.0,
        magnitude: 0.8,
    },
    RandomEvent {
        kind: RandomEventKind::ServiceDegradation,
        duration_secs: 20.0,
        magnitude: 2.0,
    },
    RandomEvent {
        kind: RandomEventKind::BudgetBonus,
        duration_secs: 0.0,
        magnitude: 200.0,
    },
];

/// Economy starting point for a game mode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModePreset {
    /// Budget at session start.
    pub starting_budget: f64,
    /// Reputation at session start.
    pub starting_reputation: f64,
    /// Reputation ceiling.
    pub max_reputation: f64,
    /// Budget below which the session is bankrupt, if any.
    pub bankruptcy_floor: Option<f64>,
}

impl GameMode {
    /// Economy preset associated with the mode.
    #[must_use]
    pub const fn preset(self) -> ModePreset {
        match self {
            Self::Survival => ModePreset {
                starting_budget: 500.0,
                starting_reputation: 100.0,
                max_reputation: 100.0,
                bankruptcy_floor: Some(-1000.0),
            },
            Self::Sandbox => ModePreset {
                starting_budget: 10_000.0,
                starting_reputation: 100.0,
                max_reputation: 100.0,
                bankruptcy_floor: None,
            },
        }
    }
}

/// Relative weights used to pick the variant of each spawned entity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficMix {
    /// Weight of static asset requests.
    #[serde(rename = "static")]
    pub static_assets: f64,
    /// Weight of read queries.
    pub read: f64,
    /// Weight of write queries.
    pub write: f64,
    /// Weight of uploads.
    pub upload: f64,
    /// Weight of search requests.
    pub search: f64,
    /// Weight of malicious traffic.
    pub malicious: f64,
}

const LEGITIMATE_SPLIT: [f64; 5] = [0.3, 0.25, 0.15, 0.1, 0.2];

impl Default for TrafficMix {
    fn default() -> Self {
        Self::with_malicious_share(0.0)
    }
}

impl TrafficMix {
    /// Builds a normalised mix with the given malicious share; the remainder
    /// is split 30/25/15/10/20 across static, read, write, upload and search.
    #[must_use]
    pub fn with_malicious_share(share: f64) -> Self {
        let malicious = share.clamp(0.0, 1.0);
        let remaining = 1.0 - malicious;
        let [static_assets, read, write, upload, search] =
            LEGITIMATE_SPLIT.map(|split| split * remaining);
        Self {
            static_assets,
            read,
            write,
            upload,
            search,
            malicious,
        }
    }

    /// Survival schedule: malicious share grows from 5% to a 30% cap.
    #[must_use]
    pub fn escalating(game_time_secs: f64) -> Self {
        Self::with_malicious_share((0.05 + game_time_secs / 600.0).min(0.3))
    }

    /// Weight assigned to a traffic variant.
    #[must_use]
    pub const fn weight(&self, kind: TrafficKind) -> f64 {
        match kind {
            TrafficKind::Static => self.static_assets,
            TrafficKind::Read => self.read,
            TrafficKind::Write => self.write,
            TrafficKind::Upload => self.upload,
            TrafficKind::Search => self.search,
            TrafficKind::Malicious => self.malicious,
        }
    }

    /// Sum of all non-negative weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        TrafficKind::ALL
            .iter()
            .map(|kind| self.weight(*kind).max(0.0))
            .sum()
    }

    /// Reports whether at least one weight is positive.
    #[must_use]
    pub fn has_positive_weight(&self) -> bool {
        self.total() > 0.0
    }

    /// Keeps the legitimate proportions but forces the malicious share.
    #[must_use]
    pub fn overriding_malicious(&self, share: f64) -> Self {
        let share = share.clamp(0.0, 1.0);
        let legitimate = self.total() - self.malicious.max(0.0);
        if legitimate <= 0.0 {
            return Self::with_malicious_share(share);
        }
        let scale = (1.0 - share) / legitimate;
        Self {
            static_assets: self.static_assets.max(0.0) * scale,
            read: self.read.max(0.0) * scale,
            write: self.write.max(0.0) * scale,
            upload: self.upload.max(0.0) * scale,
            search: self.search.max(0.0) * scale,
            malicious: share,
        }
    }

    /// Maps a uniform roll in `[0, 1)` onto a variant using cumulative weights.
    ///
    /// Rolls that fall past the cumulative total land on malicious traffic.
    #[must_use]
    pub fn select(&self, roll: f64) -> TrafficKind {
        let target = roll * self.total();
        let mut cumulative = 0.0;
        for kind in TrafficKind::ALL {
            cumulative += self.weight(kind).max(0.0);
            if target < cumulative {
                return kind;
            }
        }
        TrafficKind::Malicious
    }
}

/// Dimensions of the spatial grid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Number of cell columns.
    pub columns: u32,
    /// Number of cell rows.
    pub rows: u32,
    /// Edge length of a cell in world units.
    pub cell_size: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            columns: 20,
            rows: 20,
            cell_size: 2.0,
        }
    }
}

/// Timing of random event checks.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventScheduleConfig {
    /// Seconds before the first check.
    pub first_check_secs: f64,
    /// Lower bound of the randomised interval between checks.
    pub min_interval_secs: f64,
    /// Upper bound of the randomised interval between checks.
    pub max_interval_secs: f64,
}

impl Default for EventScheduleConfig {
    fn default() -> Self {
        Self {
            first_check_secs: 30.0,
            min_interval_secs: 15.0,
            max_interval_secs: 45.0,
        }
    }
}

/// Player-selected sandbox settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Budget at session start.
    pub starting_budget: f64,
    /// Fixed requests per second.
    pub traffic_rps: f64,
    /// Fixed traffic mix.
    pub traffic_mix: TrafficMix,
    /// Whether services cost upkeep.
    pub enable_upkeep: bool,
    /// Whether random events fire.
    pub enable_events: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            starting_budget: GameMode::Sandbox.preset().starting_budget,
            traffic_rps: 10.0,
            traffic_mix: TrafficMix::default(),
            enable_upkeep: false,
            enable_events: false,
        }
    }
}

/// Tunable parameters of a session.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Rules preset.
    pub mode: GameMode,
    /// Seed for every random stream in the session.
    pub seed: u64,
    /// Spatial grid dimensions.
    pub grid: GridConfig,
    /// Base requests per second scaled by the survival schedule.
    pub base_rps: f64,
    /// Seconds per wave.
    pub wave_length_secs: f64,
    /// Seconds between upkeep debits.
    pub upkeep_interval_secs: f64,
    /// Health lost per second by every service.
    pub degradation_rate: f32,
    /// Random event timing.
    pub events: EventScheduleConfig,
    /// Sandbox overrides.
    pub sandbox: SandboxConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            mode: GameMode::Survival,
            seed: 0x5eed_f00d_cafe_d00d,
            grid: GridConfig::default(),
            base_rps: 5.0,
            wave_length_secs: 60.0,
            upkeep_interval_secs: 10.0,
            degradation_rate: 0.1,
            events: EventScheduleConfig::default(),
            sandbox: SandboxConfig::default(),
        }
    }
}

impl GameConfig {
    /// Default configuration for the provided mode.
    #[must_use]
    pub fn for_mode(mode: GameMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Checks that the configuration describes a playable session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid.columns == 0 || self.grid.rows == 0 {
            return Err(ConfigError::EmptyGrid {
                columns: self.grid.columns,
                rows: self.grid.rows,
            });
        }
        if !(self.grid.cell_size > 0.0 && self.grid.cell_size.is_finite()) {
            return Err(ConfigError::InvalidCellSize(self.grid.cell_size));
        }
        for (name, value) in [
            ("wave_length_secs", self.wave_length_secs),
            ("upkeep_interval_secs", self.upkeep_interval_secs),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ConfigError::InvalidInterval { name, value });
            }
        }
        let events = &self.events;
        if !(events.first_check_secs >= 0.0 && events.first_check_secs.is_finite()) {
            return Err(ConfigError::InvalidInterval {
                name: "events.first_check_secs",
                value: events.first_check_secs,
            });
        }
        if !(events.min_interval_secs > 0.0)
            || !events.max_interval_secs.is_finite()
            || events.min_interval_secs > events.max_interval_secs
        {
            return Err(ConfigError::InvertedEventInterval {
                min: events.min_interval_secs,
                max: events.max_interval_secs,
            });
        }
        for rps in [self.base_rps, self.sandbox.traffic_rps] {
            if !(rps >= 0.0 && rps.is_finite()) {
                return Err(ConfigError::InvalidRps(rps));
            }
        }
        if !self.sandbox.traffic_mix.has_positive_weight() {
            return Err(ConfigError::EmptyTrafficMix);
        }
        Ok(())
    }
}

/// Reasons a [`GameConfig`] is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// The grid has no cells.
    #[error("grid must have at least one cell, got {columns}x{rows}")]
    EmptyGrid {
        /// Configured column count.
        columns: u32,
        /// Configured row count.
        rows: u32,
    },
    /// The cell size is not a positive finite number.
    #[error("cell size must be positive, got {0}")]
    InvalidCellSize(f32),
    /// A periodic interval or delay is out of range or not finite.
    #[error("{name} must be a finite positive duration, got {value}")]
    InvalidInterval {
        /// Offending field.
        name: &'static str,
        /// Configured value.
        value: f64,
    },
    /// Random event interval bounds are inverted, non-positive or not finite.
    #[error("random event interval bounds are invalid: {min}..{max}")]
    InvertedEventInterval {
        /// Configured lower bound.
        min: f64,
        /// Configured upper bound.
        max: f64,
    },
    /// A requests-per-second value is negative or not finite.
    #[error("requests per second must be finite and non-negative, got {0}")]
    InvalidRps(f64),
    /// Every traffic weight is zero.
    #[error("traffic mix needs at least one positive weight")]
    EmptyTrafficMix,
}
