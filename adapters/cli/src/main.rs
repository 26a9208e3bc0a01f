#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a headless Farm Defence session.

mod scenario;

use std::{cell::RefCell, path::PathBuf, rc::Rc};

use anyhow::{ensure, Context as _, Result};
use clap::{Parser, ValueEnum};
use farm_defence_core::{Event, GameMode, Topic, WELCOME_BANNER};
use farm_defence_simulation::Game;
use scenario::{Scenario, Script};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Runs a scripted session at a fixed frame rate and prints a summary.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Scenario file with a `[game]` table and timed `[[orders]]`.
    #[arg(long)]
    scenario: Option<PathBuf>,
    /// Overrides the scenario's game mode.
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
    /// Overrides the scenario's random seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Game seconds to simulate.
    #[arg(long, default_value_t = 300.0)]
    seconds: f64,
    /// Simulation steps per game second.
    #[arg(long, default_value_t = 30)]
    fps: u32,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Survival,
    Sandbox,
}

impl From<ModeArg> for GameMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Survival => Self::Survival,
            ModeArg::Sandbox => Self::Sandbox,
        }
    }
}

/// Bus-side counters that the game does not keep itself.
#[derive(Debug, Default)]
struct Tally {
    leaked: u64,
    failed: u64,
    random_events: u64,
    rejected_orders: u64,
}

/// Entry point for the Farm Defence command-line interface.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    ensure!(cli.fps > 0, "--fps must be positive");
    ensure!(cli.seconds >= 0.0, "--seconds must not be negative");

    let mut scenario = match &cli.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::builtin().context("builtin scenario is malformed")?,
    };
    if let Some(mode) = cli.mode {
        scenario.game.mode = mode.into();
    }
    if let Some(seed) = cli.seed {
        scenario.game.seed = seed;
    }

    println!("{WELCOME_BANNER}");
    let mut game = Game::new(scenario.game).context("invalid game configuration")?;
    let tally = Rc::new(RefCell::new(Tally::default()));
    for topic in [Topic::TrafficLeaked, Topic::ServiceFailed, Topic::EventTriggered] {
        let tally = Rc::clone(&tally);
        let _ = game.subscribe(topic, move |event| {
            let mut tally = tally.borrow_mut();
            match event {
                Event::TrafficLeaked { .. } => tally.leaked += 1,
                Event::ServiceFailed { .. } => tally.failed += 1,
                Event::EventTriggered { .. } => tally.random_events += 1,
                _ => {}
            }
        });
    }

    let mut script = Script::new(scenario.orders);
    let dt = 1.0 / f64::from(cli.fps);
    let frames = (cli.seconds * f64::from(cli.fps)).round() as u64;
    for _ in 0..frames {
        for order in script.due(game.game_time_secs()) {
            if !order.execute(&mut game) {
                tally.borrow_mut().rejected_orders += 1;
            }
        }
        game.update(dt);
        if game.outcome().is_some() {
            break;
        }
    }
    info!(
        frames,
        game_time = game.game_time_secs(),
        "session finished"
    );

    print_summary(&game, &tally.borrow(), script.pending());
    Ok(())
}

fn print_summary(game: &Game, tally: &Tally, pending_orders: usize) {
    let resources = game.resources();
    let stats = game.stats();
    let mode = match game.mode() {
        GameMode::Survival => "survival",
        GameMode::Sandbox => "sandbox",
    };

    println!("mode: {mode}");
    match game.outcome() {
        Some(outcome) => println!(
            "outcome: game over ({:?}) at {:.1} s",
            outcome.reason,
            game.game_time_secs()
        ),
        None => println!("outcome: running after {:.1} s", game.game_time_secs()),
    }
    println!("wave: {}", game.wave());
    println!(
        "budget: {:.2}  reputation: {:.2}",
        resources.budget, resources.reputation
    );
    println!(
        "traffic: spawned {}, processed {} (blocked {}), leaked {}",
        game.traffic_spawned(),
        stats.requests_processed,
        stats.attacks_blocked,
        tally.leaked
    );
    println!(
        "services: built {}, alive {}, failed {}",
        stats.services_built,
        game.services().len(),
        tally.failed
    );
    println!(
        "orders: rejected {}, pending {pending_orders}",
        tally.rejected_orders
    );
    println!("random events: {}", tally.random_events);
    println!("score: {}", game.score());
}
