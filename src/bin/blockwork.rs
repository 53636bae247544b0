//! blockwork-server binary
//!
//! Reads JSON-lines requests on stdin, ticks the scheduler against an
//! in-memory world, and writes JSON-lines responses on stdout.
//!
//! ## Configuration (TOML file + env via `config` crate, CLI flags win)
//!
//! | Key                                   | Default     | Description                        |
//! |---------------------------------------|-------------|------------------------------------|
//! | `BLOCKWORK_MAX_OPERATIONS_PER_TICK`   | `1000`      | Cell mutations per operation/tick  |
//! | `BLOCKWORK_UNDO_CACHE_PER_OWNER`      | `50`        | Journals kept per owner            |
//! | `BLOCKWORK_TICK_RATE_HZ`              | `20`        | Scheduler tick rate                |
//! | `BLOCKWORK_WORLD`                     | `overworld` | Identity of the served world       |

use anyhow::{Context, Result};
use blockwork::{
    agent::{AgentConfig, EngineAgent},
    config::EngineConfig,
    grid::GridWorld,
    scheduler::Scheduler,
    types::WorldId,
};
use clap::Parser;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "blockwork-server", about = "Blockwork Engine", version)]
struct Args {
    /// Optional TOML configuration file
    #[arg(long, env = "BLOCKWORK_CONFIG")]
    config: Option<PathBuf>,

    /// World every request targets
    #[arg(long, env = "BLOCKWORK_WORLD", default_value = "overworld")]
    world: String,

    /// Tick rate (Hz); overrides the configuration file
    #[arg(long)]
    tick_rate_hz: Option<f32>,

    /// Cell mutations per operation per tick; overrides the configuration file
    #[arg(long)]
    max_operations_per_tick: Option<usize>,

    /// Entity kinds the world can recreate on undo (repeatable)
    #[arg(long = "entity-kind")]
    entity_kinds: Vec<String>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries responses.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("blockwork=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config =
        EngineConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(hz) = args.tick_rate_hz {
        config.tick_rate_hz = hz;
    }
    if let Some(budget) = args.max_operations_per_tick {
        config.max_operations_per_tick = budget;
    }
    config.validate()?;

    log::info!(
        "Starting blockwork-server (world='{}', budget={}, undo cache={}/owner)",
        args.world,
        config.max_operations_per_tick,
        config.undo_cache_per_owner,
    );

    let world_id = WorldId::new(args.world);
    let mut world = GridWorld::new(world_id.clone());
    for kind in args.entity_kinds {
        world.entities.register_kind(kind);
    }

    let agent_config = AgentConfig {
        world: world_id,
        tick_rate_hz: config.tick_rate_hz,
    };
    let scheduler = Arc::new(Mutex::new(Scheduler::new(config)));
    let world = Arc::new(Mutex::new(world));

    // Run until stdin closes or SIGINT
    EngineAgent::new(agent_config, scheduler, world).run().await
}
