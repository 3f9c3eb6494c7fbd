//! Engine binary for the Cadre organization simulator.
//!
//! This is the entry point that wires together the tick pipeline, the
//! Postgres store, the delivery collaborator, and the LLM planner. It
//! loads configuration, seeds or hydrates state, and advances the
//! simulation in the background until interrupted.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `cadre-config.yaml` (or the path given as
//!    the first argument)
//! 2. Initialize structured logging (tracing)
//! 3. Connect to Postgres and run migrations
//! 4. Build the LLM plan source and the delivery backend
//! 5. Seed a fresh store from config, or hydrate from prior state
//! 6. Start the run and the background auto-advance loop
//! 7. Wait for ctrl-c, then stop and record the final clock

mod bootstrap;
mod error;
mod persist;

use std::path::Path;

use cadre_comms::{DeliveryBackend, HttpDelivery, MemoryDelivery};
use cadre_core::config::{LoggingConfig, SimulationConfig};
use cadre_core::tick::Simulation;
use cadre_db::{PostgresPool, WorkerStore, load_clock, save_clock};
use cadre_planner::LlmPlanSource;
use cadre_types::ClockState;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::persist::PgPersister;

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if any initialization step fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!(
        name = config.simulation.name,
        seed = config.simulation.seed,
        ticks_per_day = config.time.ticks_per_day,
        days_per_week = config.time.days_per_week,
        workers = config.workers.len(),
        projects = config.projects.len(),
        "cadre-engine starting"
    );

    // 3. Connect to Postgres and migrate.
    let pool = PostgresPool::connect_url(&config.infrastructure.postgres_url).await?;
    pool.run_migrations().await?;
    info!("Postgres connected, migrations applied");

    // 4. Build collaborators.
    let source = LlmPlanSource::new(&config.llm)?;
    info!(backend = source.backend_name(), "Plan source ready");

    let backend = if config.infrastructure.delivery_url.is_empty() {
        info!("No delivery URL configured, using in-memory delivery sink");
        DeliveryBackend::Memory(MemoryDelivery::new())
    } else {
        info!(url = config.infrastructure.delivery_url, "HTTP delivery configured");
        DeliveryBackend::Http(HttpDelivery::new(
            config.infrastructure.delivery_url.clone(),
            config.infrastructure.delivery_api_key.clone(),
        ))
    };

    let persister = PgPersister::new(pool.pool().clone());
    let sim = Simulation::new(&config, source, backend, persister)?;

    // 5. Seed a fresh store, or hydrate from prior state.
    {
        let mut core = sim.core().await;
        let stored_workers = WorkerStore::new(pool.pool()).count().await?;
        if stored_workers == 0 {
            bootstrap::seed_stores(pool.pool(), &core).await?;
        } else {
            bootstrap::hydrate(pool.pool(), &mut core).await?;
        }
    }

    // 6. Start the run.
    sim.start().await?;
    let auto = config.time.auto_interval_ms > 0;
    save_clock(
        pool.pool(),
        &ClockState {
            current_tick: sim.current_tick().await,
            running: true,
            auto_advance: auto,
        },
    )
    .await?;

    if auto {
        sim.start_auto_advance(config.time.auto_interval_ms);
        info!(
            interval_ms = config.time.auto_interval_ms,
            "Auto-advance loop started"
        );
    } else {
        info!("Auto-advance disabled, ticks advance on demand only");
    }

    // 7. Run until interrupted.
    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, stopping");

    sim.stop().await?;
    let final_tick = sim.current_tick().await;
    save_clock(
        pool.pool(),
        &ClockState {
            current_tick: final_tick,
            running: false,
            auto_advance: false,
        },
    )
    .await?;

    let stored = load_clock(pool.pool()).await?;
    info!(
        tick = stored.current_tick,
        "cadre-engine shutdown complete"
    );
    pool.close().await;
    Ok(())
}

/// Load the simulation configuration.
///
/// The first command-line argument overrides the default path. A missing
/// file falls back to built-in defaults with env overrides applied.
fn load_config() -> Result<SimulationConfig, EngineError> {
    let path_arg = std::env::args().nth(1);
    let path_str = path_arg.as_deref().unwrap_or("cadre-config.yaml");
    let path = Path::new(path_str);

    if path.exists() {
        Ok(SimulationConfig::from_file(path)?)
    } else {
        let mut config = SimulationConfig::default();
        config.infrastructure.apply_env_overrides();
        config.llm.apply_env_overrides();
        Ok(config)
    }
}

/// Initialize the tracing subscriber per logging configuration.
///
/// `RUST_LOG` wins over the configured level when set.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
