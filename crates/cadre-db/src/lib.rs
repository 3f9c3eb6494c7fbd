//! PostgreSQL persistence for the Cadre organization simulator.
//!
//! Postgres is the single durable store: the roster, the project
//! timeline, the event log, plans, the pending-communication set, the
//! dispatch log, inbound queues, and participation stats all live here.
//! The hot path is [`persist_tick`], which applies a whole [`TickDelta`]
//! in one transaction so the clock can never advance apart from its
//! effects.
//!
//! [`TickDelta`]: cadre_types::TickDelta
//!
//! # Modules
//!
//! - [`postgres`]: connection pool configuration and migrations
//! - [`worker_store`]: roster rows
//! - [`project_store`]: projects, assignments, chat rooms
//! - [`event_store`]: the append-only event log
//! - [`comm_store`]: pending set, dispatch log, inbound queues
//! - [`plan_store`]: plans and participation stats
//! - [`tick_persist`]: the atomic end-of-tick write path
//! - [`error`]: the [`DbError`] type

pub mod comm_store;
pub mod error;
pub mod event_store;
pub mod plan_store;
pub mod postgres;
pub mod project_store;
pub mod tick_persist;
pub mod worker_store;

pub use comm_store::CommStore;
pub use error::DbError;
pub use event_store::EventStore;
pub use plan_store::PlanStore;
pub use postgres::{PostgresConfig, PostgresPool};
pub use project_store::ProjectStore;
pub use tick_persist::{load_clock, persist_tick, reset_run, save_clock};
pub use worker_store::WorkerStore;
