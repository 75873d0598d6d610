//! # brewd
//!
//! A Linux daemon that holds a fermentation vessel on a day-by-day
//! temperature schedule by switching a cooler (and optionally a heater)
//! through networked smart plugs.
//!
//! ## Features
//!
//! - **Schedule**: per-day target temperature and state label
//! - **Hysteresis control**: asymmetric band around the target with
//!   per-actuator switch rate limiting
//! - **Durable log**: rate-limited temperature records plus day-start records
//! - **Status endpoint**: one comma-separated status line per TCP connection
//!
//! ## Architecture
//!
//! - [`SystemCoordinator`](coordinator::SystemCoordinator) - lifecycle manager
//! - [`ControlLoop`](control_loop::ControlLoop) - sense, decide, advance, log
//! - [`StatusBoard`](status::StatusBoard) - latest snapshot for the server
//! - [`EventBus`](event::EventBus) - inter-service communication
//!
//! ## Example
//!
//! ```no_run
//! use brewd::{application::Application, config::ConfigManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config_manager = ConfigManager::load(None).await?;
//!     Application::builder()
//!         .with_config_manager(config_manager)
//!         .build()?
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod actuator;
pub mod app_context;
pub mod application;
pub mod config;
pub mod control_loop;
pub mod coordinator;
pub mod drivers;
pub mod event;
pub mod providers;
pub mod rate_gate;
pub mod schedule;
pub mod sensors;
pub mod status;
pub mod status_log;
pub mod status_server;
pub mod task_manager;
pub mod temperature_sensors;
