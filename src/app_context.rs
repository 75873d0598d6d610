//! Application state and global context management.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;

use crate::{
    actuator::{ActuatorController, ActuatorDriver, ActuatorRole},
    config::{Config, ConfigManager},
    control_loop::ControlLoop,
    drivers::KasaDriver,
    sensors::SensorSource,
    status::StatusBoard,
    status_log::StatusLog,
    temperature_sensors::W1Probe,
};

/// Shared application state containing all runtime data.
///
/// The control loop is the only writer of the status board; the status
/// server only reads it.
pub struct AppState {
    /// Configuration manager for centralized config handling
    pub config_manager: Arc<ConfigManager>,
    pub control_loop: Arc<Mutex<ControlLoop>>,
    /// Latest published status for the monitor
    pub status_board: StatusBoard,
    pub status_log: Arc<StatusLog>,
}

impl AppState {
    /// Creates the state with the 1-Wire probe and the Kasa driver from config.
    ///
    /// Fails when no probe is present.
    pub async fn new(config_manager: ConfigManager) -> Result<Self> {
        let config = config_manager.get();
        let probe = W1Probe::discover(&config.sensor).context("Failed to find a temperature probe")?;
        let driver = KasaDriver::from_cfg(&config.driver);

        Self::with_components(config_manager, Arc::new(probe), Arc::new(driver)).await
    }

    /// Creates the state around an already constructed sensor and driver.
    pub async fn with_components(
        config_manager: ConfigManager,
        sensor: Arc<dyn SensorSource>,
        driver: Arc<dyn ActuatorDriver>,
    ) -> Result<Self> {
        let config = config_manager.get();
        let control = config.control();
        let schedule = Arc::new(config.schedule()?);

        let cooler = ActuatorController::new(
            ActuatorRole::Cooler,
            config.cooler.address.clone(),
            driver.clone(),
            config.cooler.initially_on,
            control.min_switch_interval,
        );
        let heater = config.heater.as_ref().map(|heater| {
            ActuatorController::new(
                ActuatorRole::Heater,
                heater.address.clone(),
                driver.clone(),
                heater.initially_on,
                control.min_switch_interval,
            )
        });

        let status_log = Arc::new(StatusLog::open(&config.log_file).await);
        let status_board = StatusBoard::default();

        let control_loop = ControlLoop::new(
            schedule,
            control,
            sensor,
            cooler,
            heater,
            status_log.clone(),
            status_board.clone(),
        )?;

        Ok(Self {
            control_loop: Arc::new(Mutex::new(control_loop)),
            status_board,
            status_log,
            config_manager: Arc::new(config_manager),
        })
    }

    /// Gets a read-only reference to the current configuration.
    pub fn config(&self) -> &Config {
        self.config_manager.get()
    }

    /// Gets the configuration manager.
    pub fn config_manager(&self) -> &Arc<ConfigManager> {
        &self.config_manager
    }
}
