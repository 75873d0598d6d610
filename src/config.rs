//! Configuration management for the brewd daemon.
//!
//! Handles loading, parsing, and validation of the configuration file that
//! defines the fermentation schedule, hysteresis margins, actuators and probe.
//! YAML is the native format; the line-oriented `.brew` settings format is
//! accepted as well (see [`brew_file`]).

pub mod brew_file;

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::schedule::Schedule;

/// Main configuration structure for the brewd daemon.
///
/// # Example
///
/// ```yaml
/// version: 1
/// margin_plus: 0.5
/// margin_minus: 0.5
/// switch_delay_minutes: 10
/// log_interval_minutes: 1
/// log_file: brew.log
/// status_port: 4111
///
/// cooler:
///   address: 192.168.2.52
///   initially_on: true
///
/// schedule:
///   - { days: 14, temp: 12.0, state: Ferment }
///   - { days: 3, temp: 16.66, state: Diacetyl rest }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version for compatibility checking.
    pub version: u8,

    /// Degrees above target tolerated before cooling.
    #[serde(default = "defaults::margin")]
    pub margin_plus: f64,

    /// Degrees below target tolerated before heating.
    #[serde(default = "defaults::margin")]
    pub margin_minus: f64,

    /// Minimum minutes between two switches of the same actuator.
    #[serde(default = "defaults::switch_delay_minutes")]
    pub switch_delay_minutes: f64,

    /// Minimum minutes between two temperature log records.
    #[serde(default = "defaults::log_interval_minutes")]
    pub log_interval_minutes: f64,

    /// Pause between control loop iterations in milliseconds.
    #[serde(default = "defaults::poll_millis")]
    pub poll_millis: u64,

    /// Append-only log file.
    #[serde(default = "defaults::log_file")]
    pub log_file: PathBuf,

    /// TCP port of the status server.
    #[serde(default = "defaults::status_port")]
    pub status_port: u16,

    /// Cooling actuator (refrigerator plug).
    pub cooler: ActuatorCfg,

    /// Optional heating actuator.
    #[serde(default)]
    pub heater: Option<ActuatorCfg>,

    /// Command used to switch the plugs.
    #[serde(default)]
    pub driver: DriverCfg,

    /// Location of the 1-wire probe.
    #[serde(default)]
    pub sensor: SensorCfg,

    /// Run-length encoded fermentation profile.
    #[serde(default)]
    pub schedule: Vec<ScheduleStepCfg>,
}

/// Smart plug driving one actuator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActuatorCfg {
    /// Network address of the plug.
    pub address: String,

    /// State assumed at startup before the first switch.
    #[serde(default)]
    pub initially_on: bool,
}

/// External program used by the actuator driver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverCfg {
    #[serde(default = "defaults::driver_program")]
    pub program: String,

    /// Arguments placed before `--host <address> on|off`.
    #[serde(default)]
    pub args: Vec<String>,

    /// Longest a single switch command may run before it is killed.
    #[serde(default = "defaults::driver_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for DriverCfg {
    fn default() -> Self {
        Self {
            program: defaults::driver_program(),
            args: Vec::new(),
            timeout_seconds: defaults::driver_timeout_seconds(),
        }
    }
}

/// 1-wire probe discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorCfg {
    /// Directory listing the bus devices.
    #[serde(default = "defaults::devices_dir")]
    pub devices_dir: PathBuf,

    /// Device family prefix of the probe (DS18B20 is "28").
    #[serde(default = "defaults::family_prefix")]
    pub family_prefix: String,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            devices_dir: defaults::devices_dir(),
            family_prefix: defaults::family_prefix(),
        }
    }
}

/// Hold `temp` for `days` days, shown to the monitor as `state`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleStepCfg {
    pub days: u32,
    pub temp: f64,
    #[serde(default)]
    pub state: String,
}

/// Immutable parameters of the control loop, derived from [`Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct ControlConfig {
    pub margin_plus: f64,
    pub margin_minus: f64,
    pub min_switch_interval: Duration,
    pub min_log_interval: Duration,
}

impl Config {
    /// Validates the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("margin_plus", self.margin_plus),
            ("margin_minus", self.margin_minus),
            ("switch_delay_minutes", self.switch_delay_minutes),
            ("log_interval_minutes", self.log_interval_minutes),
        ] {
            if !value.is_finite() || value < 0.0 {
                anyhow::bail!("'{name}' must be a non-negative number, got {value}");
            }
        }

        for (name, value) in [
            ("switch_delay_minutes", self.switch_delay_minutes),
            ("log_interval_minutes", self.log_interval_minutes),
        ] {
            if Duration::try_from_secs_f64(value * 60.0).is_err() {
                anyhow::bail!("'{name}' is too large, got {value}");
            }
        }

        if self.driver.timeout_seconds == 0 {
            anyhow::bail!("Driver timeout must be at least one second");
        }

        if self.cooler.address.trim().is_empty() {
            anyhow::bail!("Cooler address is missing");
        }

        if let Some(heater) = &self.heater {
            if heater.address.trim().is_empty() {
                anyhow::bail!("Heater is configured without an address");
            }
        }

        if self.schedule.is_empty() {
            anyhow::bail!("Schedule has no steps");
        }

        for (idx, step) in self.schedule.iter().enumerate() {
            if step.days == 0 {
                anyhow::bail!("Schedule step {} ('{}') lasts zero days", idx + 1, step.state);
            }
            if !step.temp.is_finite() {
                anyhow::bail!(
                    "Schedule step {} ('{}') has an invalid temperature",
                    idx + 1,
                    step.state
                );
            }
        }

        Ok(())
    }

    /// Control loop parameters.
    pub fn control(&self) -> ControlConfig {
        ControlConfig {
            margin_plus: self.margin_plus,
            margin_minus: self.margin_minus,
            min_switch_interval: minutes(self.switch_delay_minutes),
            min_log_interval: minutes(self.log_interval_minutes),
        }
    }

    /// Expands the configured steps into the per-day schedule.
    pub fn schedule(&self) -> Result<Schedule> {
        Schedule::from_steps(&self.schedule).context("Invalid schedule")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_millis)
    }

    /// Total number of scheduled days.
    pub fn total_days(&self) -> u32 {
        self.schedule.iter().map(|step| step.days).sum()
    }
}

fn minutes(value: f64) -> Duration {
    Duration::try_from_secs_f64(value * 60.0).unwrap_or(Duration::MAX)
}

pub(crate) mod defaults {
    use std::path::PathBuf;

    /// Default hysteresis margin in degrees.
    pub fn margin() -> f64 {
        0.5
    }

    pub fn switch_delay_minutes() -> f64 {
        10.0
    }

    pub fn log_interval_minutes() -> f64 {
        1.0
    }

    pub fn poll_millis() -> u64 {
        1000
    }

    pub fn log_file() -> PathBuf {
        PathBuf::from("brew.log")
    }

    /// Port the monitor app connects to.
    pub fn status_port() -> u16 {
        4111
    }

    pub fn driver_program() -> String {
        crate::drivers::kasa::DEFAULT_PROGRAM.to_string()
    }

    pub fn driver_timeout_seconds() -> u64 {
        10
    }

    pub fn devices_dir() -> PathBuf {
        PathBuf::from("/sys/bus/w1/devices")
    }

    pub fn family_prefix() -> String {
        "28".to_string()
    }
}

fn locate_config() -> Result<PathBuf> {
    // 2) ENV
    if let Ok(env_path) = env::var("BREWD_CONFIG") {
        return Ok(PathBuf::from(env_path));
    }

    // 3) XDG_CONFIG_HOME or $HOME/.config
    if let Some(mut cfg_dir) = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".config")))
    {
        cfg_dir.push("brewd/config.yml");
        if cfg_dir.exists() {
            return Ok(cfg_dir);
        }
    }

    // 4) /etc
    let etc = Path::new("/etc/brewd/config.yml");
    if etc.exists() {
        return Ok(etc.to_path_buf());
    }

    anyhow::bail!("Configuration file not found in any standard location")
}

/// Holds the loaded configuration together with the file it came from.
///
/// The configuration is immutable once loaded: the schedule and control
/// parameters are fixed for the whole run.
///
/// # Example
///
/// ```no_run
/// use brewd::config::ConfigManager;
/// use std::path::PathBuf;
///
/// # async fn example() -> anyhow::Result<()> {
/// // Load from specific path
/// let config_manager = ConfigManager::load(Some(PathBuf::from("config.yml"))).await?;
///
/// // Load from standard locations
/// let config_manager = ConfigManager::load(None).await?;
///
/// let port = config_manager.get().status_port;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Arc<Config>,
    path: PathBuf,
}

impl ConfigManager {
    /// Creates a new ConfigManager with the given config and path.
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            config: Arc::new(config),
            path,
        }
    }

    /// Loads configuration from file or standard locations.
    ///
    /// Searches for configuration in the following order:
    /// 1. Provided path parameter
    /// 2. BREWD_CONFIG environment variable
    /// 3. XDG_CONFIG_HOME/brewd/config.yml or ~/.config/brewd/config.yml
    /// 4. /etc/brewd/config.yml
    pub async fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => locate_config().context("No configuration file found")?,
        };

        info!("Loading config from: {}", config_path.display());
        let config = Self::load_config_from_path(&config_path).await?;

        Ok(Self::new(config, config_path))
    }

    pub fn get(&self) -> &Config {
        &self.config
    }

    /// Returns the path to the configuration file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn validate(&self) -> Result<()> {
        self.config.validate()
    }

    pub fn clone_config(&self) -> Config {
        self.config.as_ref().clone()
    }

    async fn load_config_from_path(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = if is_brew_file(path) {
            brew_file::parse(&content)
                .with_context(|| format!("Failed to parse settings in: {}", path.display()))?
        } else {
            serde_yaml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse YAML in: {}", path.display()))?
        };

        if config.version != 1 {
            anyhow::bail!(
                "Unsupported config version {} in file: {}",
                config.version,
                path.display()
            );
        }

        config
            .validate()
            .with_context(|| format!("Configuration validation failed for: {}", path.display()))?;

        Ok(config)
    }
}

fn is_brew_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "brew")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    pub(crate) fn test_config() -> Config {
        Config {
            version: 1,
            margin_plus: 0.5,
            margin_minus: 0.5,
            switch_delay_minutes: 10.0,
            log_interval_minutes: 1.0,
            poll_millis: 1000,
            log_file: PathBuf::from("brew.log"),
            status_port: 4111,
            cooler: ActuatorCfg {
                address: "192.168.2.52".to_string(),
                initially_on: true,
            },
            heater: None,
            driver: DriverCfg::default(),
            sensor: SensorCfg::default(),
            schedule: vec![
                ScheduleStepCfg {
                    days: 2,
                    temp: 10.0,
                    state: "A".to_string(),
                },
                ScheduleStepCfg {
                    days: 1,
                    temp: 15.0,
                    state: "B".to_string(),
                },
            ],
        }
    }

    // Helper function to create temporary config file
    fn create_temp_config(content: &str, suffix: &str) -> NamedTempFile {
        let mut temp_file = Builder::new().suffix(suffix).tempfile().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[tokio::test]
    async fn config_load_valid_yaml() {
        let yaml_content = r#"
version: 1
margin_plus: 0.3
margin_minus: 0.7
switch_delay_minutes: 5
log_interval_minutes: 2.5
log_file: /var/log/brew.log
status_port: 5000
cooler:
  address: 192.168.2.52
  initially_on: true
heater:
  address: 192.168.2.53
driver:
  program: /usr/bin/python3
  args: [-m, kasa]
  timeout_seconds: 5
schedule:
  - { days: 14, temp: 12, state: Ferment }
  - { days: 3, temp: 16.66, state: Diacetyl rest }
  - { days: 1, temp: 13.89, state: Lager cooldown }
"#;

        let temp_file = create_temp_config(yaml_content, ".yml");
        let config_manager = ConfigManager::load(Some(temp_file.path().to_path_buf()))
            .await
            .unwrap();
        let config = config_manager.get();

        assert_eq!(config.margin_plus, 0.3);
        assert_eq!(config.margin_minus, 0.7);
        assert_eq!(config.log_interval_minutes, 2.5);
        assert_eq!(config.status_port, 5000);
        assert_eq!(config.log_file, PathBuf::from("/var/log/brew.log"));
        assert_eq!(config.heater.as_ref().unwrap().address, "192.168.2.53");
        assert!(!config.heater.as_ref().unwrap().initially_on);
        assert_eq!(config.driver.program, "/usr/bin/python3");
        assert_eq!(config.driver.args, vec!["-m", "kasa"]);
        assert_eq!(config.driver.timeout_seconds, 5);
        assert_eq!(config.schedule.len(), 3);
        assert_eq!(config.total_days(), 18);
        assert_eq!(config_manager.path(), temp_file.path());
    }

    #[tokio::test]
    async fn config_defaults_apply() {
        let yaml_content = r#"
version: 1
cooler:
  address: 10.0.0.2
schedule:
  - { days: 1, temp: 18 }
"#;

        let temp_file = create_temp_config(yaml_content, ".yml");
        let config = ConfigManager::load(Some(temp_file.path().to_path_buf()))
            .await
            .unwrap()
            .clone_config();

        assert_eq!(config.margin_plus, 0.5);
        assert_eq!(config.margin_minus, 0.5);
        assert_eq!(config.switch_delay_minutes, 10.0);
        assert_eq!(config.log_interval_minutes, 1.0);
        assert_eq!(config.poll_millis, 1000);
        assert_eq!(config.status_port, 4111);
        assert_eq!(config.log_file, PathBuf::from("brew.log"));
        assert_eq!(config.driver, DriverCfg::default());
        assert_eq!(config.sensor.devices_dir, PathBuf::from("/sys/bus/w1/devices"));
        assert_eq!(config.sensor.family_prefix, "28");
        assert!(config.heater.is_none());
        assert_eq!(config.schedule[0].state, "");
    }

    #[tokio::test]
    async fn config_rejects_unsupported_version() {
        let yaml_content = r#"
version: 2
cooler:
  address: 10.0.0.2
schedule:
  - { days: 1, temp: 18 }
"#;

        let temp_file = create_temp_config(yaml_content, ".yml");
        let err = ConfigManager::load(Some(temp_file.path().to_path_buf()))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Unsupported config version 2"));
    }

    #[tokio::test]
    async fn config_missing_file_is_an_error() {
        let err = ConfigManager::load(Some(PathBuf::from("/nonexistent/brewd.yml")))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[tokio::test]
    async fn config_load_brew_settings_file() {
        let content = "#settings\n\
                       LogFileName=brew.log\n\
                       CoolerState=1\n\
                       HasHeater=0\n\
                       DiffPlus=0.5\n\
                       DiffMinus=0.5\n\
                       CoolerIp=192.168.2.52\n\
                       LogFreq=1\n\
                       Onoffdelay=10\n\
                       !state=Ferment\n\
                       14;12\n";

        let temp_file = create_temp_config(content, ".brew");
        let config = ConfigManager::load(Some(temp_file.path().to_path_buf()))
            .await
            .unwrap()
            .clone_config();

        assert_eq!(config.cooler.address, "192.168.2.52");
        assert_eq!(config.total_days(), 14);
        assert_eq!(config.schedule[0].state, "Ferment");
    }

    #[test]
    fn config_validate_valid_config() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn config_validate_negative_margin() {
        let config = Config {
            margin_minus: -0.5,
            ..test_config()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("margin_minus"));
    }

    #[test]
    fn config_validate_empty_schedule() {
        let config = Config {
            schedule: vec![],
            ..test_config()
        };

        assert!(
            config
                .validate()
                .unwrap_err()
                .to_string()
                .contains("no steps")
        );
    }

    #[test]
    fn config_validate_zero_day_step() {
        let mut config = test_config();
        config.schedule[1].days = 0;

        assert!(config.validate().unwrap_err().to_string().contains("zero days"));
    }

    #[test]
    fn config_validate_heater_without_address() {
        let config = Config {
            heater: Some(ActuatorCfg {
                address: " ".to_string(),
                initially_on: false,
            }),
            ..test_config()
        };

        assert!(config.validate().unwrap_err().to_string().contains("Heater"));
    }

    #[test]
    fn control_config_converts_minutes() {
        let config = Config {
            switch_delay_minutes: 0.5,
            log_interval_minutes: 2.0,
            ..test_config()
        };

        let control = config.control();
        assert_eq!(control.min_switch_interval, Duration::from_secs(30));
        assert_eq!(control.min_log_interval, Duration::from_secs(120));
    }

    #[test]
    fn oversized_intervals_are_rejected() {
        let config = Config {
            switch_delay_minutes: 1e300,
            ..test_config()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("switch_delay_minutes"));
        assert_eq!(config.control().min_switch_interval, Duration::MAX);
    }

    #[test]
    fn zero_driver_timeout_is_rejected() {
        let mut config = test_config();
        config.driver.timeout_seconds = 0;

        assert!(config.validate().unwrap_err().to_string().contains("timeout"));
    }

    #[test]
    fn schedule_from_config() {
        let schedule = test_config().schedule().unwrap();
        assert_eq!(schedule.len(), 3);
    }

    #[test]
    #[serial]
    fn locate_config_prefers_env() {
        // SAFETY: serialized with the other env-touching tests.
        unsafe { env::set_var("BREWD_CONFIG", "/tmp/brewd-env.yml") };
        let located = locate_config();
        unsafe { env::remove_var("BREWD_CONFIG") };

        assert_eq!(located.unwrap(), PathBuf::from("/tmp/brewd-env.yml"));
    }

    #[test]
    #[serial]
    fn locate_config_uses_xdg_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg_dir = dir.path().join("brewd");
        fs::create_dir_all(&cfg_dir).unwrap();
        fs::write(cfg_dir.join("config.yml"), "version: 1").unwrap();

        // SAFETY: serialized with the other env-touching tests.
        unsafe {
            env::remove_var("BREWD_CONFIG");
            env::set_var("XDG_CONFIG_HOME", dir.path());
        }
        let located = locate_config();
        unsafe { env::remove_var("XDG_CONFIG_HOME") };

        assert_eq!(located.unwrap(), cfg_dir.join("config.yml"));
    }

    #[test]
    fn shipped_sample_config_is_valid() {
        let config: Config = serde_yaml::from_str(include_str!("../dist/config.yml")).unwrap();

        config.validate().unwrap();
        assert_eq!(config.total_days(), 24);
        assert!(config.heater.is_none());
        assert_eq!(config.schedule().unwrap().entry_for_day(15).unwrap().state_label, "Diacetyl rest");
    }
}
