use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
#[cfg(debug_assertions)]
use log::info;

use crate::{
    config::SensorCfg,
    sensors::{SensorError, SensorSource},
};

const SLAVE_FILE: &str = "w1_slave";

/// DS18B20-style probe exposed by the kernel `w1` bus.
///
/// The device directory is resolved once at startup; every read re-parses the
/// `w1_slave` file, whose last `t=` field carries millidegrees Celsius.
#[derive(Debug)]
pub struct W1Probe {
    device: String,
    slave: PathBuf,
}

impl W1Probe {
    /// Finds the first device under `cfg.devices_dir` whose name starts with the
    /// configured family prefix. A missing probe is a startup error.
    pub fn discover(cfg: &SensorCfg) -> Result<Self> {
        let mut names: Vec<String> = std::fs::read_dir(&cfg.devices_dir)
            .with_context(|| format!("Failed to list {}", cfg.devices_dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with(&cfg.family_prefix))
            .collect();
        names.sort();

        let device = names.into_iter().next().ok_or_else(|| {
            anyhow!(
                "No probe with prefix '{}' found in {}",
                cfg.family_prefix,
                cfg.devices_dir.display()
            )
        })?;

        #[cfg(debug_assertions)]
        {
            info!("Found w1 probe: {device}");
        }

        Ok(Self::at(&cfg.devices_dir, device))
    }

    pub fn at(devices_dir: &Path, device: String) -> Self {
        let slave = devices_dir.join(&device).join(SLAVE_FILE);
        Self { device, slave }
    }
}

#[async_trait]
impl SensorSource for W1Probe {
    async fn read_temperature(&self) -> Result<f64, SensorError> {
        let path = self.slave.display().to_string();
        let content = tokio::fs::read_to_string(&self.slave)
            .await
            .map_err(|source| SensorError::Io {
                path: path.clone(),
                source,
            })?;

        parse_w1_slave(&content, &path)
    }

    fn sensor_name(&self) -> Option<String> {
        Some(self.device.clone())
    }
}

fn parse_w1_slave(content: &str, path: &str) -> Result<f64, SensorError> {
    let raw = content
        .lines()
        .filter_map(|line| line.split_once("t=").map(|(_, value)| value.trim()))
        .last()
        .ok_or_else(|| SensorError::MissingValue {
            path: path.to_string(),
        })?;

    raw.parse::<i64>()
        .map(|milli| milli as f64 / 1000.0)
        .map_err(|_| SensorError::Malformed {
            path: path.to_string(),
            raw: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const SAMPLE: &str = "72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n\
                          72 01 4b 46 7f ff 0e 10 57 t=23125\n";

    fn sensor_cfg(dir: &Path) -> SensorCfg {
        SensorCfg {
            devices_dir: dir.to_path_buf(),
            family_prefix: "28".to_string(),
        }
    }

    fn add_device(dir: &Path, name: &str, content: &str) {
        let device = dir.join(name);
        std::fs::create_dir_all(&device).unwrap();
        std::fs::write(device.join(SLAVE_FILE), content).unwrap();
    }

    #[test]
    fn parses_millidegrees() {
        assert_eq!(parse_w1_slave(SAMPLE, "probe").unwrap(), 23.125);
        assert_eq!(parse_w1_slave("xx t=-1500\n", "probe").unwrap(), -1.5);
    }

    #[test]
    fn missing_value_is_an_error() {
        let err = parse_w1_slave("72 01 : crc=57 NO\n", "probe").unwrap_err();
        assert!(matches!(err, SensorError::MissingValue { .. }));
    }

    #[test]
    fn malformed_value_is_an_error() {
        let err = parse_w1_slave("t=abc\n", "probe").unwrap_err();
        assert!(matches!(err, SensorError::Malformed { ref raw, .. } if raw == "abc"));
    }

    #[tokio::test]
    async fn discovers_probe_by_family_prefix() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("w1_bus_master1")).unwrap();
        add_device(dir.path(), "28-0316a2795cff", SAMPLE);

        let probe = W1Probe::discover(&sensor_cfg(dir.path())).unwrap();

        assert_eq!(probe.sensor_name().as_deref(), Some("28-0316a2795cff"));
        assert_eq!(probe.read_temperature().await.unwrap(), 23.125);
    }

    #[test]
    fn discovery_without_probe_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("w1_bus_master1")).unwrap();

        let err = W1Probe::discover(&sensor_cfg(dir.path())).unwrap_err();
        assert!(err.to_string().contains("No probe"));
    }

    #[tokio::test]
    async fn vanished_device_reports_io_error() {
        let dir = TempDir::new().unwrap();
        let probe = W1Probe::at(dir.path(), "28-gone".to_string());

        let err = probe.read_temperature().await.unwrap_err();
        assert!(matches!(err, SensorError::Io { .. }));
    }
}
