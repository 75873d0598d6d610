use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use tokio::{process::Command, time::timeout};

use crate::{
    actuator::{ActuatorDriver, DriverError, on_off},
    config::DriverCfg,
};

pub const DEFAULT_PROGRAM: &str = "kasa";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Switches TP-Link smart plugs through the `python-kasa` command line tool.
///
/// Each call runs `<program> [args...] --host <address> on|off` and waits for
/// it to exit. A command still running after the timeout is killed.
#[derive(Debug, Clone)]
pub struct KasaDriver {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl KasaDriver {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_cfg(cfg: &DriverCfg) -> Self {
        info!("Using actuator program '{}'", cfg.program);
        Self::new(cfg.program.clone())
            .with_args(cfg.args.iter().cloned())
            .with_timeout(Duration::from_secs(cfg.timeout_seconds))
    }
}

impl Default for KasaDriver {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

#[async_trait]
impl ActuatorDriver for KasaDriver {
    async fn set_power(&self, address: &str, on: bool) -> Result<(), DriverError> {
        let state = on_off(on);
        let command = Command::new(&self.program)
            .args(&self.args)
            .args(["--host", address, state])
            .kill_on_drop(true)
            .output();

        let output = timeout(self.timeout, command)
            .await
            .map_err(|_| DriverError::Timeout {
                address: address.to_string(),
                state,
                after: self.timeout,
            })?
            .map_err(|source| DriverError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!("{}: {line}", self.program);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DriverError::Rejected {
                address: address.to_string(),
                state,
                detail: format!("{} ({})", output.status, stderr.trim()),
            });
        }

        Ok(())
    }
}
