//! Actuator abstraction and the per-actuator switch controller.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use log::{error, info};
use thiserror::Error;
use tokio::time::Instant;

use crate::rate_gate::{FirstCheck, RateGate};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("switching {address} {state} failed: {detail}")]
    Rejected {
        address: String,
        state: &'static str,
        detail: String,
    },
    #[error("switching {address} {state} timed out after {after:?}")]
    Timeout {
        address: String,
        state: &'static str,
        after: Duration,
    },
}

/// Capability that physically powers an actuator on or off.
///
/// The core treats success and failure opaquely and never retries within one
/// decision cycle.
///
/// # Example
///
/// ```no_run
/// use brewd::actuator::{ActuatorDriver, DriverError};
///
/// struct NullDriver;
///
/// #[async_trait::async_trait]
/// impl ActuatorDriver for NullDriver {
///     async fn set_power(&self, _address: &str, _on: bool) -> Result<(), DriverError> {
///         Ok(())
///     }
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActuatorDriver: Send + Sync {
    async fn set_power(&self, address: &str, on: bool) -> Result<(), DriverError>;
}

/// Role of an actuator in the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorRole {
    Cooler,
    Heater,
}

impl fmt::Display for ActuatorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorRole::Cooler => write!(f, "Cooler"),
            ActuatorRole::Heater => write!(f, "Heater"),
        }
    }
}

/// Owns the on/off state and switch-rate limiter of one physical actuator.
///
/// `is_on` tracks the last *commanded* value, not a confirmed one: a failed
/// driver call is logged and the flag keeps what was asked for.
pub struct ActuatorController {
    role: ActuatorRole,
    address: String,
    driver: Arc<dyn ActuatorDriver>,
    is_on: bool,
    debounce: RateGate,
}

impl ActuatorController {
    pub fn new(
        role: ActuatorRole,
        address: impl Into<String>,
        driver: Arc<dyn ActuatorDriver>,
        initially_on: bool,
        min_switch_interval: Duration,
    ) -> Self {
        Self {
            role,
            address: address.into(),
            driver,
            is_on: initially_on,
            debounce: RateGate::new(min_switch_interval, FirstCheck::Block),
        }
    }

    pub async fn turn_on(&mut self) {
        self.switch(true).await;
    }

    pub async fn turn_off(&mut self) {
        self.switch(false).await;
    }

    /// Returns true when switching must be skipped right now.
    ///
    /// The first call after construction always debounces and seeds the timer.
    /// A non-debounced answer consumes the permit for the next interval.
    pub fn should_debounce(&mut self, now: Instant) -> bool {
        !self.debounce.permit(now)
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    pub fn role(&self) -> ActuatorRole {
        self.role
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn last_switch_instant(&self) -> Option<Instant> {
        self.debounce.last()
    }

    async fn switch(&mut self, on: bool) {
        info!("Turn {} {} ({})", self.role, on_off(on), self.address);
        self.is_on = on;

        if let Err(e) = self.driver.set_power(&self.address, on).await {
            error!("{} at {}: {e}", self.role, self.address);
        }
    }
}

impl fmt::Debug for ActuatorController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActuatorController")
            .field("role", &self.role)
            .field("address", &self.address)
            .field("is_on", &self.is_on)
            .field("debounce", &self.debounce)
            .finish()
    }
}

pub(crate) fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}
