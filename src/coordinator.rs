//! System coordinator for managing service lifecycle and dependency injection.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use log::{info, warn};
use tokio::sync::broadcast::error::RecvError;

use crate::{
    app_context::AppState,
    config::ConfigManager,
    event::{Event, EventBus},
    providers::{
        AppStateProvider, AsyncProvider, ControlLoopServiceProvider, ServiceProvider,
        StatusServerProvider,
    },
    task_manager::TaskManager,
};

/// Why the main loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Interrupted,
    ScheduleCompleted,
}

/// Owns the services and decides when the daemon stops.
///
/// The daemon stops on Ctrl+C or when [`Event::ScheduleCompleted`] arrives on
/// the bus.
pub struct SystemCoordinator {
    task_manager: TaskManager,
    event_bus: EventBus,
    shared_state: Option<Arc<AppState>>,
    service_providers: Vec<Box<dyn ServiceProvider>>,
}

impl Default for SystemCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemCoordinator {
    pub fn new() -> Self {
        Self {
            task_manager: TaskManager::new(),
            event_bus: EventBus::new(),
            shared_state: None,
            service_providers: Vec::new(),
        }
    }

    /// Builds the application state from configuration.
    pub async fn initialize(&mut self, config_manager: ConfigManager) -> Result<()> {
        let state = AppStateProvider::new(config_manager)
            .provide()
            .await
            .context("Failed to initialize application state")?;

        self.initialize_with_state(state).await
    }

    /// Records the first day and registers the services around `state`.
    pub async fn initialize_with_state(&mut self, state: Arc<AppState>) -> Result<()> {
        info!("Initializing SystemCoordinator...");

        state
            .control_loop
            .lock()
            .await
            .announce()
            .await
            .context("Failed to start the schedule")?;

        self.register_service_providers(state.clone());
        self.shared_state = Some(state);

        info!("SystemCoordinator initialization completed");
        Ok(())
    }

    fn register_service_providers(&mut self, state: Arc<AppState>) {
        let mut providers: Vec<Box<dyn ServiceProvider>> = vec![
            Box::new(ControlLoopServiceProvider::new(
                state.clone(),
                self.event_bus.clone(),
            )),
            Box::new(StatusServerProvider::new(state)),
        ];

        providers.sort_by_key(|b| std::cmp::Reverse(b.priority()));
        self.service_providers = providers;

        info!(
            "Registered {} service providers in priority order",
            self.service_providers.len()
        );
    }

    /// Starts all registered services in priority order.
    ///
    /// Critical services must start successfully, while non-critical services
    /// can fail without stopping the system.
    pub async fn start_all_services(&mut self) -> Result<()> {
        for provider in &self.service_providers {
            let is_critical = provider.is_critical();

            match provider.start(&mut self.task_manager).await {
                Ok(()) => info!(
                    "Service '{}' started (priority: {}, critical: {})",
                    provider.name(),
                    provider.priority(),
                    is_critical
                ),
                Err(e) if is_critical => {
                    return Err(e).with_context(|| {
                        format!("Critical service '{}' failed to start", provider.name())
                    });
                }
                Err(e) => warn!("Non-critical service '{}' failed to start: {e}", provider.name()),
            }
        }

        Ok(())
    }

    /// Waits for a stop condition, then shuts every service down.
    pub async fn run_main_loop(&mut self) -> Result<StopReason> {
        let mut event_rx = self.event_bus.subscribe();
        info!("Starting main event loop");

        let reason = loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result.context("Failed to listen for shutdown signal")?;
                    info!("Received Ctrl+C, initiating graceful shutdown...");
                    break StopReason::Interrupted;
                }
                event = event_rx.recv() => {
                    if let Some(reason) = Self::handle_event(event)? {
                        break reason;
                    }
                }
            }
        };

        self.shutdown().await;
        info!("Main event loop terminated: {reason:?}");
        Ok(reason)
    }

    fn handle_event(event: Result<Event, RecvError>) -> Result<Option<StopReason>> {
        match event {
            Ok(Event::DayStarted { day, state }) => {
                info!("Day {day} started: {state}");
                Ok(None)
            }
            Ok(Event::ScheduleCompleted) => {
                info!("Schedule finished, stopping");
                Ok(Some(StopReason::ScheduleCompleted))
            }
            Err(RecvError::Lagged(n)) => {
                warn!("Event bus lagged by {n} messages");
                Ok(None)
            }
            Err(RecvError::Closed) => bail!("Event bus channel closed unexpectedly"),
        }
    }

    async fn shutdown(&mut self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.task_manager.shutdown_all().await {
            log::error!("Error during task shutdown: {e:#}");
        }

        info!("Shutdown complete");
    }

    pub const fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn state(&self) -> Option<&Arc<AppState>> {
        self.shared_state.as_ref()
    }

    pub fn running_services(&self) -> Vec<&'static str> {
        self.service_providers.iter().map(|p| p.name()).collect()
    }
}
