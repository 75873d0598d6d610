use anyhow::Result;
use async_trait::async_trait;
use log::{error, info, warn};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::Mutex,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;

use crate::{
    app_context::AppState,
    control_loop::{ControlLoop, Progress},
    event::{Event, EventBus},
    providers::traits::ServiceProvider,
    task_manager::TaskManager,
};

/// Runs the temperature control loop until the schedule completes.
///
/// - **Priority**: 10 (starts first)
/// - **Critical**: Yes
///
/// Sensor failures are logged and retried on the next tick. When the last
/// scheduled day ends the service publishes [`Event::ScheduleCompleted`]
/// and stops.
pub struct ControlLoopServiceProvider {
    state: Arc<AppState>,
    event_bus: EventBus,
}

impl ControlLoopServiceProvider {
    pub fn new(state: Arc<AppState>, event_bus: EventBus) -> Self {
        Self { state, event_bus }
    }
}

#[async_trait]
impl ServiceProvider for ControlLoopServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let control_loop = self.state.control_loop.clone();
        let poll = self.state.config().poll_interval();
        let event_bus = self.event_bus.clone();

        task_manager
            .spawn_task(self.name().to_string(), move |cancel_token| async move {
                run_control_loop(control_loop, poll, event_bus, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "ControlLoopService"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn is_critical(&self) -> bool {
        true
    }
}

/// Steps the loop every `poll`; a zero `poll` only yields between iterations.
pub async fn run_control_loop(
    control_loop: Arc<Mutex<ControlLoop>>,
    poll: Duration,
    event_bus: EventBus,
    cancel_token: CancellationToken,
) -> Result<()> {
    let mut ticker = (!poll.is_zero()).then(|| {
        let mut ticker = interval(poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Control loop cancelled");
                break;
            }
            () = pace(ticker.as_mut()) => {
                let outcome = control_loop.lock().await.step().await;
                match outcome {
                    Ok(Progress::Running) => {}
                    Ok(Progress::NewDay { day_index }) => {
                        let state = control_loop.lock().await.state().state_label.clone();
                        notify(&event_bus, Event::DayStarted { day: day_index + 1, state });
                    }
                    Ok(Progress::Finished) => {
                        info!("Schedule completed");
                        notify(&event_bus, Event::ScheduleCompleted);
                        break;
                    }
                    Err(e) => error!("Control iteration failed: {e}"),
                }
            }
        }
    }
    Ok(())
}

async fn pace(ticker: Option<&mut tokio::time::Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => tokio::task::yield_now().await,
    }
}

fn notify(event_bus: &EventBus, event: Event) {
    if let Err(e) = event_bus.publish(event) {
        warn!("No listener for control loop event: {e}");
    }
}
