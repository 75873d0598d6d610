//! Hysteresis control loop and day-indexed schedule state machine.

use std::{sync::Arc, time::Duration};

use chrono::Local;
use log::{debug, info};
use thiserror::Error;
use tokio::time::Instant;

use crate::{
    actuator::ActuatorController,
    config::ControlConfig,
    rate_gate::{FirstCheck, RateGate},
    schedule::{Schedule, ScheduleError},
    sensors::{SensorError, SensorSource},
    status::{StatusBoard, StatusSnapshot, format_temp},
    status_log::StatusLog,
};

/// Length of one schedule day.
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("sensor read failed: {0}")]
    Sensor(#[from] SensorError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Outcome of one control iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Nothing notable; keep iterating.
    Running,
    /// A new schedule day (0-based index) started in this iteration.
    NewDay { day_index: usize },
    /// The schedule is exhausted; the caller should shut down cleanly.
    Finished,
}

/// Where a reading sits relative to the hysteresis band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    TooCold,
    Within,
    TooHot,
}

impl Band {
    pub fn classify(temp: f64, low: f64, high: f64) -> Self {
        if temp <= low {
            Band::TooCold
        } else if temp >= high {
            Band::TooHot
        } else {
            Band::Within
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopState {
    pub current_temp: f64,
    pub day_index: usize,
    pub next_day_boundary: Option<Instant>,
    pub state_label: String,
    pub min_temp: f64,
    pub max_temp: f64,
}

enum DayAdvance {
    Same,
    Started,
    Exhausted,
}

/// Owns the loop state, the actuators and the log gate.
///
/// Each [`step`](ControlLoop::step) senses, decides, advances the day and logs,
/// in that order, then publishes a fresh [`StatusSnapshot`] to the board.
pub struct ControlLoop {
    schedule: Arc<Schedule>,
    control: ControlConfig,
    sensor: Arc<dyn SensorSource>,
    cooler: ActuatorController,
    heater: Option<ActuatorController>,
    log: Arc<StatusLog>,
    board: StatusBoard,
    log_gate: RateGate,
    state: LoopState,
}

impl ControlLoop {
    pub fn new(
        schedule: Arc<Schedule>,
        control: ControlConfig,
        sensor: Arc<dyn SensorSource>,
        cooler: ActuatorController,
        heater: Option<ActuatorController>,
        log: Arc<StatusLog>,
        board: StatusBoard,
    ) -> Result<Self, ControlError> {
        let first = schedule.entry_for_day(0)?;
        let state = LoopState {
            current_temp: 0.0,
            day_index: 0,
            next_day_boundary: None,
            state_label: first.state_label.clone(),
            min_temp: first.target_temp - control.margin_minus,
            max_temp: first.target_temp + control.margin_plus,
        };

        Ok(Self {
            log_gate: RateGate::new(control.min_log_interval, FirstCheck::Allow),
            schedule,
            control,
            sensor,
            cooler,
            heater,
            log,
            board,
            state,
        })
    }

    /// Records the start of the current day and publishes the initial status.
    pub async fn announce(&mut self) -> Result<(), ControlError> {
        self.log_day_start().await?;
        self.publish().await;
        Ok(())
    }

    /// Runs one sense/decide/advance/log iteration.
    ///
    /// A sensor failure aborts the iteration before any actuator, day or log
    /// change and is returned to the caller, which is expected to try again.
    pub async fn step(&mut self) -> Result<Progress, ControlError> {
        if self.is_finished() {
            return Ok(Progress::Finished);
        }

        let temp = self.sensor.read_temperature().await?;
        let now = Instant::now();

        let entry = self.schedule.entry_for_day(self.state.day_index)?;
        let low = entry.target_temp - self.control.margin_minus;
        let high = entry.target_temp + self.control.margin_plus;
        self.state.current_temp = temp;
        self.state.min_temp = low;
        self.state.max_temp = high;

        self.decide(Band::classify(temp, low, high), now).await;

        let progress = match self.advance_day(now) {
            DayAdvance::Exhausted => {
                info!("Out of days, schedule complete");
                return Ok(Progress::Finished);
            }
            DayAdvance::Started => {
                self.log_day_start().await?;
                Progress::NewDay {
                    day_index: self.state.day_index,
                }
            }
            DayAdvance::Same => Progress::Running,
        };

        if self.log_gate.permit(now) {
            let record = self.format_record();
            info!("{record}");
            self.log.append(&record).await;
        }

        self.publish().await;
        Ok(progress)
    }

    pub fn is_finished(&self) -> bool {
        self.state.day_index >= self.schedule.len()
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn cooler(&self) -> &ActuatorController {
        &self.cooler
    }

    pub fn heater(&self) -> Option<&ActuatorController> {
        self.heater.as_ref()
    }

    /// Each actuator's gate is checked independently; a check that passes
    /// consumes the permit even if the actuator is already in that state.
    async fn decide(&mut self, band: Band, now: Instant) {
        match band {
            Band::TooCold => {
                if let Some(heater) = self.heater.as_mut() {
                    if !heater.should_debounce(now) {
                        heater.turn_on().await;
                    }
                }
                if !self.cooler.should_debounce(now) {
                    self.cooler.turn_off().await;
                }
            }
            Band::TooHot => {
                if let Some(heater) = self.heater.as_mut() {
                    if !heater.should_debounce(now) {
                        heater.turn_off().await;
                    }
                }
                if !self.cooler.should_debounce(now) {
                    self.cooler.turn_on().await;
                }
            }
            Band::Within => {
                debug!("{} within band", format_temp(self.state.current_temp));
            }
        }
    }

    fn advance_day(&mut self, now: Instant) -> DayAdvance {
        let Some(boundary) = self.state.next_day_boundary else {
            self.state.next_day_boundary = Some(now + DAY);
            return DayAdvance::Same;
        };

        if now <= boundary {
            return DayAdvance::Same;
        }

        self.state.next_day_boundary = Some(now + DAY);
        self.state.day_index += 1;

        if self.is_finished() {
            DayAdvance::Exhausted
        } else {
            DayAdvance::Started
        }
    }

    async fn log_day_start(&mut self) -> Result<(), ControlError> {
        let entry = self.schedule.entry_for_day(self.state.day_index)?;
        self.state.state_label = entry.state_label.clone();

        let record = format!(
            "Day:{}, State:{}, Temp goal: {}",
            self.state.day_index + 1,
            entry.state_label,
            format_temp(entry.target_temp)
        );
        info!("{record}");
        self.log.write_durable(&record).await;
        Ok(())
    }

    fn format_record(&self) -> String {
        let mut record = format!(
            "{} t:{} Cooler on: {}",
            Local::now().format("%d-%m-%Y %H:%M:%S"),
            format_temp(self.state.current_temp),
            self.cooler.is_on()
        );
        if let Some(heater) = &self.heater {
            record.push_str(&format!(" Heater on: {}", heater.is_on()));
        }
        record
    }

    async fn publish(&self) {
        self.board
            .publish(StatusSnapshot {
                min_temp: self.state.min_temp,
                current_temp: self.state.current_temp,
                max_temp: self.state.max_temp,
                day_index: self.state.day_index,
                state_label: self.state.state_label.clone(),
                recent: self.log.snapshot().await,
            })
            .await;
    }
}
