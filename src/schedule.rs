//! Day-indexed fermentation schedule.

use thiserror::Error;

use crate::config::ScheduleStepCfg;

/// Target for a single day of the profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    /// Target temperature in degrees Celsius.
    pub target_temp: f64,
    /// Human-readable phase name shown to the monitor.
    pub state_label: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    #[error("day {day} is outside the schedule (length {len})")]
    OutOfRange { day: usize, len: usize },

    #[error("schedule has no days")]
    Empty,
}

/// Immutable list of per-day targets, one entry per elapsed day.
///
/// Built by expanding run-length `(days, temp, state)` steps so that index `n`
/// always holds the target for day `n` (0-based).
///
/// # Example
///
/// ```
/// use brewd::config::ScheduleStepCfg;
/// use brewd::schedule::Schedule;
///
/// let schedule = Schedule::from_steps(&[
///     ScheduleStepCfg { days: 2, temp: 10.0, state: "A".into() },
///     ScheduleStepCfg { days: 1, temp: 15.0, state: "B".into() },
/// ])?;
/// assert_eq!(schedule.len(), 3);
/// assert_eq!(schedule.entry_for_day(2)?.state_label, "B");
/// # Ok::<(), brewd::schedule::ScheduleError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Schedule {
    entries: Vec<ScheduleEntry>,
}

impl Schedule {
    pub fn from_steps(steps: &[ScheduleStepCfg]) -> Result<Self, ScheduleError> {
        let entries: Vec<ScheduleEntry> = steps
            .iter()
            .flat_map(|step| {
                (0..step.days).map(move |_| ScheduleEntry {
                    target_temp: step.temp,
                    state_label: step.state.clone(),
                })
            })
            .collect();

        if entries.is_empty() {
            return Err(ScheduleError::Empty);
        }

        Ok(Self { entries })
    }

    pub fn entry_for_day(&self, day: usize) -> Result<&ScheduleEntry, ScheduleError> {
        self.entries.get(day).ok_or(ScheduleError::OutOfRange {
            day,
            len: self.entries.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
