//! Line-oriented `.brew` settings format.
//!
//! ```text
//! #settings
//! LogFileName=brew.log
//! CoolerState=1
//! HeaterState=0
//! HasHeater=0
//! DiffPlus=0.5
//! DiffMinus=0.5
//! CoolerIp=192.168.2.52
//! HeaterIp=0
//! LogFreq=1
//! Onoffdelay=10
//! #days;temp
//! !state=Ferment
//! 14;12
//! !state=Diacetyl rest
//! 3;16.66
//! ```
//!
//! Keys may come in any order. `!state=` applies to every `days;temp` line that
//! follows it until the next `!state=`.

use anyhow::{Context, Result, anyhow, bail};
use std::path::PathBuf;

use super::{ActuatorCfg, Config, DriverCfg, ScheduleStepCfg, SensorCfg, defaults};

pub fn parse(content: &str) -> Result<Config> {
    let mut settings = Settings::default();
    let mut state = String::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        settings
            .apply(line, &mut state)
            .with_context(|| format!("line {}: '{}'", idx + 1, line))?;
    }

    Ok(settings.into_config())
}

struct Settings {
    log_file: PathBuf,
    cooler_on: bool,
    heater_on: bool,
    has_heater: bool,
    margin_plus: f64,
    margin_minus: f64,
    cooler_ip: String,
    heater_ip: String,
    log_minutes: f64,
    switch_minutes: f64,
    steps: Vec<ScheduleStepCfg>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_file: defaults::log_file(),
            cooler_on: true,
            heater_on: false,
            has_heater: false,
            margin_plus: defaults::margin(),
            margin_minus: defaults::margin(),
            cooler_ip: String::new(),
            heater_ip: String::new(),
            log_minutes: defaults::log_interval_minutes(),
            switch_minutes: defaults::switch_delay_minutes(),
            steps: Vec::new(),
        }
    }
}

impl Settings {
    fn apply(&mut self, line: &str, state: &mut String) -> Result<()> {
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim();
            match key.trim() {
                "!state" => *state = value.to_string(),
                "LogFileName" => self.log_file = PathBuf::from(value),
                "CoolerState" => self.cooler_on = flag(value)?,
                "HeaterState" => self.heater_on = flag(value)?,
                "HasHeater" => self.has_heater = flag(value)?,
                "DiffPlus" => self.margin_plus = number(value)?,
                "DiffMinus" => self.margin_minus = number(value)?,
                "CoolerIp" => self.cooler_ip = value.to_string(),
                "HeaterIp" => self.heater_ip = value.to_string(),
                "LogFreq" => self.log_minutes = number(value)?,
                "Onoffdelay" => self.switch_minutes = number(value)?,
                other => bail!("unknown setting '{other}'"),
            }
            return Ok(());
        }

        if let Some((days, temp)) = line.split_once(';') {
            self.steps.push(ScheduleStepCfg {
                days: days
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("invalid day count '{}'", days.trim()))?,
                temp: number(temp)?,
                state: state.clone(),
            });
            return Ok(());
        }

        bail!("expected 'Key=Value' or 'days;temp'")
    }

    fn into_config(self) -> Config {
        Config {
            version: 1,
            margin_plus: self.margin_plus,
            margin_minus: self.margin_minus,
            switch_delay_minutes: self.switch_minutes,
            log_interval_minutes: self.log_minutes,
            poll_millis: defaults::poll_millis(),
            log_file: self.log_file,
            status_port: defaults::status_port(),
            cooler: ActuatorCfg {
                address: self.cooler_ip,
                initially_on: self.cooler_on,
            },
            heater: self.has_heater.then_some(ActuatorCfg {
                address: self.heater_ip,
                initially_on: self.heater_on,
            }),
            driver: DriverCfg::default(),
            sensor: SensorCfg::default(),
            schedule: self.steps,
        }
    }
}

fn flag(value: &str) -> Result<bool> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        other => bail!("expected 0 or 1, got '{other}'"),
    }
}

fn number(value: &str) -> Result<f64> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid number '{}'", value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LAGER: &str = "#settings
LogFileName=lager.log
CoolerState=1
HeaterState=0
HasHeater=1
DiffPlus=0.5
DiffMinus=0.25
CoolerIp=192.168.2.52
HeaterIp=192.168.2.53
LogFreq=1
Onoffdelay=10
#days;temp
!state=Ferment
14;12
!state=Diactyl rest
3;16.66
!state=Lager cooldown
1;13.89
";

    #[test]
    fn parses_full_settings_file() {
        let config = parse(LAGER).unwrap();

        assert_eq!(config.log_file, PathBuf::from("lager.log"));
        assert_eq!(config.margin_plus, 0.5);
        assert_eq!(config.margin_minus, 0.25);
        assert_eq!(config.switch_delay_minutes, 10.0);
        assert_eq!(config.log_interval_minutes, 1.0);
        assert_eq!(
            config.cooler,
            ActuatorCfg {
                address: "192.168.2.52".to_string(),
                initially_on: true,
            }
        );
        assert_eq!(
            config.heater,
            Some(ActuatorCfg {
                address: "192.168.2.53".to_string(),
                initially_on: false,
            })
        );
        assert_eq!(
            config.schedule,
            vec![
                ScheduleStepCfg {
                    days: 14,
                    temp: 12.0,
                    state: "Ferment".to_string(),
                },
                ScheduleStepCfg {
                    days: 3,
                    temp: 16.66,
                    state: "Diactyl rest".to_string(),
                },
                ScheduleStepCfg {
                    days: 1,
                    temp: 13.89,
                    state: "Lager cooldown".to_string(),
                },
            ]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn heater_ignored_unless_enabled() {
        let config = parse("CoolerIp=10.0.0.2\nHasHeater=0\nHeaterIp=10.0.0.3\n1;18\n").unwrap();

        assert!(config.heater.is_none());
    }

    #[test]
    fn steps_before_any_state_have_empty_label() {
        let config = parse("CoolerIp=10.0.0.2\n2;18\n!state=Warm\n1;20\n").unwrap();

        assert_eq!(config.schedule[0].state, "");
        assert_eq!(config.schedule[1].state, "Warm");
    }

    #[test]
    fn invalid_flag_is_rejected() {
        let err = parse("HasHeater=yes\n").unwrap_err();

        assert!(format!("{err:#}").contains("expected 0 or 1"));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = parse("Colour=blue\n").unwrap_err();

        assert!(format!("{err:#}").contains("unknown setting 'Colour'"));
    }

    #[test]
    fn malformed_step_reports_line_number() {
        let err = parse("CoolerIp=10.0.0.2\nten;12\n").unwrap_err();

        assert!(err.to_string().contains("line 2"));
        assert!(format!("{err:#}").contains("invalid day count"));
    }
}
